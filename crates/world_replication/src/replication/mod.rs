//! # Replication Scheduling
//!
//! Drives the rest of the crate once per tick: which client learns about which
//! object, which blocks it receives and in which order.
//!
//! * [`Map`] owns one map instance and batches everything that happened on it
//!   since the last tick into one [`UpdateData`](crate::update::UpdateData)
//!   per observer.
//! * [`TrackingRegistry`] is the record of what every client has in its
//!   object cache. A values or destroy block is only ever built for a pair
//!   present in it; a create block is only built for a pair absent from it.
//! * [`World`] holds all loaded maps, ticks them in parallel and moves
//!   objects between them.
//! * [`Transport`] is where finished packets go.

mod map;
mod stats;
mod tracking;
mod transport;
mod world;

pub use map::Map;
pub use stats::ReplicationStats;
pub use tracking::TrackingRegistry;
pub use transport::{ChannelTransport, RecordingTransport, Transport};
pub use world::{MapKey, World};
