//! # World Replication
//!
//! Server-side entity replication for a persistent multiplayer world: which
//! connected client may see which entity, and which bytes it has to receive
//! to keep its copy of that entity current.
//!
//! ## Core Features
//!
//! - **Change tracking**: per-entity field storage that knows exactly which
//!   slots and dynamic elements changed since the last flush
//! - **Visibility rules**: distance, phases, stealth, invisibility, GM levels,
//!   ghosts, private objects, ownership and shared vision
//! - **Spatial grid**: cell index with a visitor framework for searches,
//!   range-limited messages and visibility updates
//! - **Observer-relative serialization**: create, values and destroy blocks
//!   built per observer, masked by the relationship between the two
//! - **Scheduling**: per-map ticks that keep every client's tracking set
//!   consistent, run in parallel across maps
//!
//! ## Architecture Overview
//!
//! - [`fields`] - typed field handles, layouts and the [`FieldStore`]
//! - [`entity`] - the closed set of entity categories and their registry
//! - [`visibility`] - [`VisibilityRules`], the full can-see-or-detect decision
//! - [`grid`] - [`SpatialGrid`](grid::SpatialGrid), searchers, deliverer, notifiers
//! - [`update`] - block builder, wire codec, packet framing and decoder
//! - [`replication`] - [`Map`], [`World`], tracking sets and transports
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use world_replication::replication::{RecordingTransport, World};
//! use world_replication::terrain::OpenTerrain;
//! use world_replication::*;
//!
//! let transport = Arc::new(RecordingTransport::new());
//! let mut world = World::new(
//!     ReplicationConfig::default(),
//!     Arc::new(OpenTerrain::default()),
//!     transport.clone(),
//! )?;
//! world.create_map(MapId(0), InstanceId(0), MapKind::Continent);
//!
//! let here = WorldLocation::new(MapId(0), InstanceId(0), Position::new(0.0, 0.0, 0.0));
//! let player = WorldObject::player(1, here, Team::Alliance);
//! let guid = player.guid();
//! world.add_object(player)?;
//! world.add_object(WorldObject::creature(3100, 1, here))?;
//!
//! world.tick(100);
//! let packets = transport.take_decoded(guid)?;
//! // The player's own create block plus the creature next to it.
//! assert_eq!(packets[0].blocks.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod fields;
pub mod grid;
pub mod replication;
pub mod terrain;
pub mod types;
pub mod update;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use config::{GhostSightMode, ReplicationConfig, ReplicationConfigBuilder};
pub use entity::{EntityKind, ObjectAccessor, ObjectRegistry, WorldObject};
pub use error::{DecodeError, FieldError, ReplicationError};
pub use fields::{Field, FieldFlags, FieldStore};
pub use replication::{Map, World};
pub use types::{
    GroupId, HighGuid, InstanceId, MapId, MapKind, ObjectGuid, PhaseSet, Position, Team, TypeId, WorldLocation,
};
pub use visibility::{DetectOptions, VisibilityRules};
