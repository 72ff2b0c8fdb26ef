//! # Update Blocks
//!
//! Serialization of entity state for one observer.
//!
//! * **create** blocks carry the movement header and every field the observer
//!   may see,
//! * **values** blocks carry only what changed since the last flush,
//! * **destroy** blocks carry just the GUID.
//!
//! ## Block layout
//!
//! ```text
//! u8            block type (CreateObject = 0, CreateObject2 = 1, Values = 2, Destroy = 3)
//! packed guid
//! -- create only --
//! u8            object type id (ActivePlayer when the observer is the object)
//! header        see [`CreateObjectHeader`]
//! -- create and values --
//! u8 + u32[n]   scalar presence mask
//! u32[]         raw value of every present slot, ascending
//! u8 + u32[n]   dynamic field presence mask
//! per present dynamic field:
//!   u8          change tag
//!   u16         element count
//!   u8 + u32[n] element presence mask
//!   u32[]       raw value of every present element
//! ```
//!
//! Blocks are aggregated per observer into an [`UpdateData`] packet.

mod builder;
mod header;
mod packet;
mod wire;

pub use builder::{visible_field_flags, UpdateBlockBuilder};
pub use header::{pack_rotation, unpack_rotation, CreateObjectHeader, UnitMovement};
pub use packet::{
    decode_packet, is_compressed_packet, DecodedBlock, DecodedDynamic, DecodedFields, DecodedPacket, UpdateData,
};
pub use wire::{WireReader, WireWriter};

use crate::types::ObjectGuid;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum UpdateType {
    CreateObject = 0,
    /// Create of an object the client has to treat as freshly spawned.
    CreateObject2 = 1,
    Values = 2,
    Destroy = 3,
}

impl UpdateType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(UpdateType::CreateObject),
            1 => Some(UpdateType::CreateObject2),
            2 => Some(UpdateType::Values),
            3 => Some(UpdateType::Destroy),
            _ => None,
        }
    }

    pub fn is_create(self) -> bool {
        matches!(self, UpdateType::CreateObject | UpdateType::CreateObject2)
    }
}

/// One serialized block addressed to a single observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBlock {
    pub update_type: UpdateType,
    pub guid: ObjectGuid,
    pub data: Bytes,
}
