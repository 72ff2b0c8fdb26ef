//! Error types for the replication core.
//!
//! Everything here describes a programming error or a lookup miss. None of
//! these are allowed to abort a map tick: callers log them and move on to the
//! next entity.

use crate::types::{MapId, ObjectGuid};

/// Errors raised by field storage writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Slot index (plus the width of the value) lies outside the layout
    #[error("slot {slot} (width {width}) out of range for layout of {len} slots")]
    SlotOutOfRange { slot: u16, width: u16, len: u16 },

    /// Sub-slot byte offset does not fit the written value inside one slot
    #[error("byte offset {offset} invalid for {width}-byte write into slot {slot}")]
    InvalidOffset { slot: u16, offset: u8, width: u8 },

    /// Dynamic field index not declared by the layout
    #[error("dynamic field {index} out of range for layout of {len} dynamic fields")]
    DynamicFieldOutOfRange { index: u16, len: u16 },

    /// Write would grow a dynamic field past what one update mask can address
    #[error("dynamic field {index} cannot grow to {requested} elements (max {max})")]
    DynamicFieldFull { index: u16, requested: usize, max: usize },
}

/// Errors raised by map-level replication operations.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("object {0} is already registered on this map")]
    DuplicateObject(ObjectGuid),

    #[error("object {0} not found")]
    ObjectNotFound(ObjectGuid),

    #[error("object {guid} belongs to map {expected:?}, not {actual:?}")]
    WrongMap {
        guid: ObjectGuid,
        expected: MapId,
        actual: MapId,
    },

    #[error("map {0:?} is not loaded")]
    MapNotLoaded(MapId),

    #[error("field error: {0}")]
    Field(#[from] FieldError),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigValidationError),
}

/// Errors raised while decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of data while reading {0}")]
    Truncated(&'static str),

    #[error("unknown block type {0}")]
    UnknownBlockType(u8),

    #[error("unknown object type {0}")]
    UnknownTypeId(u8),

    #[error("unknown area trigger shape {0}")]
    UnknownShape(u8),

    #[error("unknown dynamic field change tag {0}")]
    UnknownDynamicChange(u8),

    #[error("decompression failed: {0}")]
    Decompression(String),
}
