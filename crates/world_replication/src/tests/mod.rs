//! Scenario tests driving whole maps and worlds through the public API and
//! asserting on what the clients actually received.

mod lifecycle;
mod messaging;
mod transfer;
mod visibility_changes;

use crate::config::ReplicationConfig;
use crate::replication::{Map, RecordingTransport};
use crate::terrain::OpenTerrain;
use crate::types::{InstanceId, MapId, MapKind, ObjectGuid, Position, WorldLocation};
use crate::update::{DecodedBlock, UpdateType};
use std::sync::Arc;

pub(crate) const MAP: MapId = MapId(0);

pub(crate) fn at(x: f32, y: f32) -> WorldLocation {
    WorldLocation::new(MAP, InstanceId(0), Position::new(x, y, 0.0))
}

pub(crate) fn test_map() -> (Map, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let map = Map::new(
        MAP,
        InstanceId(0),
        MapKind::Continent,
        &ReplicationConfig::default(),
        Arc::new(OpenTerrain::default()),
        transport.clone(),
    );
    (map, transport)
}

/// Every block `observer` received since the last call, in receive order.
pub(crate) fn received(transport: &RecordingTransport, observer: ObjectGuid) -> Vec<DecodedBlock> {
    transport
        .take_decoded(observer)
        .expect("recorded packets decode")
        .into_iter()
        .flat_map(|packet| packet.blocks)
        .collect()
}

/// `(type, guid)` of each block, for compact assertions.
pub(crate) fn summary(blocks: &[DecodedBlock]) -> Vec<(UpdateType, ObjectGuid)> {
    blocks.iter().map(|block| (block.update_type(), block.guid())).collect()
}

pub(crate) fn count(blocks: &[DecodedBlock], update_type: UpdateType, guid: ObjectGuid) -> usize {
    blocks
        .iter()
        .filter(|block| block.update_type() == update_type && block.guid() == guid)
        .count()
}
