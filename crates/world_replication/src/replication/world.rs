use super::map::Map;
use super::stats::ReplicationStats;
use super::transport::Transport;
use crate::config::ReplicationConfig;
use crate::entity::WorldObject;
use crate::error::ReplicationError;
use crate::terrain::TerrainProvider;
use crate::types::{InstanceId, MapId, MapKind, ObjectGuid, WorldLocation};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

pub type MapKey = (MapId, InstanceId);

/// Every loaded map instance of a world server.
///
/// Maps are independent partitions: [`tick`](Self::tick) runs them in
/// parallel, and an object only moves between them through
/// [`transfer`](Self::transfer).
#[derive(Debug)]
pub struct World {
    config: ReplicationConfig,
    terrain: Arc<dyn TerrainProvider>,
    transport: Arc<dyn Transport>,
    maps: BTreeMap<MapKey, Map>,
    stats: ReplicationStats,
}

impl World {
    pub fn new(
        config: ReplicationConfig,
        terrain: Arc<dyn TerrainProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ReplicationError> {
        config.validate()?;
        Ok(Self {
            config,
            terrain,
            transport,
            maps: BTreeMap::new(),
            stats: ReplicationStats::default(),
        })
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Loads a map instance, or returns the one already loaded.
    pub fn create_map(&mut self, id: MapId, instance_id: InstanceId, kind: MapKind) -> &mut Map {
        let (config, terrain, transport) = (&self.config, &self.terrain, &self.transport);
        self.maps.entry((id, instance_id)).or_insert_with(|| {
            info!("🗺️ Loaded map {} instance {} ({:?})", id.0, instance_id.0, kind);
            Map::new(id, instance_id, kind, config, terrain.clone(), transport.clone())
        })
    }

    pub fn unload_map(&mut self, id: MapId, instance_id: InstanceId) -> Option<Map> {
        let map = self.maps.remove(&(id, instance_id))?;
        if !map.is_empty() {
            warn!("⚠️ Unloading map {} with {} objects still in it", id.0, map.len());
        }
        Some(map)
    }

    pub fn map(&self, id: MapId, instance_id: InstanceId) -> Option<&Map> {
        self.maps.get(&(id, instance_id))
    }

    pub fn map_mut(&mut self, id: MapId, instance_id: InstanceId) -> Option<&mut Map> {
        self.maps.get_mut(&(id, instance_id))
    }

    pub fn maps(&self) -> impl Iterator<Item = &Map> {
        self.maps.values()
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn object_count(&self) -> usize {
        self.maps.values().map(Map::len).sum()
    }

    /// Adds an object to the map its location names.
    pub fn add_object(&mut self, object: WorldObject) -> Result<(), ReplicationError> {
        let location = *object.location();
        self.maps
            .get_mut(&(location.map_id, location.instance_id))
            .ok_or(ReplicationError::MapNotLoaded(location.map_id))?
            .add_to_map(object)
    }

    /// Ticks every map in parallel and returns the combined counters.
    pub fn tick(&mut self, diff_ms: u32) -> ReplicationStats {
        let stats = self
            .maps
            .par_iter_mut()
            .map(|(_, map)| map.tick(diff_ms))
            .reduce(ReplicationStats::default, ReplicationStats::merged);
        self.stats += stats;
        stats
    }

    /// Counters accumulated over every tick so far.
    pub fn stats(&self) -> ReplicationStats {
        self.stats
    }

    /// Moves an object to another location, possibly on another map.
    ///
    /// Across maps, the object is fully removed from the source first: every
    /// client tracking it has received its destroy block before it is
    /// inserted into the destination, where it spawns afresh.
    pub fn transfer(&mut self, guid: ObjectGuid, from: MapKey, to: WorldLocation) -> Result<(), ReplicationError> {
        let destination = (to.map_id, to.instance_id);
        if destination == from {
            return self
                .maps
                .get_mut(&from)
                .ok_or(ReplicationError::MapNotLoaded(from.0))?
                .relocate(guid, to.position);
        }
        if !self.maps.contains_key(&destination) {
            return Err(ReplicationError::MapNotLoaded(to.map_id));
        }

        let source = self.maps.get_mut(&from).ok_or(ReplicationError::MapNotLoaded(from.0))?;
        let mut object = source.remove_from_map(guid)?;
        object.set_location(to);
        object.set_new_spawn(true);

        let target = self.maps.get_mut(&destination).ok_or(ReplicationError::MapNotLoaded(to.map_id))?;
        target.add_to_map(object).inspect_err(|err| {
            error!("❌ Lost object {} while transferring it to map {}: {}", guid, to.map_id.0, err);
        })?;
        info!("🚀 Transferred {} from map {} to map {}", guid, from.0 .0, to.map_id.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::RecordingTransport;
    use crate::terrain::OpenTerrain;
    use crate::types::{Position, Team};

    fn world() -> World {
        World::new(
            ReplicationConfig::default(),
            Arc::new(OpenTerrain::default()),
            Arc::new(RecordingTransport::new()),
        )
        .unwrap()
    }

    #[test]
    fn objects_need_a_loaded_map() {
        let mut world = world();
        let location = WorldLocation::new(MapId(0), InstanceId(0), Position::default());
        let player = WorldObject::player(1, location, Team::Horde);
        assert!(matches!(
            world.add_object(player.clone()),
            Err(ReplicationError::MapNotLoaded(MapId(0)))
        ));

        world.create_map(MapId(0), InstanceId(0), MapKind::Continent);
        world.create_map(MapId(0), InstanceId(0), MapKind::Continent);
        assert_eq!(world.map_count(), 1);
        world.add_object(player).unwrap();
        assert_eq!(world.object_count(), 1);
    }

    #[test]
    fn tick_merges_every_map() {
        let mut world = world();
        for map in [0, 1, 530] {
            world.create_map(MapId(map), InstanceId(0), MapKind::Continent);
            let location = WorldLocation::new(MapId(map), InstanceId(0), Position::default());
            world
                .add_object(WorldObject::player(map as u64 + 1, location, Team::Alliance))
                .unwrap();
        }

        let stats = world.tick(50);
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.create_blocks, 3);
        assert_eq!(world.stats(), stats);
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = ReplicationConfig::default();
        config.grid.cell_size = 0.0;
        assert!(matches!(
            World::new(config, Arc::new(OpenTerrain::default()), Arc::new(RecordingTransport::new())),
            Err(ReplicationError::Config(_))
        ));
    }
}
