use super::stats::ReplicationStats;
use super::tracking::TrackingRegistry;
use super::transport::Transport;
use crate::config::{NetworkConfig, ReplicationConfig};
use crate::entity::{EntityKind, ObjectAccessor, ObjectRegistry, WorldObject};
use crate::error::ReplicationError;
use crate::grid::{GridNotifier, MessageDistDeliverer, PlayerRelocationNotifier, SpatialGrid, VisibleChangesNotifier};
use crate::terrain::TerrainProvider;
use crate::types::{InstanceId, MapId, MapKind, ObjectGuid, Position};
use crate::update::{is_compressed_packet, UpdateBlock, UpdateBlockBuilder, UpdateData};
use crate::visibility::VisibilityRules;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Blocks collected during one tick, one [`UpdateData`] per observer.
struct Outbox {
    map_id: MapId,
    updates: BTreeMap<ObjectGuid, UpdateData>,
    /// `(observer, object)` pairs that received a create block this tick.
    created: HashSet<(ObjectGuid, ObjectGuid)>,
    stats: ReplicationStats,
}

impl Outbox {
    fn new(map_id: MapId) -> Self {
        Self {
            map_id,
            updates: BTreeMap::new(),
            created: HashSet::new(),
            stats: ReplicationStats::default(),
        }
    }

    fn push(&mut self, observer: ObjectGuid, block: UpdateBlock) {
        self.stats.record_block(block.update_type);
        let map_id = self.map_id;
        self.updates
            .entry(observer)
            .or_insert_with(|| UpdateData::new(map_id))
            .add_block(block);
    }
}

/// One map instance and its replication scheduler.
///
/// The map owns its entities, their spatial index and the tracking sets of
/// the players on it. Mutations only record what has to be replicated; all
/// blocks are built and sent by [`tick`](Self::tick), in this order:
///
/// 1. visibility of every relocated or visibility-changed object, destroys
///    before creates for each pair,
/// 2. values blocks for mutated objects, sent only to observers already
///    tracking them,
/// 3. destroy blocks for despawns requested since the last tick,
/// 4. one packet group per observer, handed to the transport.
///
/// A map is only ever driven by one thread at a time.
#[derive(Debug)]
pub struct Map {
    id: MapId,
    instance_id: InstanceId,
    kind: MapKind,
    rules: VisibilityRules,
    network: NetworkConfig,
    objects: ObjectRegistry,
    grid: SpatialGrid,
    tracking: TrackingRegistry,
    /// Objects visible beyond the normal walk radius.
    large_objects: BTreeSet<ObjectGuid>,
    update_queue: BTreeSet<ObjectGuid>,
    visibility_queue: BTreeSet<ObjectGuid>,
    pending_despawns: BTreeSet<ObjectGuid>,
    spawned: Vec<ObjectGuid>,
    transport: Arc<dyn Transport>,
    server_time: u32,
    stats: ReplicationStats,
}

impl Map {
    pub fn new(
        id: MapId,
        instance_id: InstanceId,
        kind: MapKind,
        config: &ReplicationConfig,
        terrain: Arc<dyn TerrainProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id,
            instance_id,
            kind,
            rules: VisibilityRules::new(config.visibility.clone(), kind, terrain),
            network: config.network.clone(),
            objects: ObjectRegistry::new(),
            grid: SpatialGrid::new(config.grid.cell_size),
            tracking: TrackingRegistry::new(),
            large_objects: BTreeSet::new(),
            update_queue: BTreeSet::new(),
            visibility_queue: BTreeSet::new(),
            pending_despawns: BTreeSet::new(),
            spawned: Vec::new(),
            transport,
            server_time: 0,
            stats: ReplicationStats::default(),
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn kind(&self) -> MapKind {
        self.kind
    }

    pub fn rules(&self) -> &VisibilityRules {
        &self.rules
    }

    pub fn tracking(&self) -> &TrackingRegistry {
        &self.tracking
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn object(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.objects.get(guid)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Milliseconds of simulated time since the map was created.
    pub fn server_time(&self) -> u32 {
        self.server_time
    }

    /// Counters accumulated over every tick so far.
    pub fn stats(&self) -> ReplicationStats {
        self.stats
    }

    pub fn is_pending_despawn(&self, guid: ObjectGuid) -> bool {
        self.pending_despawns.contains(&guid)
    }

    pub fn is_queued_for_update(&self, guid: ObjectGuid) -> bool {
        self.update_queue.contains(&guid)
    }

    /// Runs a notifier over the cells around `center`.
    pub fn visit<N: GridNotifier + ?Sized>(&self, center: &Position, radius: f32, notifier: &mut N) {
        self.grid.visit(center, radius, &self.objects, notifier);
    }

    fn object_mut(&mut self, guid: ObjectGuid) -> Result<&mut WorldObject, ReplicationError> {
        self.objects.get_mut(guid).ok_or(ReplicationError::ObjectNotFound(guid))
    }

    /// Puts an object into the world. Observers learn about it on the next tick.
    pub fn add_to_map(&mut self, mut object: WorldObject) -> Result<(), ReplicationError> {
        let guid = object.guid();
        let location = object.location();
        if location.map_id != self.id || location.instance_id != self.instance_id {
            return Err(ReplicationError::WrongMap {
                guid,
                expected: self.id,
                actual: location.map_id,
            });
        }
        if self.objects.contains(guid) {
            return Err(ReplicationError::DuplicateObject(guid));
        }

        object.set_in_world(true);
        object.invisible_due_to_despawn = false;
        object.fields.clear_dirty();
        self.grid.insert(&object);
        if object.far_visible || object.is_visibility_overridden() {
            self.large_objects.insert(guid);
        }
        if let Err(object) = self.objects.insert(object) {
            self.grid.remove(guid);
            return Err(ReplicationError::DuplicateObject(object.guid()));
        }

        self.spawned.push(guid);
        self.visibility_queue.insert(guid);
        debug!(map = self.id.0, %guid, "Object added to map");
        Ok(())
    }

    /// Takes an object out of the world at once.
    ///
    /// Every client tracking it gets its destroy block before this returns,
    /// so the object can be handed to another map right away.
    pub fn remove_from_map(&mut self, guid: ObjectGuid) -> Result<WorldObject, ReplicationError> {
        if !self.objects.contains(guid) {
            return Err(ReplicationError::ObjectNotFound(guid));
        }
        self.update_queue.remove(&guid);
        self.visibility_queue.remove(&guid);
        self.pending_despawns.remove(&guid);

        let mut outbox = Outbox::new(self.id);
        self.destroy_for_trackers(&mut outbox, guid);
        self.tracking.remove_observer(guid);
        self.flush(outbox);

        self.grid.remove(guid);
        self.large_objects.remove(&guid);
        self.spawned.retain(|spawned| *spawned != guid);
        let mut object = self.objects.remove(guid).ok_or(ReplicationError::ObjectNotFound(guid))?;
        object.set_in_world(false);
        debug!(map = self.id.0, %guid, "Object removed from map");
        Ok(object)
    }

    /// Schedules a despawn for the next tick.
    ///
    /// The object stops being visible to anyone new and receives no more
    /// values blocks; its destroy blocks go out on the next tick.
    pub fn request_despawn(&mut self, guid: ObjectGuid) -> Result<(), ReplicationError> {
        let object = self.object_mut(guid)?;
        object.invisible_due_to_despawn = true;
        self.pending_despawns.insert(guid);
        self.update_queue.remove(&guid);
        Ok(())
    }

    /// Moves an object within the map and schedules a visibility update.
    pub fn relocate(&mut self, guid: ObjectGuid, position: Position) -> Result<(), ReplicationError> {
        let object = self.objects.get_mut(guid).ok_or(ReplicationError::ObjectNotFound(guid))?;
        object.set_position(position);
        if self.grid.relocate(object) {
            trace!(%guid, "Object changed cells");
        }
        self.visibility_queue.insert(guid);
        Ok(())
    }

    /// Mutates an object's fields. Changes are flushed on the next tick.
    pub fn modify<R>(&mut self, guid: ObjectGuid, change: impl FnOnce(&mut WorldObject) -> R) -> Result<R, ReplicationError> {
        let object = self.object_mut(guid)?;
        let result = change(object);
        if object.fields.has_pending_update() {
            self.update_queue.insert(guid);
        }
        Ok(result)
    }

    /// Mutates anything that can change who sees the object: concealment,
    /// phases, GM mode, group, viewpoint or visibility range.
    pub fn modify_visibility<R>(
        &mut self,
        guid: ObjectGuid,
        change: impl FnOnce(&mut WorldObject) -> R,
    ) -> Result<R, ReplicationError> {
        let result = self.modify(guid, change)?;
        if let Some(object) = self.objects.get(guid) {
            if object.far_visible || object.is_visibility_overridden() {
                self.large_objects.insert(guid);
            } else {
                self.large_objects.remove(&guid);
            }
        }
        self.visibility_queue.insert(guid);
        Ok(result)
    }

    /// Schedules a values flush for an object.
    pub fn add_to_update_queue(&mut self, guid: ObjectGuid) -> bool {
        if !self.objects.contains(guid) || self.pending_despawns.contains(&guid) {
            return false;
        }
        self.update_queue.insert(guid)
    }

    pub fn remove_from_update_queue(&mut self, guid: ObjectGuid) -> bool {
        self.update_queue.remove(&guid)
    }

    /// Sends `message` to every player within `radius` of `source` whose client
    /// knows the source, returning the number of receivers.
    pub fn broadcast(
        &mut self,
        source: ObjectGuid,
        message: Bytes,
        radius: f32,
        own_team_only: bool,
    ) -> Result<usize, ReplicationError> {
        let object = self.objects.get(source).ok_or(ReplicationError::ObjectNotFound(source))?;
        let mut deliverer =
            MessageDistDeliverer::new(object, message, radius, &self.objects, &self.tracking).own_team_only(own_team_only);
        self.grid.visit(object.position(), radius, &self.objects, &mut deliverer);

        let deliveries = deliverer.into_deliveries();
        for (receiver, message) in &deliveries {
            self.transport.send(*receiver, message.clone());
        }
        self.stats.messages_delivered += deliveries.len() as u64;
        Ok(deliveries.len())
    }

    /// Runs one replication step and returns what it produced.
    pub fn tick(&mut self, diff_ms: u32) -> ReplicationStats {
        self.server_time = self.server_time.wrapping_add(diff_ms);
        let mut outbox = Outbox::new(self.id);

        self.process_visibility(&mut outbox);
        self.process_values(&mut outbox);
        self.process_despawns(&mut outbox);

        for guid in std::mem::take(&mut self.spawned) {
            if let Some(object) = self.objects.get_mut(guid) {
                object.set_new_spawn(false);
            }
        }

        outbox.stats.ticks = 1;
        let stats = self.flush(outbox);
        if stats.total_blocks() > 0 {
            trace!(
                map = self.id.0,
                creates = stats.create_blocks,
                values = stats.values_blocks,
                destroys = stats.destroy_blocks,
                "Map tick replicated"
            );
        }
        stats
    }

    fn process_visibility(&mut self, outbox: &mut Outbox) {
        for guid in std::mem::take(&mut self.visibility_queue) {
            let Some(object) = self.objects.get(guid) else {
                continue;
            };
            let is_player = object.is_player();
            let viewers = self.viewers_of(object);

            if is_player {
                if self.tracking.track(guid, guid) {
                    self.queue_create(outbox, guid, guid);
                }
                self.update_observer(outbox, guid);
            }
            self.update_observers_of(outbox, guid);
            for viewer in viewers {
                self.update_observer(outbox, viewer);
            }
        }
    }

    /// Players currently looking through `object`.
    fn viewers_of(&self, object: &WorldObject) -> Vec<ObjectGuid> {
        let mut candidates: Vec<ObjectGuid> = object
            .unit()
            .map(|unit| unit.shared_vision.iter().copied().collect())
            .unwrap_or_default();
        if object.kind() == EntityKind::DynamicObject {
            candidates.extend(object.owner_guid());
        }
        candidates.retain(|guid| {
            self.objects
                .get(*guid)
                .and_then(WorldObject::as_player)
                .is_some_and(|player| player.viewpoint == Some(object.guid()))
        });
        candidates
    }

    /// Re-evaluates everything around one player.
    fn update_observer(&mut self, outbox: &mut Outbox, observer_guid: ObjectGuid) {
        let diff = {
            let Some(observer) = self.objects.get(observer_guid) else {
                return;
            };
            let empty = HashSet::new();
            let known = self.tracking.known_by(observer_guid).unwrap_or(&empty);
            let center = *observer
                .as_player()
                .and_then(|player| player.viewpoint)
                .and_then(|guid| self.objects.get(guid))
                .unwrap_or(observer)
                .position();
            let radius = self.rules.sight_range(observer, None);

            let mut notifier = PlayerRelocationNotifier::new(&self.rules, observer, &self.objects, known);
            self.grid.visit(&center, radius, &self.objects, &mut notifier);
            for large in self.large_objects.iter().filter_map(|guid| self.objects.get(*guid)) {
                notifier.visit(large.kind(), &[large]);
            }
            notifier.finish()
        };

        outbox.stats.visibility_evaluations += diff.evaluations;
        for object in diff.vanished {
            if self.tracking.untrack(observer_guid, object) {
                self.queue_destroy(outbox, observer_guid, object);
            }
        }
        for object in diff.appeared {
            if self.tracking.track(observer_guid, object) {
                self.queue_create(outbox, observer_guid, object);
            }
        }
    }

    /// Re-evaluates every player that may see one object.
    fn update_observers_of(&mut self, outbox: &mut Outbox, target_guid: ObjectGuid) {
        let diff = {
            let Some(target) = self.objects.get(target_guid) else {
                return;
            };
            let empty = HashSet::new();
            let trackers = self.tracking.trackers_of(target_guid).unwrap_or(&empty);
            let radius = self.observed_radius(target);

            let mut notifier = VisibleChangesNotifier::new(&self.rules, target, &self.objects, trackers);
            self.grid.visit(target.position(), radius, &self.objects, &mut notifier);
            notifier.finish()
        };

        outbox.stats.visibility_evaluations += diff.evaluations;
        for observer in diff.vanished {
            if self.tracking.untrack(observer, target_guid) {
                self.queue_destroy(outbox, observer, target_guid);
            }
        }
        for observer in diff.appeared {
            if self.tracking.track(observer, target_guid) {
                self.queue_create(outbox, observer, target_guid);
            }
        }
    }

    /// Radius around an object inside which players may see it.
    fn observed_radius(&self, target: &WorldObject) -> f32 {
        match target.visibility_range_override {
            Some(range) => range,
            None if target.far_visible => self.rules.config().max_visibility_distance,
            None => self.rules.map_range(),
        }
    }

    fn builder(&self) -> UpdateBlockBuilder<'_> {
        UpdateBlockBuilder::new(&self.objects, self.server_time)
    }

    fn queue_create(&self, outbox: &mut Outbox, observer: ObjectGuid, guid: ObjectGuid) {
        let Some(object) = self.objects.get(guid) else {
            warn!(%observer, object = %guid, "⚠️ Cannot build create block for unknown object");
            return;
        };
        if let Some(block) = self.builder().build_create(object, self.objects.get(observer)) {
            outbox.created.insert((observer, guid));
            outbox.push(observer, block);
        }
    }

    fn queue_destroy(&self, outbox: &mut Outbox, observer: ObjectGuid, guid: ObjectGuid) {
        if let Some(block) = self.builder().build_destroy(guid, self.objects.get(observer)) {
            outbox.push(observer, block);
        }
    }

    /// Destroys `guid` on every client tracking it and forgets those pairs.
    fn destroy_for_trackers(&mut self, outbox: &mut Outbox, guid: ObjectGuid) {
        for observer in self.tracking.remove_object(guid) {
            if observer != guid {
                self.queue_destroy(outbox, observer, guid);
            }
        }
    }

    fn process_values(&mut self, outbox: &mut Outbox) {
        for guid in std::mem::take(&mut self.update_queue) {
            if self.pending_despawns.contains(&guid) {
                continue;
            }
            let Some(object) = self.objects.get(guid) else {
                continue;
            };
            let builder = self.builder();
            for observer in self.tracking.sorted_trackers(guid) {
                if outbox.created.contains(&(observer, guid)) {
                    continue;
                }
                if let Some(block) = builder.build_values(object, self.objects.get(observer)) {
                    outbox.push(observer, block);
                }
            }
            if let Some(object) = self.objects.get_mut(guid) {
                object.fields.clear_dirty();
            }
        }
    }

    fn process_despawns(&mut self, outbox: &mut Outbox) {
        for guid in std::mem::take(&mut self.pending_despawns) {
            self.destroy_for_trackers(outbox, guid);
            self.tracking.remove_observer(guid);
            self.grid.remove(guid);
            self.large_objects.remove(&guid);
            self.update_queue.remove(&guid);
            self.visibility_queue.remove(&guid);
            if self.objects.remove(guid).is_some() {
                debug!(map = self.id.0, %guid, "Object despawned");
            }
        }
    }

    fn flush(&mut self, outbox: Outbox) -> ReplicationStats {
        let Outbox { updates, mut stats, .. } = outbox;
        for (observer, data) in updates {
            for packet in data.build_packets(&self.network) {
                stats.packets_sent += 1;
                stats.bytes_sent += packet.len() as u64;
                if is_compressed_packet(&packet) {
                    stats.compressed_packets += 1;
                }
                self.transport.send(observer, packet);
            }
        }
        self.stats += stats;
        stats
    }
}

impl ObjectAccessor for Map {
    fn object(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.objects.get(guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{NearestCreatureEntryCheck, LastSearcher};
    use crate::replication::RecordingTransport;
    use crate::terrain::OpenTerrain;
    use crate::types::{Team, WorldLocation};

    fn map() -> (Map, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let map = Map::new(
            MapId(1),
            InstanceId(0),
            MapKind::Continent,
            &ReplicationConfig::default(),
            Arc::new(OpenTerrain::default()),
            transport.clone(),
        );
        (map, transport)
    }

    fn at(x: f32) -> WorldLocation {
        WorldLocation::new(MapId(1), InstanceId(0), Position::new(x, 0.0, 0.0))
    }

    #[test]
    fn objects_of_other_maps_are_rejected() {
        let (mut map, _) = map();
        let stray = WorldObject::creature(1, 1, WorldLocation::new(MapId(2), InstanceId(0), Position::default()));
        assert!(matches!(map.add_to_map(stray), Err(ReplicationError::WrongMap { .. })));

        let creature = WorldObject::creature(1, 1, at(0.0));
        map.add_to_map(creature.clone()).unwrap();
        assert!(matches!(map.add_to_map(creature), Err(ReplicationError::DuplicateObject(_))));
    }

    #[test]
    fn mutations_without_changes_are_not_queued() {
        let (mut map, _) = map();
        let creature = WorldObject::creature(1, 1, at(0.0));
        let guid = creature.guid();
        map.add_to_map(creature).unwrap();
        map.tick(100);

        map.modify(guid, |object| object.fields.set(crate::fields::layout::unit::HEALTH, 100))
            .unwrap();
        assert!(!map.is_queued_for_update(guid));
        map.modify(guid, |object| object.fields.set(crate::fields::layout::unit::HEALTH, 50))
            .unwrap();
        map.modify(guid, |object| object.fields.set(crate::fields::layout::unit::HEALTH, 40))
            .unwrap();
        assert!(map.is_queued_for_update(guid));
        assert!(matches!(
            map.modify(ObjectGuid::player(42), |_| ()),
            Err(ReplicationError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn searchers_run_over_the_map_grid() {
        let (mut map, _) = map();
        let player = WorldObject::player(1, at(0.0), Team::Alliance);
        let origin = *player.position();
        map.add_to_map(player.clone()).unwrap();
        for (counter, x) in [(1, 30.0), (2, 10.0), (3, 20.0)] {
            map.add_to_map(WorldObject::creature(77, counter, at(x))).unwrap();
        }

        let mut searcher = LastSearcher::new(NearestCreatureEntryCheck::new(&player, 77, true, 50.0));
        map.visit(&origin, 50.0, &mut searcher);
        assert_eq!(searcher.result().map(|guid| guid.counter()), Some(2));
    }

    #[test]
    fn new_spawn_flag_clears_after_the_first_tick() {
        let (mut map, transport) = map();
        let player = WorldObject::player(1, at(0.0), Team::Alliance);
        let guid = player.guid();
        map.add_to_map(player).unwrap();
        assert!(map.object(guid).unwrap().is_new_spawn());

        let stats = map.tick(100);
        assert!(!map.object(guid).unwrap().is_new_spawn());
        assert_eq!(stats.create_blocks, 1);
        assert_eq!(transport.len(), 1);
        assert_eq!(map.server_time(), 100);
    }
}
