//! Deterministic simulated population driving the replication core.
//!
//! Every map gets the same layout: players, creatures and game objects spread
//! over a sunflower pattern around the origin. Players walk circles, creatures
//! lose and regain health, and every few hundred ticks one player is sent to
//! the next map and one creature respawns. Each player owns a session whose
//! packets are drained after every tick.

use crate::config::{AppConfig, PopulationSettings};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use world_replication::entity::GameObjectType;
use world_replication::fields::layout::unit;
use world_replication::replication::{ChannelTransport, MapKey, ReplicationStats};
use world_replication::terrain::OpenTerrain;
use world_replication::{
    InstanceId, Map, MapId, ObjectGuid, Position, ReplicationError, Team, World, WorldLocation, WorldObject,
};

const GOLDEN_ANGLE: f32 = 2.399_963;
const WALK_RADIUS: f32 = 30.0;
/// Yards per second.
const WALK_SPEED: f32 = 7.0;
const HEALTH_PULSE_EVERY: u64 = 20;
const RESPAWN_EVERY: u64 = 150;
const TRANSFER_EVERY: u64 = 200;
const CREATURE_ENTRIES: [u32; 4] = [3100, 3101, 3108, 3120];
const CHEST_ENTRY: u32 = 2843;

struct Session {
    guid: ObjectGuid,
    receiver: UnboundedReceiver<Bytes>,
    packets: u64,
    bytes: u64,
}

struct Walker {
    guid: ObjectGuid,
    map: MapKey,
    center: Position,
    phase: f32,
}

struct Spawn {
    guid: ObjectGuid,
    map: MapKey,
    entry: u32,
    home: Position,
}

/// What a run produced, printed as JSON on shutdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub maps: usize,
    pub objects: usize,
    pub sessions: usize,
    pub packets_drained: u64,
    pub bytes_drained: u64,
    pub transfers: u64,
    pub respawns: u64,
    pub replication: ReplicationStats,
}

pub struct Simulation {
    world: World,
    transport: Arc<ChannelTransport>,
    map_keys: Vec<MapKey>,
    walkers: Vec<Walker>,
    creatures: Vec<Spawn>,
    sessions: Vec<Session>,
    next_counter: u64,
    ticks: u64,
    tick_interval_ms: u32,
    transfers: u64,
    respawns: u64,
}

impl Simulation {
    /// Loads every configured map and spawns the population on each of them.
    pub fn new(config: &AppConfig) -> Result<Self, ReplicationError> {
        let transport = Arc::new(ChannelTransport::new());
        let mut world = World::new(
            config.replication.clone(),
            Arc::new(OpenTerrain::default()),
            transport.clone(),
        )?;

        let mut map_keys = Vec::with_capacity(config.maps.len());
        for map in &config.maps {
            let key = (MapId(map.id), InstanceId(map.instance_id));
            world.create_map(key.0, key.1, map.kind);
            map_keys.push(key);
        }

        let mut simulation = Self {
            world,
            transport,
            map_keys,
            walkers: Vec::new(),
            creatures: Vec::new(),
            sessions: Vec::new(),
            next_counter: 1,
            ticks: 0,
            tick_interval_ms: u32::try_from(config.server.tick_interval_ms).unwrap_or(u32::MAX),
            transfers: 0,
            respawns: 0,
        };
        for key in simulation.map_keys.clone() {
            simulation.populate(key, &config.population)?;
        }
        info!(
            "👥 Spawned {} objects on {} maps ({} player sessions)",
            simulation.world.object_count(),
            simulation.world.map_count(),
            simulation.sessions.len()
        );
        Ok(simulation)
    }

    fn next_counter(&mut self) -> u64 {
        let counter = self.next_counter;
        self.next_counter += 1;
        counter
    }

    fn populate(&mut self, key: MapKey, population: &PopulationSettings) -> Result<(), ReplicationError> {
        let total = population.players_per_map + population.creatures_per_map + population.game_objects_per_map;
        let rotation = (population.seed % 360) as f32 * std::f32::consts::PI / 180.0;
        let location = |slot: u32| {
            let radius = population.spread * ((slot as f32 + 0.5) / total.max(1) as f32).sqrt();
            let angle = rotation + slot as f32 * GOLDEN_ANGLE;
            WorldLocation::new(key.0, key.1, Position::new(radius * angle.cos(), radius * angle.sin(), 0.0))
        };

        let mut slot = 0;
        for _ in 0..population.players_per_map {
            let counter = self.next_counter();
            let team = if counter % 2 == 0 { Team::Horde } else { Team::Alliance };
            let player = WorldObject::player(counter, location(slot), team);
            let guid = player.guid();
            self.walkers.push(Walker {
                guid,
                map: key,
                center: *player.position(),
                phase: slot as f32 * GOLDEN_ANGLE,
            });
            self.sessions.push(Session {
                guid,
                receiver: self.transport.register(guid),
                packets: 0,
                bytes: 0,
            });
            self.world.add_object(player)?;
            slot += 1;
        }

        for index in 0..population.creatures_per_map {
            let entry = CREATURE_ENTRIES[index as usize % CREATURE_ENTRIES.len()];
            let here = location(slot);
            let counter = self.next_counter();
            let creature = WorldObject::creature(entry, counter, here);
            self.creatures.push(Spawn {
                guid: creature.guid(),
                map: key,
                entry,
                home: here.position,
            });
            self.world.add_object(creature)?;
            slot += 1;
        }

        for _ in 0..population.game_objects_per_map {
            let counter = self.next_counter();
            self.world
                .add_object(WorldObject::game_object(CHEST_ENTRY, counter, location(slot), GameObjectType::Chest))?;
            slot += 1;
        }
        Ok(())
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advances the simulation by one tick and replicates it.
    pub fn tick(&mut self) -> ReplicationStats {
        self.ticks += 1;
        self.move_players();
        self.pulse_creatures();
        if self.ticks % RESPAWN_EVERY == 0 {
            self.respawn_creature();
        }
        if self.ticks % TRANSFER_EVERY == 0 {
            self.transfer_player();
        }

        let stats = self.world.tick(self.tick_interval_ms);
        self.drain_sessions();
        stats
    }

    fn move_players(&mut self) {
        let elapsed_secs = self.ticks as f32 * self.tick_interval_ms as f32 / 1000.0;
        let travelled = elapsed_secs * WALK_SPEED / WALK_RADIUS;
        for walker in &self.walkers {
            let angle = walker.phase + travelled;
            let position = Position::new(
                walker.center.x + WALK_RADIUS * angle.cos(),
                walker.center.y + WALK_RADIUS * angle.sin(),
                walker.center.z,
            );
            let moved = map_mut(&mut self.world, walker.map).and_then(|map| map.relocate(walker.guid, position));
            if let Err(err) = moved {
                warn!("⚠️ Could not move {}: {}", walker.guid, err);
            }
        }
    }

    fn pulse_creatures(&mut self) {
        let ticks = self.ticks;
        for (index, creature) in self.creatures.iter().enumerate() {
            if (index as u64 + ticks) % HEALTH_PULSE_EVERY != 0 {
                continue;
            }
            let health = 100 - ((ticks / HEALTH_PULSE_EVERY) % 10) as u32 * 10;
            let changed = map_mut(&mut self.world, creature.map)
                .and_then(|map| map.modify(creature.guid, |object| object.fields.set(unit::HEALTH, health)));
            if let Err(err) = changed {
                warn!("⚠️ Could not update {}: {}", creature.guid, err);
            }
        }
    }

    fn respawn_creature(&mut self) {
        if self.creatures.is_empty() {
            return;
        }
        let index = (self.ticks / RESPAWN_EVERY) as usize % self.creatures.len();
        let counter = self.next_counter();
        let spawn = &mut self.creatures[index];
        let replacement = WorldObject::creature(
            spawn.entry,
            counter,
            WorldLocation::new(spawn.map.0, spawn.map.1, spawn.home),
        );
        let new_guid = replacement.guid();

        let respawned = map_mut(&mut self.world, spawn.map).and_then(|map| {
            map.request_despawn(spawn.guid)?;
            map.add_to_map(replacement)
        });
        match respawned {
            Ok(()) => {
                debug!(old = %spawn.guid, new = %new_guid, "Creature respawned");
                spawn.guid = new_guid;
                self.respawns += 1;
            }
            Err(err) => warn!("⚠️ Could not respawn {}: {}", spawn.guid, err),
        }
    }

    fn transfer_player(&mut self) {
        if self.walkers.is_empty() || self.map_keys.len() < 2 {
            return;
        }
        let index = (self.ticks / TRANSFER_EVERY) as usize % self.walkers.len();
        let walker = &mut self.walkers[index];
        let next = self
            .map_keys
            .iter()
            .position(|key| *key == walker.map)
            .map_or(0, |position| (position + 1) % self.map_keys.len());
        let destination = self.map_keys[next];

        let to = WorldLocation::new(destination.0, destination.1, walker.center);
        match self.world.transfer(walker.guid, walker.map, to) {
            Ok(()) => {
                walker.map = destination;
                self.transfers += 1;
            }
            Err(err) => warn!("⚠️ Transfer of {} failed: {}", walker.guid, err),
        }
    }

    fn drain_sessions(&mut self) {
        for session in &mut self.sessions {
            while let Ok(packet) = session.receiver.try_recv() {
                session.packets += 1;
                session.bytes += packet.len() as u64;
            }
        }
    }

    /// Packets received so far by one player's session.
    pub fn session_packets(&self, guid: ObjectGuid) -> Option<u64> {
        self.sessions
            .iter()
            .find(|session| session.guid == guid)
            .map(|session| session.packets)
    }

    pub fn player_guids(&self) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.walkers.iter().map(|walker| walker.guid)
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            ticks: self.ticks,
            maps: self.world.map_count(),
            objects: self.world.object_count(),
            sessions: self.transport.session_count(),
            packets_drained: self.sessions.iter().map(|session| session.packets).sum(),
            bytes_drained: self.sessions.iter().map(|session| session.bytes).sum(),
            transfers: self.transfers,
            respawns: self.respawns,
            replication: self.world.stats(),
        }
    }
}

fn map_mut(world: &mut World, key: MapKey) -> Result<&mut Map, ReplicationError> {
    world.map_mut(key.0, key.1).ok_or(ReplicationError::MapNotLoaded(key.0))
}
