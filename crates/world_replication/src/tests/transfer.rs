use super::{count, received, summary};
use crate::entity::WorldObject;
use crate::error::ReplicationError;
use crate::replication::{RecordingTransport, World};
use crate::terrain::OpenTerrain;
use crate::types::{InstanceId, MapId, MapKind, Position, Team, WorldLocation};
use crate::update::UpdateType;
use crate::ReplicationConfig;
use std::sync::Arc;

const EASTERN: (MapId, InstanceId) = (MapId(0), InstanceId(0));
const DUNGEON: (MapId, InstanceId) = (MapId(36), InstanceId(4));

fn on(map: (MapId, InstanceId), x: f32) -> WorldLocation {
    WorldLocation::new(map.0, map.1, Position::new(x, 0.0, 0.0))
}

fn world() -> (World, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let mut world = World::new(
        ReplicationConfig::default(),
        Arc::new(OpenTerrain::default()),
        transport.clone(),
    )
    .unwrap();
    world.create_map(EASTERN.0, EASTERN.1, MapKind::Continent);
    world.create_map(DUNGEON.0, DUNGEON.1, MapKind::Instance);
    (world, transport)
}

#[test]
fn transfer_destroys_on_the_source_before_spawning_on_the_destination() {
    let (mut world, transport) = world();
    let traveller = WorldObject::player(1, on(EASTERN, 0.0), Team::Alliance);
    let bystander = WorldObject::player(2, on(EASTERN, 5.0), Team::Alliance);
    let waiting = WorldObject::player(3, on(DUNGEON, 5.0), Team::Alliance);
    let (traveller_guid, bystander_guid, waiting_guid) = (traveller.guid(), bystander.guid(), waiting.guid());
    world.add_object(traveller).unwrap();
    world.add_object(bystander).unwrap();
    world.add_object(waiting).unwrap();
    world.tick(100);
    for guid in [traveller_guid, bystander_guid, waiting_guid] {
        received(&transport, guid);
    }

    world.transfer(traveller_guid, EASTERN, on(DUNGEON, 0.0)).unwrap();

    // The source map has already told its clients.
    assert_eq!(
        summary(&received(&transport, bystander_guid)),
        vec![(UpdateType::Destroy, traveller_guid)]
    );
    assert!(received(&transport, traveller_guid).is_empty());
    assert!(world.map(EASTERN.0, EASTERN.1).unwrap().object(traveller_guid).is_none());
    assert!(world
        .map(DUNGEON.0, DUNGEON.1)
        .unwrap()
        .object(traveller_guid)
        .is_some_and(WorldObject::is_new_spawn));

    world.tick(100);

    let mine = received(&transport, traveller_guid);
    assert_eq!(mine.len(), 2);
    assert_eq!(count(&mine, UpdateType::CreateObject2, traveller_guid), 1);
    assert_eq!(count(&mine, UpdateType::CreateObject, waiting_guid), 1);
    assert_eq!(
        summary(&received(&transport, waiting_guid)),
        vec![(UpdateType::CreateObject2, traveller_guid)]
    );
    assert!(received(&transport, bystander_guid).is_empty());
}

#[test]
fn transfer_within_a_map_is_a_relocation() {
    let (mut world, transport) = world();
    let traveller = WorldObject::player(1, on(EASTERN, 0.0), Team::Horde);
    let creature = WorldObject::creature(3100, 1, on(EASTERN, 300.0));
    let (traveller_guid, creature_guid) = (traveller.guid(), creature.guid());
    world.add_object(traveller).unwrap();
    world.add_object(creature).unwrap();
    world.tick(100);
    received(&transport, traveller_guid);

    world.transfer(traveller_guid, EASTERN, on(EASTERN, 295.0)).unwrap();
    world.tick(100);

    assert_eq!(
        summary(&received(&transport, traveller_guid)),
        vec![(UpdateType::CreateObject, creature_guid)]
    );
}

#[test]
fn transfer_to_an_unloaded_map_keeps_the_object() {
    let (mut world, _) = world();
    let traveller = WorldObject::player(1, on(EASTERN, 0.0), Team::Horde);
    let guid = traveller.guid();
    world.add_object(traveller).unwrap();

    let nowhere = WorldLocation::new(MapId(999), InstanceId(0), Position::default());
    assert!(matches!(
        world.transfer(guid, EASTERN, nowhere),
        Err(ReplicationError::MapNotLoaded(MapId(999)))
    ));
    assert!(world.map(EASTERN.0, EASTERN.1).unwrap().object(guid).is_some());
}
