use super::{at, received, test_map};
use crate::entity::WorldObject;
use crate::error::ReplicationError;
use crate::types::{ObjectGuid, Team};
use bytes::Bytes;

#[test]
fn broadcast_reaches_players_within_the_radius_only() {
    let (mut map, transport) = test_map();
    let creature = WorldObject::creature(3100, 1, at(0.0, 0.0));
    let close = WorldObject::player(1, at(35.0, 0.0), Team::Alliance);
    let distant = WorldObject::player(2, at(45.0, 0.0), Team::Alliance);
    let (creature_guid, close_guid, distant_guid) = (creature.guid(), close.guid(), distant.guid());
    map.add_to_map(creature).unwrap();
    map.add_to_map(close).unwrap();
    map.add_to_map(distant).unwrap();
    map.tick(100);
    assert!(map.tracking().knows(distant_guid, creature_guid));
    transport.take();

    let message = Bytes::from_static(b"\x2a\x00emote");
    let delivered = map.broadcast(creature_guid, message.clone(), 40.0, false).unwrap();

    assert_eq!(delivered, 1);
    assert_eq!(transport.take(), vec![(close_guid, message)]);
    assert_eq!(map.stats().messages_delivered, 1);
}

#[test]
fn broadcast_skips_clients_that_do_not_know_the_source() {
    let (mut map, transport) = test_map();
    let creature = WorldObject::creature(3100, 1, at(0.0, 0.0));
    let creature_guid = creature.guid();
    map.add_to_map(creature).unwrap();
    map.tick(100);

    // Added after the tick: its client has not received the creature yet.
    let late = WorldObject::player(1, at(5.0, 0.0), Team::Horde);
    let late_guid = late.guid();
    map.add_to_map(late).unwrap();

    let delivered = map.broadcast(creature_guid, Bytes::from_static(b"hello"), 40.0, false).unwrap();
    assert_eq!(delivered, 0);
    assert!(received(&transport, late_guid).is_empty());

    assert!(matches!(
        map.broadcast(ObjectGuid::player(99), Bytes::new(), 40.0, false),
        Err(ReplicationError::ObjectNotFound(_))
    ));
}
