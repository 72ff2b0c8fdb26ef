use super::{at, count, received, summary, test_map};
use crate::entity::WorldObject;
use crate::fields::layout::{player, unit};
use crate::types::{Position, Team};
use crate::update::{DecodedBlock, UpdateType};

#[test]
fn spawn_creates_only_for_players_in_range() {
    let (mut map, transport) = test_map();
    let near = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let far = WorldObject::player(2, at(400.0, 0.0), Team::Alliance);
    let creature = WorldObject::creature(3100, 1, at(10.0, 0.0));
    let (near_guid, far_guid, creature_guid) = (near.guid(), far.guid(), creature.guid());
    map.add_to_map(near).unwrap();
    map.add_to_map(far).unwrap();
    map.add_to_map(creature).unwrap();

    map.tick(100);

    let blocks = received(&transport, near_guid);
    assert_eq!(blocks.len(), 2);
    assert_eq!(count(&blocks, UpdateType::CreateObject2, near_guid), 1);
    assert_eq!(count(&blocks, UpdateType::CreateObject2, creature_guid), 1);
    let far_blocks = received(&transport, far_guid);
    assert_eq!(summary(&far_blocks), vec![(UpdateType::CreateObject2, far_guid)]);
    assert!(!map.tracking().knows(far_guid, creature_guid));
}

#[test]
fn leaving_and_reentering_range_destroys_and_creates_once() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Horde);
    let creature = WorldObject::creature(3100, 1, at(10.0, 0.0));
    let (me_guid, creature_guid) = (me.guid(), creature.guid());
    map.add_to_map(me).unwrap();
    map.add_to_map(creature).unwrap();
    map.tick(100);
    received(&transport, me_guid);

    map.relocate(me_guid, Position::new(200.0, 0.0, 0.0)).unwrap();
    map.tick(100);
    let blocks = received(&transport, me_guid);
    assert_eq!(summary(&blocks), vec![(UpdateType::Destroy, creature_guid)]);
    assert!(!map.tracking().knows(me_guid, creature_guid));

    // Staying out of range sends nothing more.
    map.relocate(me_guid, Position::new(210.0, 0.0, 0.0)).unwrap();
    map.tick(100);
    assert!(received(&transport, me_guid).is_empty());

    map.relocate(me_guid, Position::new(0.0, 0.0, 0.0)).unwrap();
    map.tick(100);
    let blocks = received(&transport, me_guid);
    assert_eq!(summary(&blocks), vec![(UpdateType::CreateObject, creature_guid)]);
    assert!(map.tracking().knows(me_guid, creature_guid));
}

#[test]
fn values_follow_creates_on_later_ticks() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let creature = WorldObject::creature(3100, 1, at(10.0, 0.0));
    let (me_guid, creature_guid) = (me.guid(), creature.guid());
    map.add_to_map(me).unwrap();
    map.add_to_map(creature).unwrap();
    map.tick(100);
    received(&transport, me_guid);

    map.modify(creature_guid, |object| object.fields.set(unit::HEALTH, 17)).unwrap();
    map.tick(100);

    let blocks = received(&transport, me_guid);
    assert_eq!(summary(&blocks), vec![(UpdateType::Values, creature_guid)]);
    let DecodedBlock::Values { fields, .. } = &blocks[0] else {
        panic!("expected a values block");
    };
    assert_eq!(fields.scalar(unit::HEALTH.offset()), Some(17));
    assert!(!map.is_queued_for_update(creature_guid));

    // Nothing changed since: nothing is sent.
    map.tick(100);
    assert!(received(&transport, me_guid).is_empty());
}

#[test]
fn same_tick_mutation_is_folded_into_the_create() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let me_guid = me.guid();
    map.add_to_map(me).unwrap();
    map.tick(100);
    received(&transport, me_guid);

    let creature = WorldObject::creature(3100, 2, at(5.0, 0.0));
    let creature_guid = creature.guid();
    map.add_to_map(creature).unwrap();
    map.modify(creature_guid, |object| object.fields.set(unit::HEALTH, 33)).unwrap();
    map.tick(100);

    let blocks = received(&transport, me_guid);
    assert_eq!(count(&blocks, UpdateType::CreateObject2, creature_guid), 1);
    assert_eq!(count(&blocks, UpdateType::Values, creature_guid), 0);
    let DecodedBlock::Create { fields, .. } = &blocks[0] else {
        panic!("expected a create block");
    };
    assert_eq!(fields.scalar(unit::HEALTH.offset()), Some(33));
}

#[test]
fn private_changes_only_reach_their_owner() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let other = WorldObject::player(2, at(5.0, 0.0), Team::Alliance);
    let (me_guid, other_guid) = (me.guid(), other.guid());
    map.add_to_map(me).unwrap();
    map.add_to_map(other).unwrap();
    map.tick(100);
    received(&transport, me_guid);
    received(&transport, other_guid);
    assert!(map.tracking().knows(other_guid, me_guid));

    map.modify(me_guid, |object| object.fields.set(player::XP, 4000)).unwrap();
    map.tick(100);

    let mine = received(&transport, me_guid);
    assert_eq!(summary(&mine), vec![(UpdateType::Values, me_guid)]);
    let DecodedBlock::Values { fields, .. } = &mine[0] else {
        panic!("expected a values block");
    };
    assert_eq!(fields.scalar(player::XP.offset()), Some(4000));
    assert!(received(&transport, other_guid).is_empty());
}
