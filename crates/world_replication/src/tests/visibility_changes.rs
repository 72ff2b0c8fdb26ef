use super::{at, count, received, summary, test_map};
use crate::entity::concealment::INVISIBILITY_GENERAL;
use crate::entity::WorldObject;
use crate::types::{PhaseSet, Team};
use crate::update::UpdateType;

#[test]
fn game_master_mode_hides_and_reveals_the_player() {
    let (mut map, transport) = test_map();
    let gm = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let other = WorldObject::player(2, at(5.0, 0.0), Team::Alliance);
    let (gm_guid, other_guid) = (gm.guid(), other.guid());
    map.add_to_map(gm).unwrap();
    map.add_to_map(other).unwrap();
    map.tick(100);
    received(&transport, gm_guid);
    received(&transport, other_guid);

    map.modify_visibility(gm_guid, |object| object.set_game_master(true, 1)).unwrap();
    map.tick(100);
    assert_eq!(summary(&received(&transport, other_guid)), vec![(UpdateType::Destroy, gm_guid)]);
    // The GM keeps seeing everybody and learns about its own flag change.
    assert!(map.tracking().knows(gm_guid, other_guid));
    assert_eq!(summary(&received(&transport, gm_guid)), vec![(UpdateType::Values, gm_guid)]);

    map.modify_visibility(gm_guid, |object| object.set_game_master(false, 0)).unwrap();
    map.tick(100);
    assert_eq!(summary(&received(&transport, other_guid)), vec![(UpdateType::CreateObject, gm_guid)]);
}

#[test]
fn phase_changes_swap_what_a_player_sees() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let creature = WorldObject::creature(3100, 1, at(10.0, 0.0));
    let (me_guid, creature_guid) = (me.guid(), creature.guid());
    map.add_to_map(me).unwrap();
    map.add_to_map(creature).unwrap();
    map.tick(100);
    received(&transport, me_guid);

    map.modify_visibility(creature_guid, |object| object.phases = PhaseSet::from_phases([2]))
        .unwrap();
    map.tick(100);
    assert_eq!(summary(&received(&transport, me_guid)), vec![(UpdateType::Destroy, creature_guid)]);

    map.modify_visibility(me_guid, |object| object.phases = PhaseSet::from_phases([PhaseSet::DEFAULT_PHASE, 2]))
        .unwrap();
    map.tick(100);
    assert_eq!(summary(&received(&transport, me_guid)), vec![(UpdateType::CreateObject, creature_guid)]);
}

#[test]
fn invisibility_needs_matching_detection() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let creature = WorldObject::creature(3100, 1, at(10.0, 0.0));
    let (me_guid, creature_guid) = (me.guid(), creature.guid());
    map.add_to_map(me).unwrap();
    map.add_to_map(creature).unwrap();
    map.tick(100);
    received(&transport, me_guid);

    map.modify_visibility(creature_guid, |object| {
        object.concealment.invisibility.apply(INVISIBILITY_GENERAL, 100)
    })
    .unwrap();
    map.tick(100);
    assert_eq!(summary(&received(&transport, me_guid)), vec![(UpdateType::Destroy, creature_guid)]);

    map.modify_visibility(me_guid, |object| {
        object.concealment.invisibility_detect.apply(INVISIBILITY_GENERAL, 50)
    })
    .unwrap();
    map.tick(100);
    assert!(received(&transport, me_guid).is_empty());

    map.modify_visibility(me_guid, |object| {
        object.concealment.invisibility_detect.apply(INVISIBILITY_GENERAL, 100)
    })
    .unwrap();
    map.tick(100);
    assert_eq!(summary(&received(&transport, me_guid)), vec![(UpdateType::CreateObject, creature_guid)]);
}

#[test]
fn far_sight_reveals_objects_around_the_viewpoint() {
    let (mut map, transport) = test_map();
    let me = WorldObject::player(1, at(0.0, 0.0), Team::Alliance);
    let me_guid = me.guid();
    let eye = WorldObject::dynamic_object(1, me_guid, 6196, 5.0, at(400.0, 0.0));
    let creature = WorldObject::creature(3100, 1, at(410.0, 0.0));
    let (eye_guid, creature_guid) = (eye.guid(), creature.guid());
    map.add_to_map(me).unwrap();
    map.add_to_map(eye).unwrap();
    map.add_to_map(creature).unwrap();
    map.tick(100);
    received(&transport, me_guid);
    assert!(!map.tracking().knows(me_guid, creature_guid));

    map.modify_visibility(me_guid, |object| {
        if let Some(player) = object.as_player_mut() {
            player.viewpoint = Some(eye_guid);
        }
    })
    .unwrap();
    map.tick(100);

    let blocks = received(&transport, me_guid);
    assert_eq!(count(&blocks, UpdateType::CreateObject, creature_guid), 1);
    assert_eq!(count(&blocks, UpdateType::CreateObject, eye_guid), 1);
    assert!(map.tracking().knows(me_guid, creature_guid));

    map.modify_visibility(me_guid, |object| {
        if let Some(player) = object.as_player_mut() {
            player.viewpoint = None;
        }
    })
    .unwrap();
    map.tick(100);
    let blocks = received(&transport, me_guid);
    assert_eq!(summary(&blocks), vec![(UpdateType::Destroy, creature_guid)]);
    // Its own dynamic object stays known to the caster at any distance.
    assert!(map.tracking().knows(me_guid, eye_guid));
}
