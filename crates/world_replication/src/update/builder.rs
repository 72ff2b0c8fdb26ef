use super::header::CreateObjectHeader;
use super::wire::WireWriter;
use super::{UpdateBlock, UpdateType};
use crate::entity::{ObjectAccessor, WorldObject};
use crate::fields::layout::unit;
use crate::fields::{DynamicChange, DynamicField, FieldFlags, FieldStore, UpdateMask};
use crate::types::{ObjectGuid, TypeId};
use tracing::debug;

/// Field categories `observer` may see on `object`.
///
/// Depends on the relationship between the two, so it is computed per pair.
pub fn visible_field_flags(object: &WorldObject, observer: &WorldObject, accessor: &dyn ObjectAccessor) -> FieldFlags {
    let mut flags = FieldFlags::PUBLIC;
    if observer.is_unit() {
        flags |= FieldFlags::UNIT_ALL;
    }
    if observer.guid() == object.guid() {
        return flags | FieldFlags::PRIVATE | FieldFlags::OWNER | FieldFlags::PARTY_MEMBER;
    }

    let owner = object.owner_guid();
    if owner == Some(observer.guid()) {
        flags |= FieldFlags::OWNER;
    }
    if object
        .unit()
        .is_some_and(|data| data.empathy_casters.contains(&observer.guid()))
    {
        flags |= FieldFlags::SPECIAL_INFO;
    }

    let owning_player = if object.is_player() {
        Some(object)
    } else {
        owner
            .and_then(|guid| accessor.object(guid))
            .filter(|owner| owner.is_player())
    };
    let same_group = owning_player
        .and_then(WorldObject::group)
        .is_some_and(|group| observer.group() == Some(group));
    if same_group {
        flags |= FieldFlags::PARTY_MEMBER;
    }
    flags
}

/// Builds create, values and destroy blocks for single observers.
///
/// Building for an absent observer produces nothing.
pub struct UpdateBlockBuilder<'a> {
    accessor: &'a dyn ObjectAccessor,
    server_time: u32,
}

impl<'a> UpdateBlockBuilder<'a> {
    pub fn new(accessor: &'a dyn ObjectAccessor, server_time: u32) -> Self {
        Self { accessor, server_time }
    }

    pub fn build_create(&self, object: &WorldObject, observer: Option<&WorldObject>) -> Option<UpdateBlock> {
        let Some(observer) = observer else {
            debug!(object = %object.guid(), "Skipping create block without an observer");
            return None;
        };

        let is_self = observer.guid() == object.guid();
        let update_type = if is_self || object.is_new_spawn() {
            UpdateType::CreateObject2
        } else {
            UpdateType::CreateObject
        };
        let type_id = match object.type_id() {
            TypeId::Player if is_self => TypeId::ActivePlayer,
            other => other,
        };

        let flags = visible_field_flags(object, observer, self.accessor);
        let layout = object.fields.layout();
        let scalars = layout.visible_slots(flags);
        let mut dynamic = layout.visible_dynamic(flags);
        for field in dynamic.clone().iter_set() {
            if object.fields.dynamic_values(DynamicField(field as u16)).is_empty() {
                dynamic.unset(field);
            }
        }

        let mut w = WireWriter::with_capacity(64 + scalars.count_ones() * 4);
        w.put_u8(update_type as u8);
        w.put_packed_guid(object.guid());
        w.put_u8(type_id as u8);
        CreateObjectHeader::for_object(object, observer.guid(), self.server_time).write(&mut w);
        write_scalars(&mut w, object, observer, &scalars);
        write_dynamic(&mut w, &object.fields, &dynamic, true);

        Some(UpdateBlock {
            update_type,
            guid: object.guid(),
            data: w.into_bytes(),
        })
    }

    /// Changed fields the observer may see, or nothing when there are none.
    pub fn build_values(&self, object: &WorldObject, observer: Option<&WorldObject>) -> Option<UpdateBlock> {
        let Some(observer) = observer else {
            debug!(object = %object.guid(), "Skipping values block without an observer");
            return None;
        };

        let flags = visible_field_flags(object, observer, self.accessor);
        let layout = object.fields.layout();
        let mut scalars = object.fields.update_mask();
        scalars.intersect_with(&layout.visible_slots(flags));
        let mut dynamic = object.fields.dynamic().changed_fields();
        dynamic.intersect_with(&layout.visible_dynamic(flags));
        if scalars.is_empty() && dynamic.is_empty() {
            return None;
        }

        let mut w = WireWriter::with_capacity(16 + scalars.count_ones() * 4);
        w.put_u8(UpdateType::Values as u8);
        w.put_packed_guid(object.guid());
        write_scalars(&mut w, object, observer, &scalars);
        write_dynamic(&mut w, &object.fields, &dynamic, false);

        Some(UpdateBlock {
            update_type: UpdateType::Values,
            guid: object.guid(),
            data: w.into_bytes(),
        })
    }

    pub fn build_destroy(&self, guid: ObjectGuid, observer: Option<&WorldObject>) -> Option<UpdateBlock> {
        if observer.is_none() {
            debug!(object = %guid, "Skipping destroy block without an observer");
            return None;
        }
        let mut w = WireWriter::with_capacity(10);
        w.put_u8(UpdateType::Destroy as u8);
        w.put_packed_guid(guid);
        Some(UpdateBlock {
            update_type: UpdateType::Destroy,
            guid,
            data: w.into_bytes(),
        })
    }
}

fn write_mask(w: &mut WireWriter, mask: &UpdateMask) {
    let used = mask.used_blocks();
    debug_assert!(used <= u8::MAX as usize, "update mask of {used} blocks cannot be encoded");
    w.put_u8(used as u8);
    for block in &mask.blocks()[..used] {
        w.put_u32(*block);
    }
}

fn write_scalars(w: &mut WireWriter, object: &WorldObject, observer: &WorldObject, mask: &UpdateMask) {
    let layout = object.fields.layout();
    write_mask(w, mask);
    for slot in mask.iter_set() {
        let slot = slot as u16;
        let mut value = object.fields.raw(slot);
        if layout.slot_flags(slot).contains(FieldFlags::DYNAMIC) {
            value = rewrite_for_observer(object, observer, slot, value);
        }
        w.put_u32(value);
    }
}

/// Per-observer view of fields flagged [`FieldFlags::DYNAMIC`].
fn rewrite_for_observer(object: &WorldObject, observer: &WorldObject, slot: u16, value: u32) -> u32 {
    if slot != unit::DYNAMIC_FLAGS.offset() || !object.is_unit() {
        return value;
    }
    let mut value = value;
    if let Some(tapper) = object.as_creature().and_then(|creature| creature.tapper) {
        if tapper == observer.guid() {
            value |= unit::DYNFLAG_TAPPED | unit::DYNFLAG_TAPPED_BY_PLAYER;
        } else {
            value |= unit::DYNFLAG_TAPPED;
            value &= !unit::DYNFLAG_LOOTABLE;
        }
    }
    if object
        .unit()
        .is_some_and(|data| data.empathy_casters.contains(&observer.guid()))
    {
        value |= unit::DYNFLAG_SPECIAL_INFO;
    }
    value
}

fn write_dynamic(w: &mut WireWriter, fields: &FieldStore, mask: &UpdateMask, full: bool) {
    write_mask(w, mask);
    for field in mask.iter_set() {
        let field = DynamicField(field as u16);
        let values = fields.dynamic_values(field);
        let change = if full {
            DynamicChange::ValueAndSizeChanged
        } else {
            fields.dynamic_change(field)
        };

        let elements = if change == DynamicChange::ValueAndSizeChanged {
            let mut all = UpdateMask::new(values.len());
            (0..values.len()).for_each(|index| all.set(index));
            all
        } else {
            fields.dynamic().dirty_elements(field)
        };

        w.put_u8(change as u8);
        w.put_u16(values.len() as u16);
        write_mask(w, &elements);
        for index in elements.iter_set() {
            w.put_u32(values[index]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectRegistry;
    use crate::fields::layout::player;
    use crate::types::{GroupId, InstanceId, MapId, Position, Team, WorldLocation};
    use crate::update::packet::read_block;
    use crate::update::{DecodedBlock, WireReader};

    fn at(x: f32) -> WorldLocation {
        WorldLocation::new(MapId(0), InstanceId(0), Position::new(x, 0.0, 0.0))
    }

    fn decode(block: &UpdateBlock) -> DecodedBlock {
        let mut reader = WireReader::new(block.data.clone());
        let decoded = read_block(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn absent_observer_builds_nothing() {
        let registry = ObjectRegistry::new();
        let builder = UpdateBlockBuilder::new(&registry, 0);
        let creature = WorldObject::creature(1, 1, at(0.0));
        assert!(builder.build_create(&creature, None).is_none());
        assert!(builder.build_values(&creature, None).is_none());
        assert!(builder.build_destroy(creature.guid(), None).is_none());
    }

    #[test]
    fn create_block_round_trips_visible_fields() {
        let registry = ObjectRegistry::new();
        let builder = UpdateBlockBuilder::new(&registry, 0);
        let mut me = WorldObject::player(1, at(0.0), Team::Alliance);
        me.fields.set(player::XP, 1234);
        me.fields.set(player::KNOWN_TITLES, 0x0000_0001_0000_0002);
        me.fields.append_dynamic(player::DYNAMIC_DAILY_QUESTS, 77);
        me.fields.append_dynamic(player::DYNAMIC_DAILY_QUESTS, 78);

        let block = builder.build_create(&me, Some(&me)).unwrap();
        assert_eq!(block.update_type, UpdateType::CreateObject2);
        let DecodedBlock::Create { type_id, header, fields, .. } = decode(&block) else {
            panic!("expected a create block");
        };
        assert_eq!(type_id, TypeId::ActivePlayer);
        assert!(header.this_is_you);

        let visible = me.fields.layout().visible_slots(visible_field_flags(&me, &me, &registry));
        assert_eq!(fields.scalars.len(), visible.count_ones());
        for slot in visible.iter_set().map(|slot| slot as u16) {
            assert_eq!(fields.scalar(slot), Some(me.fields.raw(slot)), "slot {slot}");
        }
        assert_eq!(fields.scalar(player::XP.offset()), Some(1234));
        let quests = &fields.dynamic[&player::DYNAMIC_DAILY_QUESTS.0];
        assert_eq!(quests.change, DynamicChange::ValueAndSizeChanged);
        assert_eq!(quests.values(), vec![77, 78]);
    }

    #[test]
    fn longest_dynamic_field_round_trips() {
        let registry = ObjectRegistry::new();
        let builder = UpdateBlockBuilder::new(&registry, 0);
        let mut me = WorldObject::player(1, at(0.0), Team::Alliance);
        let last = crate::fields::MAX_DYNAMIC_ELEMENTS - 1;
        me.fields.set_dynamic(player::DYNAMIC_DAILY_QUESTS, last, 5);
        me.fields.set_dynamic(player::DYNAMIC_DAILY_QUESTS, 0, 3);
        assert!(!me.fields.set_dynamic(player::DYNAMIC_DAILY_QUESTS, last + 1, 6));

        let DecodedBlock::Create { fields, .. } = decode(&builder.build_create(&me, Some(&me)).unwrap()) else {
            panic!("expected a create block");
        };
        let quests = &fields.dynamic[&player::DYNAMIC_DAILY_QUESTS.0];
        assert_eq!(quests.len as usize, last + 1);
        assert_eq!(quests.values(), me.fields.dynamic_values(player::DYNAMIC_DAILY_QUESTS));
        assert_eq!(quests.elements.get(&(last as u16)), Some(&5));
        assert_eq!(quests.elements.get(&0), Some(&3));
    }

    #[test]
    fn private_party_and_owner_fields_follow_the_relationship() {
        let mut me = WorldObject::player(1, at(0.0), Team::Alliance);
        let mut friend = WorldObject::player(2, at(1.0), Team::Alliance);
        let stranger = WorldObject::player(3, at(2.0), Team::Alliance);
        me.unit_mut().unwrap().group = Some(GroupId(9));
        friend.unit_mut().unwrap().group = Some(GroupId(9));

        let mut pet = WorldObject::creature(5, 1, at(3.0));
        pet.fields.set(unit::SUMMONED_BY, me.guid());

        let mut registry = ObjectRegistry::new();
        for object in [me.clone(), friend.clone(), stranger.clone()] {
            registry.insert(object).unwrap();
        }

        let for_self = visible_field_flags(&me, &me, &registry);
        let for_friend = visible_field_flags(&me, &friend, &registry);
        let for_stranger = visible_field_flags(&me, &stranger, &registry);
        assert!(for_self.contains(FieldFlags::PRIVATE));
        assert!(for_friend.contains(FieldFlags::PARTY_MEMBER) && !for_friend.contains(FieldFlags::PRIVATE));
        assert_eq!(for_stranger, FieldFlags::PUBLIC | FieldFlags::UNIT_ALL);

        let pet_for_owner = visible_field_flags(&pet, &me, &registry);
        let pet_for_friend = visible_field_flags(&pet, &friend, &registry);
        assert!(pet_for_owner.contains(FieldFlags::OWNER));
        assert!(!pet_for_friend.contains(FieldFlags::OWNER));
        assert!(pet_for_friend.contains(FieldFlags::PARTY_MEMBER));

        let builder = UpdateBlockBuilder::new(&registry, 0);
        let DecodedBlock::Create { fields, .. } = decode(&builder.build_create(&me, Some(&stranger)).unwrap()) else {
            panic!("expected a create block");
        };
        assert_eq!(fields.scalar(player::XP.offset()), None);
        assert_eq!(fields.scalar(player::QUEST_LOG_1_ID.offset()), None);
        assert!(fields.scalar(unit::HEALTH.offset()).is_some());
    }

    #[test]
    fn values_block_carries_only_changes() {
        let registry = ObjectRegistry::new();
        let builder = UpdateBlockBuilder::new(&registry, 0);
        let observer = WorldObject::player(2, at(1.0), Team::Alliance);
        let mut creature = WorldObject::creature(1, 1, at(0.0));
        creature.fields.clear_dirty();
        assert!(builder.build_values(&creature, Some(&observer)).is_none());

        creature.fields.set(unit::HEALTH, 42);
        creature.fields.set(unit::PET_EXPERIENCE, 10);
        let DecodedBlock::Values { fields, .. } = decode(&builder.build_values(&creature, Some(&observer)).unwrap())
        else {
            panic!("expected a values block");
        };
        assert_eq!(fields.scalars.len(), 1);
        assert_eq!(fields.scalar(unit::HEALTH.offset()), Some(42));
    }

    #[test]
    fn dynamic_flags_are_rewritten_per_observer() {
        let mut registry = ObjectRegistry::new();
        let tapper = WorldObject::player(1, at(0.0), Team::Alliance);
        let other = WorldObject::player(2, at(0.0), Team::Alliance);
        registry.insert(tapper.clone()).unwrap();
        registry.insert(other.clone()).unwrap();

        let mut creature = WorldObject::creature(1, 1, at(0.0));
        creature.fields.set(unit::DYNAMIC_FLAGS, unit::DYNFLAG_LOOTABLE);
        creature.as_creature_mut().unwrap().tapper = Some(tapper.guid());

        let builder = UpdateBlockBuilder::new(&registry, 0);
        let flags_for = |observer: &WorldObject| {
            let DecodedBlock::Create { fields, .. } = decode(&builder.build_create(&creature, Some(observer)).unwrap())
            else {
                panic!("expected a create block");
            };
            fields.scalar(unit::DYNAMIC_FLAGS.offset()).unwrap()
        };

        assert_eq!(
            flags_for(&tapper),
            unit::DYNFLAG_LOOTABLE | unit::DYNFLAG_TAPPED | unit::DYNFLAG_TAPPED_BY_PLAYER
        );
        assert_eq!(flags_for(&other), unit::DYNFLAG_TAPPED);
        assert_eq!(creature.fields.get(unit::DYNAMIC_FLAGS), unit::DYNFLAG_LOOTABLE);
    }

    #[test]
    fn destroy_block_is_just_the_guid() {
        let registry = ObjectRegistry::new();
        let builder = UpdateBlockBuilder::new(&registry, 0);
        let observer = WorldObject::player(2, at(1.0), Team::Alliance);
        let guid = ObjectGuid::player(7);
        let block = builder.build_destroy(guid, Some(&observer)).unwrap();
        assert_eq!(decode(&block), DecodedBlock::Destroy { guid });
    }
}
