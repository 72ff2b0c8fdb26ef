//! # World Entities
//!
//! Every replicable thing on a map is a [`WorldObject`]: the state all
//! categories share (identity, location, phases, update fields, concealment)
//! plus an [`EntityData`] variant with what only that category carries.
//! Category dispatch is a `match` on [`EntityKind`], never a downcast.
//!
//! Entities refer to each other by [`ObjectGuid`] only. Whoever needs the
//! object behind a GUID asks an [`ObjectAccessor`], which is usually the map's
//! [`ObjectRegistry`].

pub mod concealment;
mod data;
mod movement;
mod object;

pub use concealment::{Concealment, FlaggedValues};
pub use data::{
    AreaTriggerData, AreaTriggerShape, ConversationActor, ConversationLine, CorpseKind, CreatureData, DeathState,
    EntityData, EntityKind, GameObjectData, GameObjectType, PlayerData, UnitData, VehicleInfo,
};
pub use movement::{MovementFlags, MovementInfo, SpeedType, TransportInfo, BASE_SPEEDS, SPEED_TYPE_COUNT};
pub use object::*;

use crate::types::{GroupId, ObjectGuid};
use std::collections::HashMap;

/// Lookup of entities by GUID.
pub trait ObjectAccessor {
    fn object(&self, guid: ObjectGuid) -> Option<&WorldObject>;

    /// Group of the unit behind `guid`, if any.
    fn group_of(&self, guid: ObjectGuid) -> Option<GroupId> {
        self.object(guid).and_then(WorldObject::group)
    }

    /// True when both GUIDs name units of the same group.
    fn in_same_group(&self, a: ObjectGuid, b: ObjectGuid) -> bool {
        match (self.group_of(a), self.group_of(b)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }
}

/// Owning store of the entities of one map.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: HashMap<ObjectGuid, WorldObject>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object, handing it back if the GUID is already taken.
    pub fn insert(&mut self, object: WorldObject) -> Result<(), WorldObject> {
        if self.objects.contains_key(&object.guid()) {
            return Err(object);
        }
        self.objects.insert(object.guid(), object);
        Ok(())
    }

    pub fn remove(&mut self, guid: ObjectGuid) -> Option<WorldObject> {
        self.objects.remove(&guid)
    }

    pub fn get(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.objects.get(&guid)
    }

    pub fn get_mut(&mut self, guid: ObjectGuid) -> Option<&mut WorldObject> {
        self.objects.get_mut(&guid)
    }

    pub fn contains(&self, guid: ObjectGuid) -> bool {
        self.objects.contains_key(&guid)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.values()
    }

    pub fn guids(&self) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.objects.keys().copied()
    }

    /// Players currently in the registry.
    pub fn players(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.values().filter(|object| object.is_player())
    }
}

impl ObjectAccessor for ObjectRegistry {
    fn object(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.get(guid)
    }
}

impl ObjectAccessor for HashMap<ObjectGuid, WorldObject> {
    fn object(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.get(&guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstanceId, MapId, Position, Team, WorldLocation};

    fn location() -> WorldLocation {
        WorldLocation::new(MapId(1), InstanceId(0), Position::new(0.0, 0.0, 0.0))
    }

    #[test]
    fn duplicate_guid_is_handed_back() {
        let mut registry = ObjectRegistry::new();
        registry.insert(WorldObject::player(1, location(), Team::Horde)).unwrap();
        let duplicate = registry.insert(WorldObject::player(1, location(), Team::Horde));
        assert!(duplicate.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn group_membership_is_resolved_through_the_accessor() {
        let mut registry = ObjectRegistry::new();
        let mut a = WorldObject::player(1, location(), Team::Horde);
        let mut b = WorldObject::player(2, location(), Team::Horde);
        let c = WorldObject::player(3, location(), Team::Horde);
        a.unit_mut().unwrap().group = Some(GroupId(4));
        b.unit_mut().unwrap().group = Some(GroupId(4));
        for object in [a, b, c] {
            registry.insert(object).unwrap();
        }

        assert!(registry.in_same_group(ObjectGuid::player(1), ObjectGuid::player(2)));
        assert!(!registry.in_same_group(ObjectGuid::player(1), ObjectGuid::player(3)));
        assert!(!registry.in_same_group(ObjectGuid::player(3), ObjectGuid::player(3)));
    }
}
