use super::concealment::Concealment;
use super::data::*;
use crate::config::SIGHT_RANGE_UNIT;
use crate::fields::layout::{self, area_trigger, corpse, dynamic_object, game_object, object, player, unit};
use crate::fields::{FieldLayout, FieldStore};
use crate::types::{GroupId, HighGuid, MapId, ObjectGuid, PhaseSet, Position, Team, TypeId, WorldLocation};

// Bits of OBJECT_FIELD_TYPE
pub const TYPEMASK_OBJECT: u32 = 0x0001;
pub const TYPEMASK_UNIT: u32 = 0x0008;
pub const TYPEMASK_PLAYER: u32 = 0x0010;
pub const TYPEMASK_GAMEOBJECT: u32 = 0x0020;
pub const TYPEMASK_DYNAMICOBJECT: u32 = 0x0040;
pub const TYPEMASK_CORPSE: u32 = 0x0080;
pub const TYPEMASK_AREATRIGGER: u32 = 0x0100;
pub const TYPEMASK_CONVERSATION: u32 = 0x0400;

const DEFAULT_COMBAT_REACH: f32 = 1.5;
const DEFAULT_BOUNDING_RADIUS: f32 = 0.389;

/// A replicable world entity.
///
/// The location is only changed through the owning map so the spatial index
/// never disagrees with it.
#[derive(Debug, Clone)]
pub struct WorldObject {
    guid: ObjectGuid,
    location: WorldLocation,
    pub phases: PhaseSet,
    pub fields: FieldStore,
    pub concealment: Concealment,
    pub data: EntityData,
    in_world: bool,
    /// Active objects keep their surroundings loaded and see at map range.
    pub active: bool,
    /// Large objects visible from the maximum visibility distance.
    pub far_visible: bool,
    pub visibility_range_override: Option<f32>,
    pub private_owner: Option<ObjectGuid>,
    /// Hidden from everyone regardless of any other rule.
    pub never_visible: bool,
    /// Set while a despawn is pending so nobody new starts tracking it.
    pub invisible_due_to_despawn: bool,
    pub anim_kits: Option<[u16; 3]>,
    new_spawn: bool,
}

impl WorldObject {
    fn with_layout(
        guid: ObjectGuid,
        entry: u32,
        type_mask: u32,
        layout: &'static FieldLayout,
        location: WorldLocation,
        concealment: Concealment,
        data: EntityData,
    ) -> Self {
        let mut fields = FieldStore::new(layout);
        fields.set(object::GUID, guid);
        fields.set(object::TYPE, type_mask);
        fields.set(object::ENTRY, entry);
        fields.set(object::SCALE_X, 1.0);

        Self {
            guid,
            location,
            phases: PhaseSet::default_phase(),
            fields,
            concealment,
            data,
            in_world: false,
            active: false,
            far_visible: false,
            visibility_range_override: None,
            private_owner: None,
            never_visible: false,
            invisible_due_to_despawn: false,
            anim_kits: None,
            new_spawn: true,
        }
    }

    fn init_unit_fields(&mut self) {
        self.fields.set(unit::LEVEL, 1);
        self.fields.set(unit::HEALTH, 100);
        self.fields.set(unit::MAX_HEALTH, 100);
        self.fields.set(unit::COMBAT_REACH, DEFAULT_COMBAT_REACH);
        self.fields.set(unit::BOUNDING_RADIUS, DEFAULT_BOUNDING_RADIUS);
    }

    pub fn player(counter: u64, location: WorldLocation, team: Team) -> Self {
        let mut object = Self::with_layout(
            ObjectGuid::player(counter),
            0,
            TYPEMASK_OBJECT | TYPEMASK_UNIT | TYPEMASK_PLAYER,
            &layout::PLAYER_LAYOUT,
            location,
            Concealment::living_player(),
            EntityData::Player(PlayerData::new(team)),
        );
        object.init_unit_fields();
        object
    }

    pub fn creature(entry: u32, counter: u64, location: WorldLocation) -> Self {
        let mut object = Self::with_layout(
            ObjectGuid::create(HighGuid::Creature, entry, counter),
            entry,
            TYPEMASK_OBJECT | TYPEMASK_UNIT,
            &layout::UNIT_LAYOUT,
            location,
            Concealment::default(),
            EntityData::Creature(CreatureData::new(Team::Neutral, SIGHT_RANGE_UNIT)),
        );
        object.init_unit_fields();
        object
    }

    pub fn game_object(entry: u32, counter: u64, location: WorldLocation, go_type: GameObjectType) -> Self {
        Self::with_layout(
            ObjectGuid::create(HighGuid::GameObject, entry, counter),
            entry,
            TYPEMASK_OBJECT | TYPEMASK_GAMEOBJECT,
            &layout::GAME_OBJECT_LAYOUT,
            location,
            Concealment::default(),
            EntityData::GameObject(GameObjectData::new(go_type)),
        )
    }

    pub fn dynamic_object(counter: u64, caster: ObjectGuid, spell_id: u32, radius: f32, location: WorldLocation) -> Self {
        let mut object = Self::with_layout(
            ObjectGuid::create(HighGuid::DynamicObject, 0, counter),
            spell_id,
            TYPEMASK_OBJECT | TYPEMASK_DYNAMICOBJECT,
            &layout::DYNAMIC_OBJECT_LAYOUT,
            location,
            Concealment::default(),
            EntityData::DynamicObject,
        );
        object.fields.set(dynamic_object::CASTER, caster);
        object.fields.set(dynamic_object::SPELL_ID, spell_id);
        object.fields.set(dynamic_object::RADIUS, radius);
        object
    }

    pub fn corpse(counter: u64, owner: ObjectGuid, kind: CorpseKind, location: WorldLocation) -> Self {
        let mut object = Self::with_layout(
            ObjectGuid::create(HighGuid::Corpse, 0, counter),
            0,
            TYPEMASK_OBJECT | TYPEMASK_CORPSE,
            &layout::CORPSE_LAYOUT,
            location,
            Concealment::default(),
            EntityData::Corpse(kind),
        );
        object.fields.set(corpse::OWNER, owner);
        object
    }

    pub fn area_trigger(
        entry: u32,
        counter: u64,
        caster: ObjectGuid,
        spell_id: u32,
        data: AreaTriggerData,
        location: WorldLocation,
    ) -> Self {
        let mut object = Self::with_layout(
            ObjectGuid::create(HighGuid::AreaTrigger, entry, counter),
            entry,
            TYPEMASK_OBJECT | TYPEMASK_AREATRIGGER,
            &layout::AREA_TRIGGER_LAYOUT,
            location,
            Concealment::default(),
            EntityData::AreaTrigger(data),
        );
        object.fields.set(area_trigger::CASTER, caster);
        object.fields.set(area_trigger::SPELL_ID, spell_id);
        object.fields.set(area_trigger::EXPLICIT_SCALE, 1.0);
        object
    }

    pub fn conversation(entry: u32, counter: u64, location: WorldLocation) -> Self {
        Self::with_layout(
            ObjectGuid::create(HighGuid::Conversation, entry, counter),
            entry,
            TYPEMASK_OBJECT | TYPEMASK_CONVERSATION,
            &layout::CONVERSATION_LAYOUT,
            location,
            Concealment::default(),
            EntityData::Conversation,
        )
    }

    pub fn guid(&self) -> ObjectGuid {
        self.guid
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    /// Category tag written in create blocks.
    pub fn type_id(&self) -> TypeId {
        match self.kind() {
            EntityKind::Player => TypeId::Player,
            EntityKind::Creature => TypeId::Unit,
            EntityKind::GameObject => TypeId::GameObject,
            EntityKind::DynamicObject => TypeId::DynamicObject,
            EntityKind::Corpse => TypeId::Corpse,
            EntityKind::AreaTrigger => TypeId::AreaTrigger,
            EntityKind::Conversation => TypeId::Conversation,
        }
    }

    pub fn location(&self) -> &WorldLocation {
        &self.location
    }

    pub fn position(&self) -> &Position {
        &self.location.position
    }

    pub fn map_id(&self) -> MapId {
        self.location.map_id
    }

    pub(crate) fn set_location(&mut self, location: WorldLocation) {
        self.location = location;
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.location.position = position;
    }

    pub fn is_in_world(&self) -> bool {
        self.in_world
    }

    pub(crate) fn set_in_world(&mut self, in_world: bool) {
        self.in_world = in_world;
    }

    /// Whether the object was spawned during the current tick.
    pub fn is_new_spawn(&self) -> bool {
        self.new_spawn
    }

    pub(crate) fn set_new_spawn(&mut self, new_spawn: bool) {
        self.new_spawn = new_spawn;
    }

    pub fn is_unit(&self) -> bool {
        self.kind().is_unit()
    }

    pub fn is_player(&self) -> bool {
        self.kind() == EntityKind::Player
    }

    pub fn is_creature(&self) -> bool {
        self.kind() == EntityKind::Creature
    }

    pub fn unit(&self) -> Option<&UnitData> {
        self.data.unit()
    }

    pub fn unit_mut(&mut self) -> Option<&mut UnitData> {
        self.data.unit_mut()
    }

    pub fn as_player(&self) -> Option<&PlayerData> {
        match &self.data {
            EntityData::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.data {
            EntityData::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_creature(&self) -> Option<&CreatureData> {
        match &self.data {
            EntityData::Creature(creature) => Some(creature),
            _ => None,
        }
    }

    pub fn as_creature_mut(&mut self) -> Option<&mut CreatureData> {
        match &mut self.data {
            EntityData::Creature(creature) => Some(creature),
            _ => None,
        }
    }

    pub fn as_game_object(&self) -> Option<&GameObjectData> {
        match &self.data {
            EntityData::GameObject(go) => Some(go),
            _ => None,
        }
    }

    pub fn as_area_trigger(&self) -> Option<&AreaTriggerData> {
        match &self.data {
            EntityData::AreaTrigger(trigger) => Some(trigger),
            _ => None,
        }
    }

    pub fn entry(&self) -> u32 {
        self.fields.get(object::ENTRY)
    }

    pub fn level(&self) -> u32 {
        match self.kind() {
            EntityKind::Player | EntityKind::Creature => self.fields.get(unit::LEVEL),
            EntityKind::GameObject => self.fields.get(game_object::LEVEL),
            _ => 0,
        }
    }

    pub fn combat_reach(&self) -> f32 {
        if self.is_unit() {
            self.fields.get(unit::COMBAT_REACH)
        } else {
            0.0
        }
    }

    pub fn is_alive(&self) -> bool {
        self.unit().map_or(true, UnitData::is_alive)
    }

    pub fn team(&self) -> Team {
        self.unit().map_or(Team::Neutral, |unit| unit.team)
    }

    pub fn group(&self) -> Option<GroupId> {
        self.unit().and_then(|unit| unit.group)
    }

    pub fn is_game_master(&self) -> bool {
        self.as_player().is_some_and(|player| player.game_master)
    }

    /// Unit charming this one, or else its owner (summoner).
    pub fn charmer_or_owner(&self) -> Option<ObjectGuid> {
        if !self.is_unit() {
            return None;
        }
        [unit::CHARMED_BY, unit::SUMMONED_BY]
            .into_iter()
            .map(|field| self.fields.get(field))
            .find(|guid| !guid.is_empty())
    }

    /// Unit this one has charmed, if any.
    pub fn charm(&self) -> Option<ObjectGuid> {
        if !self.is_unit() {
            return None;
        }
        let guid = self.fields.get(unit::CHARM);
        (!guid.is_empty()).then_some(guid)
    }

    pub fn is_possessed(&self) -> bool {
        self.is_unit() && self.fields.has_flag(unit::FLAGS, unit::FLAG_POSSESSED)
    }

    /// Owner, caster or creator of the object, whatever applies to its kind.
    pub fn owner_guid(&self) -> Option<ObjectGuid> {
        let guid = match &self.data {
            EntityData::Player(_) | EntityData::Creature(_) => return self.charmer_or_owner(),
            EntityData::GameObject(go) => go.owner.unwrap_or_else(|| self.fields.get(game_object::CREATED_BY)),
            EntityData::DynamicObject => self.fields.get(dynamic_object::CASTER),
            EntityData::Corpse(_) => self.fields.get(corpse::OWNER),
            EntityData::AreaTrigger(_) => self.fields.get(area_trigger::CASTER),
            EntityData::Conversation => ObjectGuid::EMPTY,
        };
        (!guid.is_empty()).then_some(guid)
    }

    pub fn is_private(&self) -> bool {
        self.private_owner.is_some()
    }

    pub fn is_visibility_overridden(&self) -> bool {
        self.visibility_range_override.is_some()
    }

    pub fn exact_distance(&self, other: &WorldObject) -> f32 {
        self.position().exact_distance(other.position())
    }

    pub fn is_within_dist(&self, other: &WorldObject, range: f32) -> bool {
        self.position().is_within_dist(other.position(), range)
    }

    pub fn has_in_arc(&self, arc: f32, other: &WorldObject) -> bool {
        self.position().has_in_arc(arc, other.position())
    }

    pub fn set_game_master(&mut self, on: bool, level: i32) {
        if let Some(player) = self.as_player_mut() {
            player.game_master = on;
        } else {
            return;
        }
        let level = if on { level } else { 0 };
        self.concealment.set_gm_visibility(level);
        self.concealment.set_gm_detect(level);
        self.fields.apply_flag(player::FLAGS, player::FLAG_GM, on);
    }

    /// Moves a player between the living and the ghost world.
    pub fn set_ghost(&mut self, ghost: bool) {
        if !self.is_player() {
            return;
        }
        self.concealment.set_ghost(ghost);
        self.fields.apply_flag(player::FLAGS, player::FLAG_GHOST, ghost);
        if let Some(unit) = self.unit_mut() {
            unit.death_state = if ghost { DeathState::Dead } else { DeathState::Alive };
        }
    }

    pub fn set_death_state(&mut self, state: DeathState) {
        if let Some(unit) = self.unit_mut() {
            unit.death_state = state;
        }
        let dead = !matches!(state, DeathState::Alive | DeathState::JustRespawned);
        if self.is_unit() {
            self.fields.apply_flag(unit::DYNAMIC_FLAGS, unit::DYNFLAG_DEAD, dead);
        }
    }
}
