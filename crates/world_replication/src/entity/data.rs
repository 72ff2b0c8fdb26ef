//! Category-specific state that is not replicated through update fields.

use super::movement::MovementInfo;
use crate::fields::DynamicRecord;
use crate::types::{GroupId, ObjectGuid, Team, WorldLocation};
use serde::{Deserialize, Serialize};

/// The category an entity belongs to; also its spatial cell bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Creature,
    GameObject,
    DynamicObject,
    Corpse,
    AreaTrigger,
    Conversation,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Player,
        EntityKind::Creature,
        EntityKind::GameObject,
        EntityKind::DynamicObject,
        EntityKind::Corpse,
        EntityKind::AreaTrigger,
        EntityKind::Conversation,
    ];

    pub fn is_unit(self) -> bool {
        matches!(self, EntityKind::Player | EntityKind::Creature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeathState {
    #[default]
    Alive,
    JustDied,
    Corpse,
    Dead,
    JustRespawned,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub id: u32,
    pub initial_raw_facing: f32,
}

/// State shared by players and creatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitData {
    pub death_state: DeathState,
    pub team: Team,
    pub group: Option<GroupId>,
    /// Players currently sharing this unit's vision.
    pub shared_vision: Vec<ObjectGuid>,
    /// Casters of an empathy effect on this unit.
    pub empathy_casters: Vec<ObjectGuid>,
    pub vehicle: Option<VehicleInfo>,
    pub movement: MovementInfo,
}

impl UnitData {
    pub fn new(team: Team) -> Self {
        Self {
            death_state: DeathState::Alive,
            team,
            group: None,
            shared_vision: Vec::new(),
            empathy_casters: Vec::new(),
            vehicle: None,
            movement: MovementInfo::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.death_state, DeathState::Alive | DeathState::JustRespawned)
    }

    pub fn add_shared_vision(&mut self, player: ObjectGuid) {
        if !self.shared_vision.contains(&player) {
            self.shared_vision.push(player);
        }
    }

    pub fn remove_shared_vision(&mut self, player: ObjectGuid) {
        self.shared_vision.retain(|guid| *guid != player);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub unit: UnitData,
    pub game_master: bool,
    pub in_cinematic: bool,
    /// Where the player's corpse lies while the player is a ghost.
    pub corpse_location: Option<WorldLocation>,
    /// Object the player currently looks through (far sight, possessed unit).
    pub viewpoint: Option<ObjectGuid>,
}

impl PlayerData {
    pub fn new(team: Team) -> Self {
        Self {
            unit: UnitData::new(team),
            game_master: false,
            in_cinematic: false,
            corpse_location: None,
            viewpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureData {
    pub unit: UnitData,
    pub sight_distance: f32,
    /// Distance at which the creature aggroes.
    pub attack_distance: f32,
    /// Player that tapped the creature for loot.
    pub tapper: Option<ObjectGuid>,
}

impl CreatureData {
    pub fn new(team: Team, sight_distance: f32) -> Self {
        Self {
            unit: UnitData::new(team),
            sight_distance,
            attack_distance: 20.0,
            tapper: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameObjectType {
    #[default]
    Generic,
    Door,
    Chest,
    Trap,
    Transport,
    MapObjTransport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectData {
    pub go_type: GameObjectType,
    /// Orientation as a quaternion (x, y, z, w).
    pub rotation: [f32; 4],
    pub owner: Option<ObjectGuid>,
}

impl GameObjectData {
    pub fn new(go_type: GameObjectType) -> Self {
        Self {
            go_type,
            rotation: [0.0, 0.0, 0.0, 1.0],
            owner: None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.go_type, GameObjectType::Transport | GameObjectType::MapObjTransport)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorpseKind {
    Bones,
    ResurrectablePve,
    ResurrectablePvp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaTriggerShape {
    Sphere {
        radius: f32,
        radius_target: f32,
    },
    Box {
        extents: [f32; 3],
        extents_target: [f32; 3],
    },
    Polygon {
        vertices: Vec<[f32; 2]>,
        vertices_target: Vec<[f32; 2]>,
        height: f32,
        height_target: f32,
    },
    Cylinder {
        radius: f32,
        radius_target: f32,
        height: f32,
        height_target: f32,
        z_offset: f32,
        z_offset_target: f32,
    },
}

impl AreaTriggerShape {
    /// Tag written on the wire ahead of the shape parameters.
    pub fn tag(&self) -> u8 {
        match self {
            AreaTriggerShape::Sphere { .. } => 0,
            AreaTriggerShape::Box { .. } => 1,
            AreaTriggerShape::Polygon { .. } => 3,
            AreaTriggerShape::Cylinder { .. } => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaTriggerData {
    pub shape: AreaTriggerShape,
    /// Milliseconds the shape takes to morph into its target extents.
    pub time_to_target: u32,
    pub elapsed_ms: u32,
}

/// One actor taking part in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationActor {
    pub actor: ObjectGuid,
    pub creature_id: u32,
    pub display_id: u32,
    pub kind: u32,
}

impl DynamicRecord for ConversationActor {
    const SLOTS: usize = 5;

    fn write(&self, out: &mut [u32]) {
        let [low, high] = self.actor.to_slots();
        out[0] = low;
        out[1] = high;
        out[2] = self.creature_id;
        out[3] = self.display_id;
        out[4] = self.kind;
    }

    fn read(slots: &[u32]) -> Self {
        Self {
            actor: ObjectGuid::from_slots(slots[0], slots[1]),
            creature_id: slots[2],
            display_id: slots[3],
            kind: slots[4],
        }
    }
}

/// One spoken line of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLine {
    pub line_id: u32,
    pub start_time: u32,
    pub ui_camera_id: u32,
    pub actor_index: u8,
    pub flags: u8,
}

impl DynamicRecord for ConversationLine {
    const SLOTS: usize = 4;

    fn write(&self, out: &mut [u32]) {
        out[0] = self.line_id;
        out[1] = self.start_time;
        out[2] = self.ui_camera_id;
        out[3] = self.actor_index as u32 | (self.flags as u32) << 8;
    }

    fn read(slots: &[u32]) -> Self {
        Self {
            line_id: slots[0],
            start_time: slots[1],
            ui_camera_id: slots[2],
            actor_index: slots[3] as u8,
            flags: (slots[3] >> 8) as u8,
        }
    }
}

/// Category-specific state of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    Player(PlayerData),
    Creature(CreatureData),
    GameObject(GameObjectData),
    DynamicObject,
    Corpse(CorpseKind),
    AreaTrigger(AreaTriggerData),
    Conversation,
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Player(_) => EntityKind::Player,
            EntityData::Creature(_) => EntityKind::Creature,
            EntityData::GameObject(_) => EntityKind::GameObject,
            EntityData::DynamicObject => EntityKind::DynamicObject,
            EntityData::Corpse(_) => EntityKind::Corpse,
            EntityData::AreaTrigger(_) => EntityKind::AreaTrigger,
            EntityData::Conversation => EntityKind::Conversation,
        }
    }

    pub fn unit(&self) -> Option<&UnitData> {
        match self {
            EntityData::Player(player) => Some(&player.unit),
            EntityData::Creature(creature) => Some(&creature.unit),
            _ => None,
        }
    }

    pub fn unit_mut(&mut self) -> Option<&mut UnitData> {
        match self {
            EntityData::Player(player) => Some(&mut player.unit),
            EntityData::Creature(creature) => Some(&mut creature.unit),
            _ => None,
        }
    }
}
