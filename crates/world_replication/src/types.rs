//! # Core Type Definitions
//!
//! Fundamental identifiers and spatial types shared by every part of the
//! replication core.
//!
//! ## Key Types
//!
//! - [`ObjectGuid`] - type-tagged 64-bit identifier of a world entity
//! - [`TypeId`] - the category tag written on the wire for each entity
//! - [`Position`] / [`WorldLocation`] - coordinates with orientation, optionally bound to a map
//! - [`PhaseSet`] - the phase membership that partitions mutual visibility on a map
//!
//! ## Design Principles
//!
//! - **Type Safety**: wrapper types prevent confusing map ids, instance ids and GUIDs
//! - **Wire Fidelity**: positions are single precision because that is what the
//!   client decodes
//! - **Serialization**: all plain data types derive serde for config and tooling

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::f32::consts::PI;

// ============================================================================
// Identifiers
// ============================================================================

/// High part of an [`ObjectGuid`]; identifies what kind of entity the GUID names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HighGuid {
    Player,
    Creature,
    Pet,
    Vehicle,
    GameObject,
    DynamicObject,
    Corpse,
    AreaTrigger,
    Conversation,
}

impl HighGuid {
    /// The 16-bit tag stored in the top bits of the raw GUID.
    pub const fn tag(self) -> u16 {
        match self {
            HighGuid::Player => 0x0000,
            HighGuid::Creature => 0xF130,
            HighGuid::Pet => 0xF140,
            HighGuid::Vehicle => 0xF150,
            HighGuid::GameObject => 0xF110,
            HighGuid::DynamicObject => 0xF100,
            HighGuid::Corpse => 0xF101,
            HighGuid::AreaTrigger => 0xF102,
            HighGuid::Conversation => 0xF103,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
            0x0000 => HighGuid::Player,
            0xF130 => HighGuid::Creature,
            0xF140 => HighGuid::Pet,
            0xF150 => HighGuid::Vehicle,
            0xF110 => HighGuid::GameObject,
            0xF100 => HighGuid::DynamicObject,
            0xF101 => HighGuid::Corpse,
            0xF102 => HighGuid::AreaTrigger,
            0xF103 => HighGuid::Conversation,
            _ => return None,
        })
    }

    /// Whether GUIDs of this kind carry a template entry id.
    pub const fn has_entry(self) -> bool {
        matches!(
            self,
            HighGuid::Creature
                | HighGuid::Pet
                | HighGuid::Vehicle
                | HighGuid::GameObject
                | HighGuid::AreaTrigger
                | HighGuid::Conversation
        )
    }

    fn name(self) -> &'static str {
        match self {
            HighGuid::Player => "Player",
            HighGuid::Creature => "Creature",
            HighGuid::Pet => "Pet",
            HighGuid::Vehicle => "Vehicle",
            HighGuid::GameObject => "GameObject",
            HighGuid::DynamicObject => "DynamicObject",
            HighGuid::Corpse => "Corpse",
            HighGuid::AreaTrigger => "AreaTrigger",
            HighGuid::Conversation => "Conversation",
        }
    }
}

/// Globally unique, type-tagged identifier of a world entity.
///
/// Layout of the raw value: bits 48..64 hold the [`HighGuid`] tag, bits 24..48
/// the template entry (for kinds that have one) and the low bits the counter.
/// Players have no entry and use the low 48 bits as counter.
///
/// ```rust
/// use world_replication::{HighGuid, ObjectGuid};
///
/// let guid = ObjectGuid::create(HighGuid::Creature, 1234, 7);
/// assert_eq!(guid.high(), Some(HighGuid::Creature));
/// assert_eq!(guid.entry(), 1234);
/// assert_eq!(guid.counter(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ObjectGuid(pub u64);

impl ObjectGuid {
    pub const EMPTY: ObjectGuid = ObjectGuid(0);

    /// Builds a GUID from its parts. The entry is ignored for kinds without one.
    pub fn create(high: HighGuid, entry: u32, counter: u64) -> Self {
        let tag = (high.tag() as u64) << 48;
        if high.has_entry() {
            Self(tag | ((entry as u64 & 0x00FF_FFFF) << 24) | (counter & 0x00FF_FFFF))
        } else {
            Self(tag | (counter & 0x0000_FFFF_FFFF_FFFF))
        }
    }

    pub fn player(counter: u64) -> Self {
        Self::create(HighGuid::Player, 0, counter)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn high(self) -> Option<HighGuid> {
        HighGuid::from_tag((self.0 >> 48) as u16)
    }

    pub fn entry(self) -> u32 {
        match self.high() {
            Some(high) if high.has_entry() => ((self.0 >> 24) & 0x00FF_FFFF) as u32,
            _ => 0,
        }
    }

    pub fn counter(self) -> u64 {
        match self.high() {
            Some(high) if high.has_entry() => self.0 & 0x00FF_FFFF,
            _ => self.0 & 0x0000_FFFF_FFFF_FFFF,
        }
    }

    pub fn is_player(self) -> bool {
        !self.is_empty() && self.high() == Some(HighGuid::Player)
    }

    /// Low and high 32-bit halves, in the order they occupy two field slots.
    pub fn to_slots(self) -> [u32; 2] {
        [self.0 as u32, (self.0 >> 32) as u32]
    }

    pub fn from_slots(low: u32, high: u32) -> Self {
        Self((high as u64) << 32 | low as u64)
    }
}

impl std::fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "Empty");
        }
        match self.high() {
            Some(high) if high.has_entry() => {
                write!(f, "{} #{} (entry {})", high.name(), self.counter(), self.entry())
            }
            Some(high) => write!(f, "{} #{}", high.name(), self.counter()),
            None => write!(f, "Unknown {:#018x}", self.0),
        }
    }
}

/// Category tag written on the wire in front of a create block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeId {
    Object = 0,
    Item = 1,
    Container = 2,
    Unit = 3,
    Player = 4,
    /// Sent instead of `Player` when the observer is the entity itself.
    ActivePlayer = 5,
    GameObject = 6,
    DynamicObject = 7,
    Corpse = 8,
    AreaTrigger = 9,
    SceneObject = 10,
    Conversation = 11,
}

impl TypeId {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => TypeId::Object,
            1 => TypeId::Item,
            2 => TypeId::Container,
            3 => TypeId::Unit,
            4 => TypeId::Player,
            5 => TypeId::ActivePlayer,
            6 => TypeId::GameObject,
            7 => TypeId::DynamicObject,
            8 => TypeId::Corpse,
            9 => TypeId::AreaTrigger,
            10 => TypeId::SceneObject,
            11 => TypeId::Conversation,
            _ => return None,
        })
    }
}

/// Map identifier (continent, dungeon, battleground...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u32);

/// Instance identifier; distinguishes copies of the same map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

/// Identifier of a party or raid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Kind of map; selects the default sight range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    #[default]
    Continent,
    Instance,
    Battleground,
}

/// Faction side used for team-restricted message delivery and ghost visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Alliance,
    Horde,
    Neutral,
}

// ============================================================================
// Spatial Types
// ============================================================================

/// A point in a map with facing.
///
/// Single precision matches the client wire format. All range tests use
/// squared distances; the `exact_*` helpers exist for the few places that need
/// a real length (stealth detection radius, logging).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Facing in radians, `[0, 2π)`.
    pub orientation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, orientation: 0.0 }
    }

    pub fn with_orientation(x: f32, y: f32, z: f32, orientation: f32) -> Self {
        Self { x, y, z, orientation: normalize_orientation(orientation) }
    }

    pub fn distance_sq(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance_2d_sq(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn exact_distance(&self, other: &Position) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Strict range test: `true` when the distance is below `range`.
    pub fn is_within_dist(&self, other: &Position, range: f32) -> bool {
        self.distance_sq(other) < range * range
    }

    /// Absolute angle from this point towards `other`, in `[0, 2π)`.
    pub fn angle_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        normalize_orientation(dy.atan2(dx))
    }

    /// Whether `other` lies in the arc of width `arc` centred on this facing.
    ///
    /// An arc of `π` is the forward half plane (±90° of facing).
    pub fn has_in_arc(&self, arc: f32, other: &Position) -> bool {
        if self.x == other.x && self.y == other.y {
            return true;
        }
        let arc = normalize_orientation(arc);
        let mut angle = self.angle_to(other) - self.orientation;
        // Bring into (-π, π].
        angle = normalize_orientation(angle);
        if angle > PI {
            angle -= 2.0 * PI;
        }
        let half = if arc == 0.0 { PI } else { arc / 2.0 };
        angle >= -half && angle <= half
    }
}

/// Wraps an angle into `[0, 2π)`.
pub fn normalize_orientation(o: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut o = o % two_pi;
    if o < 0.0 {
        o += two_pi;
    }
    o
}

/// A position bound to a specific map instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldLocation {
    pub map_id: MapId,
    pub instance_id: InstanceId,
    pub position: Position,
}

impl WorldLocation {
    pub fn new(map_id: MapId, instance_id: InstanceId, position: Position) -> Self {
        Self { map_id, instance_id, position }
    }

    pub fn same_map(&self, other: &WorldLocation) -> bool {
        self.map_id == other.map_id && self.instance_id == other.instance_id
    }
}

/// Phase membership of an entity.
///
/// Two entities on the same map can only see each other when their phase sets
/// share at least one phase. Kept sorted so intersection is a linear merge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseSet(SmallVec<[u32; 4]>);

impl PhaseSet {
    /// The phase every entity starts in.
    pub const DEFAULT_PHASE: u32 = 1;

    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    pub fn default_phase() -> Self {
        Self::from_phases([Self::DEFAULT_PHASE])
    }

    pub fn from_phases(phases: impl IntoIterator<Item = u32>) -> Self {
        let mut set = Self::new();
        for phase in phases {
            set.insert(phase);
        }
        set
    }

    pub fn insert(&mut self, phase: u32) -> bool {
        match self.0.binary_search(&phase) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, phase);
                true
            }
        }
    }

    pub fn remove(&mut self, phase: u32) -> bool {
        match self.0.binary_search(&phase) {
            Ok(index) => {
                self.0.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, phase: u32) -> bool {
        self.0.binary_search(&phase).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// True when both sets share at least one phase.
    pub fn intersects(&self, other: &PhaseSet) -> bool {
        let (mut a, mut b) = (self.0.iter().peekable(), other.0.iter().peekable());
        while let (Some(&x), Some(&y)) = (a.peek(), b.peek()) {
            match x.cmp(y) {
                std::cmp::Ordering::Less => {
                    a.next();
                }
                std::cmp::Ordering::Greater => {
                    b.next();
                }
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

/// Milliseconds of game time as seen by a map's update loop.
pub type GameTime = u64;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MovementFlags;

    #[test]
    fn phases_and_movement_flags_serialize() {
        let mut phases = PhaseSet::new();
        phases.insert(7);
        phases.insert(PhaseSet::DEFAULT_PHASE);
        let json = serde_json::to_string(&phases).unwrap();
        assert_eq!(json, "[1,7]");
        assert_eq!(serde_json::from_str::<PhaseSet>(&json).unwrap(), phases);

        let flags = MovementFlags::FORWARD | MovementFlags::WALKING;
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(serde_json::from_str::<MovementFlags>(&json).unwrap(), flags);
    }

    #[test]
    fn guid_round_trips_through_slots() {
        let guid = ObjectGuid::create(HighGuid::GameObject, 180_000, 42);
        let [low, high] = guid.to_slots();
        assert_eq!(ObjectGuid::from_slots(low, high), guid);
        assert_eq!(guid.entry(), 180_000);
        assert_eq!(guid.counter(), 42);
    }

    #[test]
    fn player_guid_has_no_entry() {
        let guid = ObjectGuid::player(99);
        assert!(guid.is_player());
        assert_eq!(guid.entry(), 0);
        assert_eq!(guid.counter(), 99);
        assert_eq!(guid.to_string(), "Player #99");
    }

    #[test]
    fn phase_sets_intersect_on_shared_phase() {
        let a = PhaseSet::from_phases([1, 5, 9]);
        let b = PhaseSet::from_phases([2, 9]);
        let c = PhaseSet::from_phases([3]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!PhaseSet::new().intersects(&a));
    }

    #[test]
    fn forward_arc_covers_half_plane() {
        let observer = Position::with_orientation(0.0, 0.0, 0.0, 0.0);
        assert!(observer.has_in_arc(PI, &Position::new(10.0, 5.0, 0.0)));
        assert!(observer.has_in_arc(PI, &Position::new(1.0, 10.0, 0.0)));
        assert!(!observer.has_in_arc(PI, &Position::new(-10.0, 1.0, 0.0)));
    }
}
