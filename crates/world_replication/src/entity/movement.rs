//! Movement state carried in the create header of units.

use crate::types::{ObjectGuid, Position};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Movement flags sent with the unit movement sub-block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MovementFlags: u32 {
        const FORWARD = 0x0000_0001;
        const BACKWARD = 0x0000_0002;
        const STRAFE_LEFT = 0x0000_0004;
        const STRAFE_RIGHT = 0x0000_0008;
        const LEFT = 0x0000_0010;
        const RIGHT = 0x0000_0020;
        const PITCH_UP = 0x0000_0040;
        const PITCH_DOWN = 0x0000_0080;
        const WALKING = 0x0000_0100;
        const DISABLE_GRAVITY = 0x0000_0200;
        const ROOT = 0x0000_0400;
        const FALLING = 0x0000_0800;
        const SWIMMING = 0x0010_0000;
        const FLYING = 0x0200_0000;
        const HOVER = 0x4000_0000;
    }
}

/// Index into [`MovementInfo::speeds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SpeedType {
    Walk = 0,
    Run = 1,
    RunBack = 2,
    Swim = 3,
    SwimBack = 4,
    Flight = 5,
    FlightBack = 6,
    TurnRate = 7,
    PitchRate = 8,
}

pub const SPEED_TYPE_COUNT: usize = 9;

pub const BASE_SPEEDS: [f32; SPEED_TYPE_COUNT] = [2.5, 7.0, 4.5, 4.722_222, 2.5, 7.0, 4.5, std::f32::consts::PI, std::f32::consts::PI];

/// Attachment of an entity to a moving transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportInfo {
    pub guid: ObjectGuid,
    /// Offset from the transport origin.
    pub offset: Position,
    pub seat: i8,
    pub time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementInfo {
    pub flags: MovementFlags,
    pub extra_flags: u16,
    /// Client time of the last movement packet.
    pub time: u32,
    pub pitch: f32,
    pub fall_time: u32,
    pub transport: Option<TransportInfo>,
    pub speeds: [f32; SPEED_TYPE_COUNT],
}

impl Default for MovementInfo {
    fn default() -> Self {
        Self {
            flags: MovementFlags::empty(),
            extra_flags: 0,
            time: 0,
            pitch: 0.0,
            fall_time: 0,
            transport: None,
            speeds: BASE_SPEEDS,
        }
    }
}

impl MovementInfo {
    pub fn speed(&self, kind: SpeedType) -> f32 {
        self.speeds[kind as usize]
    }

    pub fn set_speed(&mut self, kind: SpeedType, value: f32) {
        self.speeds[kind as usize] = value;
    }
}
