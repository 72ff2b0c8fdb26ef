//! Movement and spawn header of create blocks.
//!
//! The header opens with one presence bit per sub-block, in the order of the
//! fields of [`CreateObjectHeader`], padded to a whole byte. The sub-blocks
//! that are present follow in that same order. Clients decode it strictly in
//! sequence, so the order is part of the protocol.

use super::wire::{WireReader, WireWriter};
use crate::entity::{
    AreaTriggerData, AreaTriggerShape, MovementFlags, MovementInfo, TransportInfo, VehicleInfo,
    WorldObject, SPEED_TYPE_COUNT,
};
use crate::error::DecodeError;
use crate::fields::layout::unit;
use crate::types::{ObjectGuid, Position};

const PACK_YZ: i32 = 1 << 20;
const PACK_X: i32 = PACK_YZ << 1;
const PACK_YZ_MASK: i64 = ((PACK_YZ as i64) << 1) - 1;
const PACK_X_MASK: i64 = ((PACK_X as i64) << 1) - 1;

/// Packs a unit quaternion into 64 bits (x: 22 bits, y and z: 21 bits).
/// The sign of `w` is folded into the other components.
pub fn pack_rotation(rotation: [f32; 4]) -> i64 {
    let [x, y, z, w] = rotation;
    let sign: i64 = if w >= 0.0 { 1 } else { -1 };
    let x = ((x * PACK_X as f32) as i32 as i64 * sign) & PACK_X_MASK;
    let y = ((y * PACK_YZ as f32) as i32 as i64 * sign) & PACK_YZ_MASK;
    let z = ((z * PACK_YZ as f32) as i32 as i64 * sign) & PACK_YZ_MASK;
    z | y << 21 | x << 42
}

pub fn unpack_rotation(packed: i64) -> [f32; 4] {
    let x = (packed >> 42) as f32 / PACK_X as f32;
    let y = ((packed << 22) >> 43) as f32 / PACK_YZ as f32;
    let z = ((packed << 43) >> 43) as f32 / PACK_YZ as f32;
    let length = x * x + y * y + z * z;
    let w = if (length - 1.0).abs() >= 1.0 / PACK_YZ as f32 {
        (1.0 - length).max(0.0).sqrt()
    } else {
        0.0
    };
    [x, y, z, w]
}

/// Position, movement state and transport of a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMovement {
    pub mover: ObjectGuid,
    pub position: Position,
    pub info: MovementInfo,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateObjectHeader {
    pub no_birth_anim: bool,
    /// The observer is the object itself.
    pub this_is_you: bool,
    pub movement: Option<UnitMovement>,
    pub stationary: Option<Position>,
    pub combat_victim: Option<ObjectGuid>,
    pub server_time: Option<u32>,
    pub vehicle: Option<VehicleInfo>,
    pub anim_kits: Option<[u16; 3]>,
    /// Packed with [`pack_rotation`].
    pub rotation: Option<i64>,
    pub area_trigger: Option<AreaTriggerData>,
}

impl CreateObjectHeader {
    /// Header describing `object` to `observer`.
    pub fn for_object(object: &WorldObject, observer: ObjectGuid, server_time: u32) -> Self {
        let mut header = Self {
            no_birth_anim: !object.is_new_spawn(),
            this_is_you: observer == object.guid(),
            anim_kits: object.anim_kits,
            ..Self::default()
        };

        if let Some(data) = object.unit() {
            header.movement = Some(UnitMovement {
                mover: object.guid(),
                position: *object.position(),
                info: data.movement.clone(),
            });
            header.vehicle = data.vehicle;
            let victim = object.fields.get(unit::TARGET);
            header.combat_victim = (!victim.is_empty()).then_some(victim);
        } else {
            header.stationary = Some(*object.position());
        }

        if let Some(go) = object.as_game_object() {
            header.rotation = Some(pack_rotation(go.rotation));
            if go.is_transport() {
                header.server_time = Some(server_time);
            }
        }
        header.area_trigger = object.as_area_trigger().cloned();
        header
    }

    pub fn write(&self, w: &mut WireWriter) {
        w.put_bit(self.no_birth_anim);
        w.put_bit(self.this_is_you);
        w.put_bit(self.movement.is_some());
        w.put_bit(self.stationary.is_some());
        w.put_bit(self.combat_victim.is_some());
        w.put_bit(self.server_time.is_some());
        w.put_bit(self.vehicle.is_some());
        w.put_bit(self.anim_kits.is_some());
        w.put_bit(self.rotation.is_some());
        w.put_bit(self.area_trigger.is_some());
        w.flush_bits();

        if let Some(movement) = &self.movement {
            write_movement(w, movement);
        }
        if let Some(position) = &self.stationary {
            write_position(w, position);
        }
        if let Some(victim) = self.combat_victim {
            w.put_packed_guid(victim);
        }
        if let Some(time) = self.server_time {
            w.put_u32(time);
        }
        if let Some(vehicle) = &self.vehicle {
            w.put_u32(vehicle.id);
            w.put_f32(vehicle.initial_raw_facing);
        }
        if let Some(kits) = &self.anim_kits {
            for kit in kits {
                w.put_u16(*kit);
            }
        }
        if let Some(rotation) = self.rotation {
            w.put_i64(rotation);
        }
        if let Some(trigger) = &self.area_trigger {
            write_area_trigger(w, trigger);
        }
    }

    pub fn read(r: &mut WireReader) -> Result<Self, DecodeError> {
        let no_birth_anim = r.bit()?;
        let this_is_you = r.bit()?;
        let has_movement = r.bit()?;
        let has_stationary = r.bit()?;
        let has_victim = r.bit()?;
        let has_server_time = r.bit()?;
        let has_vehicle = r.bit()?;
        let has_anim_kits = r.bit()?;
        let has_rotation = r.bit()?;
        let has_area_trigger = r.bit()?;

        let mut header = Self {
            no_birth_anim,
            this_is_you,
            ..Self::default()
        };
        if has_movement {
            header.movement = Some(read_movement(r)?);
        }
        if has_stationary {
            header.stationary = Some(read_position(r, "stationary position")?);
        }
        if has_victim {
            header.combat_victim = Some(r.packed_guid("combat victim")?);
        }
        if has_server_time {
            header.server_time = Some(r.u32("server time")?);
        }
        if has_vehicle {
            header.vehicle = Some(VehicleInfo {
                id: r.u32("vehicle id")?,
                initial_raw_facing: r.f32("vehicle facing")?,
            });
        }
        if has_anim_kits {
            header.anim_kits = Some([r.u16("anim kit")?, r.u16("anim kit")?, r.u16("anim kit")?]);
        }
        if has_rotation {
            header.rotation = Some(r.i64("rotation")?);
        }
        if has_area_trigger {
            header.area_trigger = Some(read_area_trigger(r)?);
        }
        Ok(header)
    }
}

fn write_position(w: &mut WireWriter, position: &Position) {
    w.put_f32(position.x);
    w.put_f32(position.y);
    w.put_f32(position.z);
    w.put_f32(position.orientation);
}

fn read_position(r: &mut WireReader, what: &'static str) -> Result<Position, DecodeError> {
    Ok(Position {
        x: r.f32(what)?,
        y: r.f32(what)?,
        z: r.f32(what)?,
        orientation: r.f32(what)?,
    })
}

fn write_movement(w: &mut WireWriter, movement: &UnitMovement) {
    let info = &movement.info;
    w.put_packed_guid(movement.mover);
    w.put_u32(info.flags.bits());
    w.put_u16(info.extra_flags);
    w.put_u32(info.time);
    write_position(w, &movement.position);
    w.put_f32(info.pitch);
    w.put_u32(info.fall_time);
    w.put_bit(info.transport.is_some());
    w.flush_bits();
    if let Some(transport) = &info.transport {
        w.put_packed_guid(transport.guid);
        write_position(w, &transport.offset);
        w.put_i8(transport.seat);
        w.put_u32(transport.time);
    }
    for speed in &info.speeds {
        w.put_f32(*speed);
    }
}

fn read_movement(r: &mut WireReader) -> Result<UnitMovement, DecodeError> {
    let mover = r.packed_guid("mover")?;
    let flags = MovementFlags::from_bits_retain(r.u32("movement flags")?);
    let extra_flags = r.u16("extra movement flags")?;
    let time = r.u32("movement time")?;
    let position = read_position(r, "movement position")?;
    let pitch = r.f32("pitch")?;
    let fall_time = r.u32("fall time")?;
    let transport = if r.bit()? {
        Some(TransportInfo {
            guid: r.packed_guid("transport guid")?,
            offset: read_position(r, "transport offset")?,
            seat: r.i8("transport seat")?,
            time: r.u32("transport time")?,
        })
    } else {
        None
    };
    let mut speeds = [0.0; SPEED_TYPE_COUNT];
    for speed in speeds.iter_mut() {
        *speed = r.f32("speed")?;
    }
    Ok(UnitMovement {
        mover,
        position,
        info: MovementInfo {
            flags,
            extra_flags,
            time,
            pitch,
            fall_time,
            transport,
            speeds,
        },
    })
}

fn write_vertices(w: &mut WireWriter, vertices: &[[f32; 2]]) {
    for [x, y] in vertices {
        w.put_f32(*x);
        w.put_f32(*y);
    }
}

fn read_vertices(r: &mut WireReader, count: u32) -> Result<Vec<[f32; 2]>, DecodeError> {
    (0..count)
        .map(|_| Ok([r.f32("polygon vertex")?, r.f32("polygon vertex")?]))
        .collect()
}

fn write_area_trigger(w: &mut WireWriter, trigger: &AreaTriggerData) {
    w.put_u32(trigger.elapsed_ms);
    w.put_u32(trigger.time_to_target);
    w.put_u8(trigger.shape.tag());
    match &trigger.shape {
        AreaTriggerShape::Sphere { radius, radius_target } => {
            w.put_f32(*radius);
            w.put_f32(*radius_target);
        }
        AreaTriggerShape::Box { extents, extents_target } => {
            for value in extents.iter().chain(extents_target) {
                w.put_f32(*value);
            }
        }
        AreaTriggerShape::Polygon {
            vertices,
            vertices_target,
            height,
            height_target,
        } => {
            w.put_u32(vertices.len() as u32);
            w.put_u32(vertices_target.len() as u32);
            write_vertices(w, vertices);
            write_vertices(w, vertices_target);
            w.put_f32(*height);
            w.put_f32(*height_target);
        }
        AreaTriggerShape::Cylinder {
            radius,
            radius_target,
            height,
            height_target,
            z_offset,
            z_offset_target,
        } => {
            for value in [radius, radius_target, height, height_target, z_offset, z_offset_target] {
                w.put_f32(*value);
            }
        }
    }
}

fn read_area_trigger(r: &mut WireReader) -> Result<AreaTriggerData, DecodeError> {
    let elapsed_ms = r.u32("area trigger elapsed")?;
    let time_to_target = r.u32("area trigger time to target")?;
    let tag = r.u8("area trigger shape")?;
    let shape = match tag {
        0 => AreaTriggerShape::Sphere {
            radius: r.f32("sphere radius")?,
            radius_target: r.f32("sphere radius")?,
        },
        1 => {
            let mut values = [0.0f32; 6];
            for value in values.iter_mut() {
                *value = r.f32("box extents")?;
            }
            AreaTriggerShape::Box {
                extents: [values[0], values[1], values[2]],
                extents_target: [values[3], values[4], values[5]],
            }
        }
        3 => {
            let count = r.u32("polygon vertex count")?;
            let target_count = r.u32("polygon vertex count")?;
            let vertices = read_vertices(r, count)?;
            let vertices_target = read_vertices(r, target_count)?;
            AreaTriggerShape::Polygon {
                vertices,
                vertices_target,
                height: r.f32("polygon height")?,
                height_target: r.f32("polygon height")?,
            }
        }
        4 => AreaTriggerShape::Cylinder {
            radius: r.f32("cylinder")?,
            radius_target: r.f32("cylinder")?,
            height: r.f32("cylinder")?,
            height_target: r.f32("cylinder")?,
            z_offset: r.f32("cylinder")?,
            z_offset_target: r.f32("cylinder")?,
        },
        other => return Err(DecodeError::UnknownShape(other)),
    };
    Ok(AreaTriggerData {
        shape,
        time_to_target,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{GameObjectType, SpeedType};
    use crate::types::{InstanceId, MapId, Team, WorldLocation};

    fn location() -> WorldLocation {
        WorldLocation::new(MapId(0), InstanceId(0), Position::with_orientation(1.0, 2.0, 3.0, 1.5))
    }

    fn reencode(header: &CreateObjectHeader) -> CreateObjectHeader {
        let mut writer = WireWriter::new();
        header.write(&mut writer);
        let mut reader = WireReader::new(writer.into_bytes());
        let decoded = CreateObjectHeader::read(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn player_header_for_itself() {
        let mut player = WorldObject::player(1, location(), Team::Horde);
        let data = player.unit_mut().unwrap();
        data.movement.set_speed(SpeedType::Run, 9.0);
        data.movement.transport = Some(TransportInfo {
            guid: ObjectGuid(0x55),
            offset: Position::new(0.5, 0.0, 1.0),
            seat: -1,
            time: 77,
        });
        data.vehicle = Some(VehicleInfo {
            id: 12,
            initial_raw_facing: 0.25,
        });

        let header = CreateObjectHeader::for_object(&player, player.guid(), 1000);
        assert!(header.this_is_you);
        assert!(header.stationary.is_none());
        assert_eq!(reencode(&header), header);
    }

    #[test]
    fn game_object_header_is_stationary_with_rotation() {
        let mut go = WorldObject::game_object(10, 1, location(), GameObjectType::Transport);
        go.set_new_spawn(false);
        let header = CreateObjectHeader::for_object(&go, ObjectGuid::player(2), 1000);
        assert!(header.no_birth_anim);
        assert!(!header.this_is_you);
        assert!(header.movement.is_none());
        assert_eq!(header.server_time, Some(1000));
        assert_eq!(reencode(&header), header);
    }

    #[test]
    fn area_trigger_shapes_survive_the_wire() {
        let header = CreateObjectHeader {
            area_trigger: Some(AreaTriggerData {
                shape: AreaTriggerShape::Polygon {
                    vertices: vec![[0.0, 0.0], [4.0, 0.0], [2.0, 3.0]],
                    vertices_target: vec![],
                    height: 5.0,
                    height_target: 6.0,
                },
                time_to_target: 3000,
                elapsed_ms: 120,
            }),
            ..CreateObjectHeader::default()
        };
        assert_eq!(reencode(&header), header);
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let mut writer = WireWriter::new();
        writer.put_bits(0b0000_0000_01, 10);
        writer.flush_bits();
        writer.put_u32(0);
        writer.put_u32(0);
        writer.put_u8(2);
        let mut reader = WireReader::new(writer.into_bytes());
        assert_eq!(CreateObjectHeader::read(&mut reader), Err(DecodeError::UnknownShape(2)));
    }

    #[test]
    fn rotation_packing_keeps_the_quaternion() {
        let half = std::f32::consts::FRAC_PI_4;
        let rotation = [0.0, 0.0, half.sin(), half.cos()];
        let unpacked = unpack_rotation(pack_rotation(rotation));
        for (a, b) in rotation.iter().zip(unpacked.iter()) {
            assert!((a - b).abs() < 1e-3, "{rotation:?} vs {unpacked:?}");
        }
    }
}
