//! Entity location updates.
//!
//! Absolute teleports, relative moves and orientation-only packets all normalise into one
//! sparse [`EntityLocationUpdate`], so the entity side applies a single merge regardless of
//! which packet it came from.
//!
//! Positions are fixed point in 1/32 block units. Absolute Y carries a +51 bias on the
//! wire, and the locally controlled entity gets a further +22 on decode. Angles are packed
//! into one byte, 256 steps per turn.

use crate::core::wire::{WireReader, WireWriter};
use crate::error::Result;
use bitflags::bitflags;

/// Entity id of the locally controlled player.
pub const SELF_ID: u8 = 255;

/// Fixed-point units per block.
pub const POSITION_SCALE: f32 = 32.0;

/// Bias added to absolute Y on the wire.
pub const Y_WIRE_BIAS: i32 = 51;

/// Extra decode adjustment for the local player's absolute Y.
pub const SELF_Y_ADJUST: i32 = 22;

bitflags! {
    /// Which fields of an [`EntityLocationUpdate`] are present.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LocationFlags: u8 {
        const POSITION = 0x01;
        const YAW = 0x02;
        const PITCH = 0x04;
        const ROLL = 0x08;
        const HEAD_YAW = 0x10;
    }
}

/// A sparse position/orientation change for one entity. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntityLocationUpdate {
    pub flags: LocationFlags,
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub head_yaw: f32,
    /// `position` is a delta rather than an absolute location.
    pub relative: bool,
}

impl EntityLocationUpdate {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Absolute position plus head orientation.
    pub fn absolute(position: [f32; 3], head_yaw: f32, pitch: f32) -> Self {
        Self {
            flags: LocationFlags::POSITION | LocationFlags::HEAD_YAW | LocationFlags::PITCH,
            position,
            head_yaw,
            pitch,
            ..Self::default()
        }
    }

    /// Position delta only.
    pub fn moved_by(delta: [f32; 3]) -> Self {
        Self {
            flags: LocationFlags::POSITION,
            position: delta,
            relative: true,
            ..Self::default()
        }
    }

    /// Position delta plus head orientation.
    pub fn moved_and_turned(delta: [f32; 3], head_yaw: f32, pitch: f32) -> Self {
        Self {
            flags: LocationFlags::POSITION | LocationFlags::HEAD_YAW | LocationFlags::PITCH,
            position: delta,
            head_yaw,
            pitch,
            relative: true,
            ..Self::default()
        }
    }

    /// Head orientation only.
    pub fn turned(head_yaw: f32, pitch: f32) -> Self {
        Self {
            flags: LocationFlags::HEAD_YAW | LocationFlags::PITCH,
            head_yaw,
            pitch,
            ..Self::default()
        }
    }

    /// A single rotation selected by `flag`.
    pub fn rotation(flag: LocationFlags, degrees: f32) -> Self {
        let mut update = Self::empty();
        update.flags = flag;
        if flag.contains(LocationFlags::YAW) {
            update.yaw = degrees;
        }
        if flag.contains(LocationFlags::PITCH) {
            update.pitch = degrees;
        }
        if flag.contains(LocationFlags::ROLL) {
            update.roll = degrees;
        }
        if flag.contains(LocationFlags::HEAD_YAW) {
            update.head_yaw = degrees;
        }
        update
    }

    pub fn has(&self, flag: LocationFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// Full pose an update is merged into.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntityPose {
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub head_yaw: f32,
}

impl EntityPose {
    /// Apply every field the update carries; absent fields are left alone.
    pub fn apply(&mut self, update: &EntityLocationUpdate) {
        if update.has(LocationFlags::POSITION) {
            if update.relative {
                for (axis, delta) in self.position.iter_mut().zip(update.position) {
                    *axis += delta;
                }
            } else {
                self.position = update.position;
            }
        }
        if update.has(LocationFlags::YAW) {
            self.yaw = update.yaw;
        }
        if update.has(LocationFlags::PITCH) {
            self.pitch = update.pitch;
        }
        if update.has(LocationFlags::ROLL) {
            self.roll = update.roll;
        }
        if update.has(LocationFlags::HEAD_YAW) {
            self.head_yaw = update.head_yaw;
        }
    }
}

#[inline]
pub fn packed_to_degrees(packed: u8) -> f32 {
    f32::from(packed) * 360.0 / 256.0
}

/// Inverse of [`packed_to_degrees`], truncating. Angles outside one turn wrap.
#[inline]
pub fn degrees_to_packed(degrees: f32) -> u8 {
    ((degrees * 256.0 / 360.0) as i32) as u8
}

/// 16-bit packed angle used by player click packets.
#[inline]
pub fn degrees_to_packed16(degrees: f32) -> i16 {
    ((degrees * 65536.0 / 360.0) as i32) as i16
}

/// Wrap an angle into `[0, 360)`.
pub fn normalise_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Read an absolute position and head orientation.
///
/// `extended` selects 32-bit coordinates (negotiated extended entity positions).
pub fn read_absolute(
    reader: &mut WireReader<'_>,
    id: u8,
    extended: bool,
) -> Result<EntityLocationUpdate> {
    let (x, y, z) = if extended {
        (reader.read_i32()?, reader.read_i32()?, reader.read_i32()?)
    } else {
        (
            i32::from(reader.read_i16()?),
            i32::from(reader.read_i16()?),
            i32::from(reader.read_i16()?),
        )
    };

    // widened so any wire value survives the bias
    let mut y = i64::from(y) - i64::from(Y_WIRE_BIAS);
    if id == SELF_ID {
        y += i64::from(SELF_Y_ADJUST);
    }

    let position = [
        x as f32 / POSITION_SCALE,
        y as f32 / POSITION_SCALE,
        z as f32 / POSITION_SCALE,
    ];
    let head_yaw = packed_to_degrees(reader.read_u8()?);
    let pitch = packed_to_degrees(reader.read_u8()?);
    Ok(EntityLocationUpdate::absolute(position, head_yaw, pitch))
}

fn read_delta(reader: &mut WireReader<'_>) -> Result<[f32; 3]> {
    Ok([
        f32::from(reader.read_i8()?) / POSITION_SCALE,
        f32::from(reader.read_i8()?) / POSITION_SCALE,
        f32::from(reader.read_i8()?) / POSITION_SCALE,
    ])
}

/// Read a relative move; deltas are always 8-bit.
pub fn read_relative(
    reader: &mut WireReader<'_>,
    with_orientation: bool,
) -> Result<EntityLocationUpdate> {
    let delta = read_delta(reader)?;
    if !with_orientation {
        return Ok(EntityLocationUpdate::moved_by(delta));
    }
    let head_yaw = packed_to_degrees(reader.read_u8()?);
    let pitch = packed_to_degrees(reader.read_u8()?);
    Ok(EntityLocationUpdate::moved_and_turned(delta, head_yaw, pitch))
}

pub fn read_orientation(reader: &mut WireReader<'_>) -> Result<EntityLocationUpdate> {
    let head_yaw = packed_to_degrees(reader.read_u8()?);
    let pitch = packed_to_degrees(reader.read_u8()?);
    Ok(EntityLocationUpdate::turned(head_yaw, pitch))
}

/// Write an absolute position and orientation in the outgoing layout.
pub fn write_absolute(
    writer: &mut WireWriter,
    position: [f32; 3],
    head_yaw: f32,
    pitch: f32,
    extended: bool,
) {
    let x = (position[0] * POSITION_SCALE) as i32;
    let y = ((position[1] * POSITION_SCALE) as i32).saturating_add(Y_WIRE_BIAS);
    let z = (position[2] * POSITION_SCALE) as i32;

    if extended {
        writer.write_i32(x).write_i32(y).write_i32(z);
    } else {
        writer
            .write_i16(x as i16)
            .write_i16(y as i16)
            .write_i16(z as i16);
    }
    writer
        .write_u8(degrees_to_packed(head_yaw))
        .write_u8(degrees_to_packed(pitch));
}
