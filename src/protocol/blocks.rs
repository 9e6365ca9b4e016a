//! Bulk block updates and custom block definitions.
//!
//! Both packets have layouts that depend on negotiated state: bulk updates always carry
//! all 256 index slots whatever the count, and block definitions switch between one shared
//! side texture and four per-face textures, and between a height-only shape byte and an
//! explicit bounding box.

use crate::core::wire::WireReader;
use crate::error::Result;

/// Index and block slots present in every bulk update frame.
pub const BULK_SLOTS: usize = 256;

/// Glass step sounds are played as stone.
pub const SOUND_GLASS: u8 = 6;
pub const SOUND_STONE: u8 = 4;

/// World size in blocks, as announced by the level finalise packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapDimensions {
    pub width: u16,
    pub height: u16,
    pub length: u16,
}

impl MapDimensions {
    pub fn new(width: u16, height: u16, length: u16) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    pub fn volume(&self) -> usize {
        usize::from(self.width) * usize::from(self.height) * usize::from(self.length)
    }

    pub fn contains(&self, x: u16, y: u16, z: u16) -> bool {
        x < self.width && y < self.height && z < self.length
    }

    /// Flat index → `(x, y, z)`, with Y the slowest axis. `None` when out of range.
    pub fn unpack(&self, index: i32) -> Option<(u16, u16, u16)> {
        let index = usize::try_from(index).ok()?;
        if index >= self.volume() {
            return None;
        }
        let width = usize::from(self.width);
        let length = usize::from(self.length);
        let x = index % width;
        let z = (index / width) % length;
        let y = index / (width * length);
        // every component is below its u16 dimension
        Some((x as u16, y as u16, z as u16))
    }
}

/// Decoded bulk update: up to [`BULK_SLOTS`] `(index, block)` pairs.
#[derive(Debug, Clone)]
pub struct BulkUpdate {
    count: usize,
    indices: [i32; BULK_SLOTS],
    blocks: [u8; BULK_SLOTS],
}

impl BulkUpdate {
    /// Decode the fixed 1281-byte payload. The count byte stores `entries - 1`.
    pub fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let count = usize::from(reader.read_u8()?) + 1;

        let mut indices = [0i32; BULK_SLOTS];
        for slot in indices.iter_mut().take(count) {
            *slot = reader.read_i32()?;
        }
        reader.skip((BULK_SLOTS - count) * 4)?;

        let mut blocks = [0u8; BULK_SLOTS];
        blocks[..count].copy_from_slice(reader.read_bytes(count)?);
        reader.skip(BULK_SLOTS - count)?;

        Ok(Self {
            count,
            indices,
            blocks,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Used `(index, block)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, u8)> + '_ {
        self.indices[..self.count]
            .iter()
            .copied()
            .zip(self.blocks[..self.count].iter().copied())
    }
}

/// Collision behaviour of a custom block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollideType {
    Gas,
    Liquid,
    Solid,
    Ice,
    SlipperyIce,
    Water,
    Lava,
    ClimbRope,
}

impl CollideType {
    /// Unknown values collide as solid.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CollideType::Gas,
            1 => CollideType::Liquid,
            3 => CollideType::Ice,
            4 => CollideType::SlipperyIce,
            5 => CollideType::Water,
            6 => CollideType::Lava,
            7 => CollideType::ClimbRope,
            _ => CollideType::Solid,
        }
    }
}

/// How a non-sprite block is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawStyle {
    Opaque,
    Transparent,
    TransparentThick,
    Translucent,
    Gas,
}

impl DrawStyle {
    /// Unknown values draw opaque.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DrawStyle::Transparent,
            2 => DrawStyle::TransparentThick,
            3 => DrawStyle::Translucent,
            4 => DrawStyle::Gas,
            _ => DrawStyle::Opaque,
        }
    }
}

/// Side texture layout, selected by the negotiated definition version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideTextures {
    Uniform(u8),
    PerFace {
        x_min: u8,
        x_max: u8,
        z_min: u8,
        z_max: u8,
    },
}

/// Block geometry. A shape byte of 0 turns the draw byte into a sprite offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockShape {
    Sprite { offset: u8 },
    Cuboid {
        min: [f32; 3],
        max: [f32; 3],
        draw: DrawStyle,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FogColour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A decoded custom block definition.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinition {
    pub id: u8,
    pub name: String,
    pub collide: CollideType,
    pub speed_multiplier: f32,
    pub top_texture: u8,
    pub side_textures: SideTextures,
    pub bottom_texture: u8,
    pub blocks_light: bool,
    pub walk_sound: u8,
    pub dig_sound: u8,
    pub full_bright: bool,
    pub shape: BlockShape,
    pub fog_density: f32,
    pub fog_colour: FogColour,
}

struct CommonStart {
    id: u8,
    name: String,
    collide: CollideType,
    speed_multiplier: f32,
    top_texture: u8,
    side_textures: SideTextures,
    bottom_texture: u8,
    blocks_light: bool,
    walk_sound: u8,
    dig_sound: u8,
    full_bright: bool,
}

fn read_common_start(reader: &mut WireReader<'_>, per_face_sides: bool) -> Result<CommonStart> {
    let id = reader.read_u8()?;
    let name = reader.read_string()?.to_text();
    let collide = CollideType::from_u8(reader.read_u8()?);
    let speed_multiplier = 2f32.powf((f32::from(reader.read_u8()?) - 128.0) / 64.0);
    let top_texture = reader.read_u8()?;

    let side_textures = if per_face_sides {
        SideTextures::PerFace {
            x_min: reader.read_u8()?,
            x_max: reader.read_u8()?,
            z_min: reader.read_u8()?,
            z_max: reader.read_u8()?,
        }
    } else {
        SideTextures::Uniform(reader.read_u8()?)
    };
    let bottom_texture = reader.read_u8()?;

    // wire byte is "transmits light"
    let blocks_light = reader.read_u8()? == 0;
    let dig_sound = reader.read_u8()?;
    let walk_sound = if dig_sound == SOUND_GLASS {
        SOUND_STONE
    } else {
        dig_sound
    };
    let full_bright = reader.read_u8()? != 0;

    Ok(CommonStart {
        id,
        name,
        collide,
        speed_multiplier,
        top_texture,
        side_textures,
        bottom_texture,
        blocks_light,
        walk_sound,
        dig_sound,
        full_bright,
    })
}

fn read_fog(reader: &mut WireReader<'_>) -> Result<(f32, FogColour)> {
    let density = reader.read_u8()?;
    let fog_density = if density == 0 {
        0.0
    } else {
        (f32::from(density) + 1.0) / 128.0
    };
    let fog_colour = FogColour {
        r: reader.read_u8()?,
        g: reader.read_u8()?,
        b: reader.read_u8()?,
    };
    Ok((fog_density, fog_colour))
}

fn finish(start: CommonStart, shape: BlockShape, fog: (f32, FogColour)) -> BlockDefinition {
    BlockDefinition {
        id: start.id,
        name: start.name,
        collide: start.collide,
        speed_multiplier: start.speed_multiplier,
        top_texture: start.top_texture,
        side_textures: start.side_textures,
        bottom_texture: start.bottom_texture,
        blocks_light: start.blocks_light,
        walk_sound: start.walk_sound,
        dig_sound: start.dig_sound,
        full_bright: start.full_bright,
        shape,
        fog_density: fog.0,
        fog_colour: fog.1,
    }
}

/// Decode a DefineBlock payload: shared side texture, height-only shape byte.
pub fn decode_define_block(reader: &mut WireReader<'_>) -> Result<BlockDefinition> {
    let start = read_common_start(reader, false)?;

    let shape_byte = reader.read_u8()?;
    let draw_byte = reader.read_u8()?;
    let shape = match shape_byte {
        0 => BlockShape::Sprite { offset: draw_byte },
        height => {
            let max_y = if height <= 16 {
                f32::from(height) / 16.0
            } else {
                1.0
            };
            BlockShape::Cuboid {
                min: [0.0; 3],
                max: [1.0, max_y, 1.0],
                draw: DrawStyle::from_u8(draw_byte),
            }
        }
    };

    let fog = read_fog(reader)?;
    Ok(finish(start, shape, fog))
}

/// Decode a DefineBlockExt payload. `per_face_sides` is set for definition version 2+.
pub fn decode_define_block_ext(
    reader: &mut WireReader<'_>,
    per_face_sides: bool,
) -> Result<BlockDefinition> {
    let start = read_common_start(reader, per_face_sides)?;

    let mut min = [0f32; 3];
    for axis in min.iter_mut() {
        *axis = (f32::from(reader.read_u8()?) / 16.0).clamp(0.0, 15.0 / 16.0);
    }
    let mut max = [0f32; 3];
    for axis in max.iter_mut() {
        *axis = (f32::from(reader.read_u8()?) / 16.0).clamp(1.0 / 16.0, 1.0);
    }

    let draw = DrawStyle::from_u8(reader.read_u8()?);
    let fog = read_fog(reader)?;
    Ok(finish(start, BlockShape::Cuboid { min, max, draw }, fog))
}
