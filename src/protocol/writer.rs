//! Outgoing packet encoders.
//!
//! Each function returns one complete frame, opcode included. Shapes that depend on
//! negotiation take the [`Capabilities`] in effect for outgoing traffic; callers pass
//! empty capabilities until the handshake reply has been sent.

use crate::config::{CPE_MAGIC, PROTOCOL_VERSION};
use crate::core::opcode::Opcode;
use crate::core::wire::WireWriter;
use crate::protocol::handshake::Capabilities;
use crate::protocol::location::{degrees_to_packed16, write_absolute, SELF_ID};
use bytes::Bytes;

fn frame(opcode: Opcode) -> WireWriter {
    let mut writer = WireWriter::with_capacity(usize::from(opcode.base_frame_size()) + 6);
    writer.write_u8(opcode.as_u8());
    writer
}

/// Initial handshake: protocol version, name, verification key, CPE marker.
pub fn login(username: &str, verification_key: &str, use_cpe: bool) -> Bytes {
    let mut w = frame(Opcode::Handshake);
    w.write_u8(PROTOCOL_VERSION)
        .write_string(username)
        .write_string(verification_key)
        .write_u8(if use_cpe { CPE_MAGIC } else { 0 });
    w.freeze()
}

/// Chat line. The unused byte doubles as the "more parts follow" flag when the server
/// supports longer messages.
pub fn chat(text: &str, partial: bool, caps: &Capabilities) -> Bytes {
    let payload = if !caps.longer_messages {
        SELF_ID
    } else {
        u8::from(partial)
    };
    let mut w = frame(Opcode::Message);
    w.write_u8(payload).write_string(text);
    w.freeze()
}

/// Local player position. Sent as an entity teleport for the self id, or with the held
/// block in that slot when HeldBlock is negotiated.
pub fn position(
    position: [f32; 3],
    head_yaw: f32,
    pitch: f32,
    held_block: u8,
    caps: &Capabilities,
) -> Bytes {
    let mut w = frame(Opcode::EntityTeleport);
    w.write_u8(if caps.held_block { held_block } else { SELF_ID });
    write_absolute(
        &mut w,
        position,
        head_yaw,
        pitch,
        caps.ext_entity_positions,
    );
    w.freeze()
}

pub fn set_block(x: i16, y: i16, z: i16, place: bool, block: u8) -> Bytes {
    let mut w = frame(Opcode::SetBlockClient);
    w.write_i16(x)
        .write_i16(y)
        .write_i16(z)
        .write_u8(u8::from(place))
        .write_u8(block);
    w.freeze()
}

pub fn ext_info(app_name: &str, extension_count: u16) -> Bytes {
    let mut w = frame(Opcode::ExtInfo);
    w.write_string(app_name).write_u16(extension_count);
    w.freeze()
}

pub fn ext_entry(name: &str, version: i32) -> Bytes {
    let mut w = frame(Opcode::ExtEntry);
    w.write_string(name).write_i32(version);
    w.freeze()
}

pub fn custom_block_support_level(level: u8) -> Bytes {
    let mut w = frame(Opcode::CustomBlockSupportLevel);
    w.write_u8(level);
    w.freeze()
}

pub fn two_way_ping(server_to_client: bool, data: u16) -> Bytes {
    let mut w = frame(Opcode::TwoWayPing);
    w.write_u8(u8::from(server_to_client)).write_u16(data);
    w.freeze()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
}

/// Face of the targeted block, in client terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFace {
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
}

impl BlockFace {
    /// Face numbering used on the wire.
    pub fn wire_id(self) -> u8 {
        match self {
            BlockFace::XMax => 0,
            BlockFace::XMin => 1,
            BlockFace::YMax => 2,
            BlockFace::YMin => 3,
            BlockFace::ZMax => 4,
            BlockFace::ZMin => 5,
        }
    }
}

/// What a player click is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickTarget {
    /// Targeted entity, or 255 for none
    pub entity: u8,
    pub block: [i16; 3],
    pub face: Option<BlockFace>,
}

impl Default for ClickTarget {
    fn default() -> Self {
        Self {
            entity: SELF_ID,
            block: [-1; 3],
            face: None,
        }
    }
}

pub fn player_click(
    button: MouseButton,
    pressed: bool,
    head_yaw: f32,
    pitch: f32,
    target: &ClickTarget,
) -> Bytes {
    let mut w = frame(Opcode::PlayerClick);
    w.write_u8(button as u8)
        .write_u8(if pressed { 0 } else { 1 })
        .write_i16(degrees_to_packed16(head_yaw))
        .write_i16(degrees_to_packed16(pitch))
        .write_u8(target.entity)
        .write_i16(target.block[0])
        .write_i16(target.block[1])
        .write_i16(target.block[2])
        .write_u8(target.face.map_or(255, BlockFace::wire_id));
    w.freeze()
}
