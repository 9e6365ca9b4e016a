//! Handlers for the base Classic opcodes.

use crate::core::opcode::Opcode;
use crate::core::string::{remove_end_plus, strip_colour_codes};
use crate::core::wire::WireReader;
use crate::error::{ProtocolError, Result};
use crate::protocol::blocks::MapDimensions;
use crate::protocol::dispatcher::{Dispatcher, PacketHandler};
use crate::protocol::events::{ClientEvent, MessageType};
use crate::protocol::location::{self, SELF_ID};
use crate::protocol::map_transfer::CHUNK_PAYLOAD;
use crate::protocol::session::ProtocolSession;
use tracing::{debug, trace};

/// Chat lines some servers use for client detail queries; never shown.
const DETAIL_PREFIX: &str = "^detail.user";

/// Tablist group used for entries created from AddEntity.
const WORKAROUND_GROUP: &str = "Players";

pub(crate) fn register(dispatcher: &mut Dispatcher<ProtocolSession>) {
    let handlers: [(Opcode, PacketHandler<ProtocolSession>); 15] = [
        (Opcode::Handshake, handle_handshake),
        (Opcode::Ping, handle_ping),
        (Opcode::LevelInit, handle_level_init),
        (Opcode::LevelDataChunk, handle_level_data_chunk),
        (Opcode::LevelFinalise, handle_level_finalise),
        (Opcode::SetBlock, handle_set_block),
        (Opcode::AddEntity, handle_add_entity),
        (Opcode::EntityTeleport, handle_entity_teleport),
        (Opcode::RelPosAndOrientation, handle_rel_pos_and_orientation),
        (Opcode::RelPos, handle_rel_pos),
        (Opcode::Orientation, handle_orientation),
        (Opcode::RemoveEntity, handle_remove_entity),
        (Opcode::Message, handle_message),
        (Opcode::Kick, handle_kick),
        (Opcode::SetPermission, handle_set_permission),
    ];
    for (opcode, handler) in handlers {
        dispatcher.register(opcode, opcode.base_frame_size(), handler);
    }
}

fn handle_handshake(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let protocol_version = r.read_u8()?;
    let name = r.read_string()?.to_text();
    let motd = r.read_string()?.to_text();
    let user_type = r.read_u8()?;
    debug!(protocol_version, server = %name, "Server identified");
    session.emit(ClientEvent::ServerIdentified {
        protocol_version,
        name,
        motd,
        user_type,
    });
    Ok(())
}

fn handle_ping(_session: &mut ProtocolSession, _r: &mut WireReader<'_>) -> Result<()> {
    Ok(())
}

/// Start the map transfer if none is running. Some servers send chunks before the init.
fn start_map(session: &mut ProtocolSession) {
    if session.map.begin() {
        session.world = None;
        session.emit(ClientEvent::NewMapStarting);
    }
}

fn handle_level_init(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    start_map(session);
    if session.capabilities().fast_map {
        let volume = r.read_i32()?;
        session.map.begin_fast(volume)?;
    }
    Ok(())
}

fn handle_level_data_chunk(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    start_map(session);

    let used = usize::from(r.read_u16()?).min(CHUNK_PAYLOAD);
    let payload = r.read_bytes(CHUNK_PAYLOAD)?;
    // percentage byte; progress is computed locally instead
    r.skip(1)?;

    let progress = session.map.push_chunk(&payload[..used])?;
    trace!(used, progress, "Map chunk received");
    session.emit(ClientEvent::LoadProgress(progress));
    Ok(())
}

fn handle_level_finalise(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let dimensions = MapDimensions::new(r.read_u16()?, r.read_u16()?, r.read_u16()?);
    let map = session.map.finalise(dimensions)?;
    session.world = Some(dimensions);
    session.emit(ClientEvent::MapReady(map));
    Ok(())
}

fn handle_set_block(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let (x, y, z) = (r.read_u16()?, r.read_u16()?, r.read_u16()?);
    let block = r.read_u8()?;
    if session.world.is_some_and(|world| world.contains(x, y, z)) {
        session.emit(ClientEvent::BlockChanged { x, y, z, block });
    }
    Ok(())
}

/// Normalise the names of a spawning entity. The server may only recolour the local
/// player's own name.
fn check_names(session: &ProtocolSession, id: u8, display: &str, skin: &str) -> (String, String) {
    let display = remove_end_plus(display).to_string();
    let skin = strip_colour_codes(remove_end_plus(skin));
    if id != SELF_ID {
        return (display, skin);
    }

    let username = &session.identity.username;
    let display = if strip_colour_codes(&display) == *username {
        display
    } else {
        username.clone()
    };
    let skin = if skin.is_empty() { username.clone() } else { skin };
    (display, skin)
}

/// Shared by AddEntity, ExtAddEntity, and ExtAddEntity2.
pub(crate) fn add_entity(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
    id: u8,
    display_name: &str,
    skin_name: &str,
    with_location: bool,
) -> Result<()> {
    let (display_name, skin_name) = check_names(session, id, display_name, skin_name);
    session.entities.insert(id);
    session.emit(ClientEvent::EntityAdded {
        id,
        display_name,
        skin_name,
        extended: with_location,
    });

    if with_location {
        let extended = session.capabilities().ext_entity_positions;
        let update = location::read_absolute(r, id, extended)?;
        session.emit(ClientEvent::LocationUpdated {
            id,
            update,
            interpolate: false,
        });
    }
    Ok(())
}

fn handle_add_entity(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let name = r.read_string()?.to_text();
    add_entity(session, r, id, &name, &name, true)?;

    if session.tablist.enabled {
        let name = remove_end_plus(&name).to_string();
        session.tablist.added.insert(id);
        session.emit(ClientEvent::TablistAdded {
            id,
            player_name: name.clone(),
            list_name: name,
            group_name: WORKAROUND_GROUP.to_string(),
            group_rank: 0,
        });
    }
    Ok(())
}

fn handle_entity_teleport(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let extended = session.capabilities().ext_entity_positions;
    let update = location::read_absolute(r, id, extended)?;
    session.emit(ClientEvent::LocationUpdated {
        id,
        update,
        interpolate: true,
    });
    Ok(())
}

fn handle_rel_pos_and_orientation(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
) -> Result<()> {
    let id = r.read_u8()?;
    let update = location::read_relative(r, true)?;
    session.emit(ClientEvent::LocationUpdated {
        id,
        update,
        interpolate: true,
    });
    Ok(())
}

fn handle_rel_pos(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let update = location::read_relative(r, false)?;
    session.emit(ClientEvent::LocationUpdated {
        id,
        update,
        interpolate: true,
    });
    Ok(())
}

fn handle_orientation(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let update = location::read_orientation(r)?;
    session.emit(ClientEvent::LocationUpdated {
        id,
        update,
        interpolate: true,
    });
    Ok(())
}

fn handle_remove_entity(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    if !session.entities.contains(id) {
        debug!(id, "Remove for unknown entity ignored");
        return Ok(());
    }
    // the local player is never despawned
    if id != SELF_ID {
        session.entities.remove(id);
        session.emit(ClientEvent::EntityRemoved { id });
    }

    if session.tablist.enabled && session.tablist.added.remove(id) {
        session.emit(ClientEvent::TablistRemoved { id });
    }
    Ok(())
}

fn handle_message(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let raw_type = r.read_u8()?;
    let typed = session.capabilities().message_types;
    // vanilla servers put the sender id here, 255 for server messages
    let prepend = !typed && raw_type == 0xFF;
    let kind = if typed {
        MessageType::from_u8(raw_type)
    } else {
        MessageType::Normal
    };

    let mut text = r.read_string()?.to_text();
    if prepend {
        text.insert_str(0, "&e");
    }

    let is_detail = text
        .get(..DETAIL_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DETAIL_PREFIX));
    if !is_detail {
        session.emit(ClientEvent::Message { text, kind });
    }
    Ok(())
}

fn handle_kick(_session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let reason = r.read_string()?.to_text();
    Err(ProtocolError::Kicked(reason))
}

fn handle_set_permission(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let user_type = r.read_u8()?;
    session.emit(ClientEvent::PermissionChanged { user_type });
    Ok(())
}
