//! Handlers for the CPE extension opcodes.
//!
//! Every handler decodes its frame against the capabilities negotiated so far, so a frame
//! whose size was widened by an extension is also read in its widened shape.

use crate::core::opcode::Opcode;
use crate::core::string::{remove_end_plus, strip_colour_codes};
use crate::core::wire::WireReader;
use crate::error::Result;
use crate::protocol::blocks::{self, BulkUpdate};
use crate::protocol::classic;
use crate::protocol::dispatcher::{Dispatcher, PacketHandler};
use crate::protocol::events::{
    self, ClientEvent, EntityPropertyKind, EnvColour, EnvProperty, HackPermissions, HotkeyAction,
    MapAppearance, MessageType, Rgb, Rgba, Weather,
};
use crate::protocol::handshake::NegotiationStep;
use crate::protocol::location::{normalise_degrees, EntityLocationUpdate, LocationFlags};
use crate::protocol::session::ProtocolSession;
use crate::protocol::writer;
use tracing::{debug, info, warn};

/// Block support level this client implements.
const CUSTOM_BLOCKS_LEVEL: u8 = 1;

/// Entity scales below this are clamped up.
const MIN_ENTITY_SCALE: f32 = 0.01;

pub(crate) fn register(dispatcher: &mut Dispatcher<ProtocolSession>) {
    let handlers: [(Opcode, PacketHandler<ProtocolSession>); 25] = [
        (Opcode::ExtInfo, handle_ext_info),
        (Opcode::ExtEntry, handle_ext_entry),
        (Opcode::SetClickDistance, handle_set_click_distance),
        (Opcode::CustomBlockSupportLevel, handle_custom_block_level),
        (Opcode::HoldThis, handle_hold_this),
        (Opcode::SetTextHotkey, handle_set_text_hotkey),
        (Opcode::ExtAddPlayerName, handle_ext_add_player_name),
        (Opcode::ExtAddEntity, handle_ext_add_entity),
        (Opcode::ExtRemovePlayerName, handle_ext_remove_player_name),
        (Opcode::EnvSetColor, handle_env_set_color),
        (Opcode::MakeSelection, handle_make_selection),
        (Opcode::RemoveSelection, handle_remove_selection),
        (Opcode::SetBlockPermission, handle_set_block_permission),
        (Opcode::ChangeModel, handle_change_model),
        (Opcode::EnvSetMapAppearance, handle_env_set_map_appearance),
        (Opcode::EnvSetWeather, handle_env_set_weather),
        (Opcode::HackControl, handle_hack_control),
        (Opcode::ExtAddEntity2, handle_ext_add_entity2),
        (Opcode::BulkBlockUpdate, handle_bulk_block_update),
        (Opcode::SetTextColor, handle_set_text_color),
        (Opcode::SetMapEnvUrl, handle_set_map_env_url),
        (Opcode::SetMapEnvProperty, handle_set_map_env_property),
        (Opcode::SetEntityProperty, handle_set_entity_property),
        (Opcode::TwoWayPing, handle_two_way_ping),
        (Opcode::SetInventoryOrder, handle_set_inventory_order),
    ];
    for (opcode, handler) in handlers {
        dispatcher.register(opcode, opcode.base_frame_size(), handler);
    }
}

/// Custom block definitions, only registered when custom blocks are allowed.
pub(crate) fn register_block_definitions(dispatcher: &mut Dispatcher<ProtocolSession>) {
    let handlers: [(Opcode, PacketHandler<ProtocolSession>); 3] = [
        (Opcode::DefineBlock, handle_define_block),
        (Opcode::UndefineBlock, handle_undefine_block),
        (Opcode::DefineBlockExt, handle_define_block_ext),
    ];
    for (opcode, handler) in handlers {
        dispatcher.register(opcode, opcode.base_frame_size(), handler);
    }
}

fn handle_ext_info(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let app_name = r.read_string()?.to_text();
    let count = r.read_i16()?;

    session.emit(ClientEvent::Message {
        text: format!("Server software: {app_name}"),
        kind: MessageType::Normal,
    });
    if session.negotiation.on_ext_info(&app_name, count) == NegotiationStep::SendReply {
        session.send_extension_reply();
    }
    Ok(())
}

fn handle_ext_entry(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let name = r.read_string()?.to_text();
    let version = r.read_i32()?;

    let table = session.dispatcher.frame_table();
    if session.negotiation.on_ext_entry(&name, version, &table) == NegotiationStep::SendReply {
        session.send_extension_reply();
    }
    Ok(())
}

fn handle_set_click_distance(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let reach = f32::from(r.read_u16()?) / 32.0;
    session.emit(ClientEvent::ClickDistance { reach });
    Ok(())
}

fn handle_custom_block_level(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let server_level = r.read_u8()?;
    debug!(server_level, "Custom block support level");

    session.queue(writer::custom_block_support_level(CUSTOM_BLOCKS_LEVEL));
    session.negotiation.capabilities_mut().custom_blocks = true;
    session.emit(ClientEvent::CustomBlocksEnabled);
    Ok(())
}

fn handle_hold_this(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let block = r.read_u8()?;
    let can_change = r.read_u8()? == 0;
    session.emit(ClientEvent::HoldBlock { block, can_change });
    Ok(())
}

fn handle_set_text_hotkey(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let label = r.read_string()?.to_text();
    let action = r.read_string()?.to_text();
    let key_code = r.read_i32()?;
    let modifiers = r.read_u8()?;

    let Ok(key_code) = u8::try_from(key_code) else {
        debug!(key_code, "Hotkey with out of range key ignored");
        return Ok(());
    };

    let action = if action.is_empty() {
        HotkeyAction::Remove
    } else if let Some(text) = action.strip_suffix('\n') {
        HotkeyAction::Set {
            text: text.to_string(),
            more_input: false,
        }
    } else {
        HotkeyAction::Set {
            text: action,
            more_input: true,
        }
    };
    session.emit(ClientEvent::HotkeyChanged {
        label,
        key_code,
        modifiers,
        action,
    });
    Ok(())
}

fn handle_ext_add_player_name(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = (r.read_i16()? & 0xFF) as u8;
    let player_name = strip_colour_codes(remove_end_plus(&r.read_string()?.to_text()));
    let list_name = remove_end_plus(&r.read_string()?.to_text()).to_string();
    let group_name = r.read_string()?.to_text();
    let group_rank = r.read_u8()?;

    // a real tablist packet retires every entry faked from AddEntity
    if session.tablist.enabled {
        session.tablist.enabled = false;
        let added: Vec<u8> = session.tablist.added.iter().collect();
        session.tablist.added.clear();
        for stale in added {
            session.emit(ClientEvent::TablistRemoved { id: stale });
        }
    }

    session.emit(ClientEvent::TablistAdded {
        id,
        player_name,
        list_name,
        group_name,
        group_rank,
    });
    Ok(())
}

fn handle_ext_add_entity(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let display_name = r.read_string()?.to_text();
    let skin_name = r.read_string()?.to_text();
    classic::add_entity(session, r, id, &display_name, &skin_name, false)
}

fn handle_ext_add_entity2(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let display_name = r.read_string()?.to_text();
    let skin_name = r.read_string()?.to_text();
    classic::add_entity(session, r, id, &display_name, &skin_name, true)
}

fn handle_ext_remove_player_name(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
) -> Result<()> {
    let id = (r.read_i16()? & 0xFF) as u8;
    session.emit(ClientEvent::TablistRemoved { id });
    Ok(())
}

fn handle_env_set_color(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let kind = r.read_u8()?;
    let (red, green, blue) = (r.read_i16()?, r.read_i16()?, r.read_i16()?);

    let Some(target) = EnvColour::from_u8(kind) else {
        debug!(kind, "Unknown environment colour ignored");
        return Ok(());
    };
    // any component outside a byte resets the colour
    let colour = match (
        u8::try_from(red),
        u8::try_from(green),
        u8::try_from(blue),
    ) {
        (Ok(red), Ok(green), Ok(blue)) => Some(Rgb {
            r: red,
            g: green,
            b: blue,
        }),
        _ => None,
    };
    session.emit(ClientEvent::EnvColourChanged { target, colour });
    Ok(())
}

fn handle_make_selection(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let label = r.read_string()?.to_text();
    let start = [r.read_i16()?, r.read_i16()?, r.read_i16()?];
    let end = [r.read_i16()?, r.read_i16()?, r.read_i16()?];
    let colour = Rgba {
        r: r.read_i16()? as u8,
        g: r.read_i16()? as u8,
        b: r.read_i16()? as u8,
        a: r.read_i16()? as u8,
    };
    session.emit(ClientEvent::SelectionAdded {
        id,
        label,
        start,
        end,
        colour,
    });
    Ok(())
}

fn handle_remove_selection(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    session.emit(ClientEvent::SelectionRemoved { id });
    Ok(())
}

fn handle_set_block_permission(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
) -> Result<()> {
    let block = r.read_u8()?;
    let can_place = r.read_u8()? != 0;
    let can_delete = r.read_u8()? != 0;
    session.emit(ClientEvent::BlockPermissionChanged {
        block,
        can_place,
        can_delete,
    });
    Ok(())
}

fn handle_change_model(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    let model = r.read_string()?.to_text().to_ascii_lowercase();
    if session.entities.contains(id) {
        session.emit(ClientEvent::ModelChanged { id, model });
    }
    Ok(())
}

/// Apply a texture pack URL from SetMapEnvUrl or EnvSetMapAppearance.
fn apply_texture_url(session: &mut ProtocolSession, url: String) {
    if !session.settings.allow_server_textures {
        return;
    }
    if url.is_empty() {
        if session.texture_url.take().is_some() {
            session.emit(ClientEvent::TexturePackChanged { url: None });
        }
    } else if url.starts_with("http://") || url.starts_with("https://") {
        info!(url = %url, "Server texture pack");
        session.texture_url = Some(url.clone());
        session.emit(ClientEvent::TexturePackChanged { url: Some(url) });
    } else {
        warn!(url = %url, "Ignoring texture pack url without http scheme");
    }
}

fn handle_env_set_map_appearance(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
) -> Result<()> {
    let url = r.read_string()?.to_text();
    apply_texture_url(session, url);

    let side_block = r.read_u8()?;
    let edge_block = r.read_u8()?;
    let edge_height = r.read_i16()?;
    let (clouds_height, max_view_distance) = if session.capabilities().env_map_v2() {
        let clouds = r.read_i16()?;
        let view = events::max_view_distance(i32::from(r.read_i16()?));
        (Some(clouds), Some(view))
    } else {
        (None, None)
    };

    session.emit(ClientEvent::MapAppearanceChanged(MapAppearance {
        side_block,
        edge_block,
        edge_height,
        clouds_height,
        max_view_distance,
    }));
    Ok(())
}

fn handle_env_set_weather(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let weather = Weather::from_u8(r.read_u8()?);
    session.emit(ClientEvent::WeatherChanged(weather));
    Ok(())
}

fn handle_hack_control(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let can_fly = r.read_u8()? != 0;
    let can_noclip = r.read_u8()? != 0;
    let can_speed = r.read_u8()? != 0;
    let can_respawn = r.read_u8()? != 0;
    let can_third_person = r.read_u8()? != 0;
    let jump_height = match r.read_u16()? {
        u16::MAX => None,
        raw => Some(f32::from(raw) / 32.0),
    };

    session.emit(ClientEvent::HacksChanged(HackPermissions {
        can_fly,
        can_noclip,
        can_speed,
        can_respawn,
        can_third_person,
        jump_height,
    }));
    Ok(())
}

fn handle_bulk_block_update(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let update = BulkUpdate::decode(r)?;
    let Some(world) = session.world else {
        debug!(count = update.len(), "Bulk update without a world ignored");
        return Ok(());
    };

    for (index, block) in update.iter() {
        match world.unpack(index) {
            Some((x, y, z)) => session.emit(ClientEvent::BlockChanged { x, y, z, block }),
            None => debug!(index, "Bulk update index outside the world"),
        }
    }
    Ok(())
}

fn handle_set_text_color(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let colour = Rgba {
        r: r.read_u8()?,
        g: r.read_u8()?,
        b: r.read_u8()?,
        a: r.read_u8()?,
    };
    let code = r.read_u8()?;
    if matches!(code, 0 | b' ' | 0xFF | b'%' | b'&') {
        debug!(code, "Reserved colour code ignored");
        return Ok(());
    }
    session.emit(ClientEvent::TextColourChanged { code, colour });
    Ok(())
}

fn handle_set_map_env_url(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let url = r.read_string()?.to_text();
    apply_texture_url(session, url);
    Ok(())
}

fn handle_set_map_env_property(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
) -> Result<()> {
    let kind = r.read_u8()?;
    let value = r.read_i32()?;
    match EnvProperty::from_wire(kind, value) {
        Some(property) => session.emit(ClientEvent::EnvPropertyChanged(property)),
        None => debug!(kind, value, "Unknown environment property ignored"),
    }
    Ok(())
}

fn handle_set_entity_property(
    session: &mut ProtocolSession,
    r: &mut WireReader<'_>,
) -> Result<()> {
    let id = r.read_u8()?;
    let kind = r.read_u8()?;
    let raw = r.read_i32()?;

    if !session.entities.contains(id) {
        return Ok(());
    }
    let Some(kind) = EntityPropertyKind::from_u8(kind) else {
        debug!(id, kind, "Unknown entity property ignored");
        return Ok(());
    };

    let rotation = match kind {
        EntityPropertyKind::RotationX => Some(LocationFlags::PITCH),
        EntityPropertyKind::RotationY => Some(LocationFlags::HEAD_YAW),
        EntityPropertyKind::RotationZ => Some(LocationFlags::ROLL),
        _ => None,
    };
    match rotation {
        Some(flag) => {
            let degrees = normalise_degrees(raw as f32);
            session.emit(ClientEvent::PropertyChanged {
                id,
                kind,
                value: degrees,
            });
            session.emit(ClientEvent::LocationUpdated {
                id,
                update: EntityLocationUpdate::rotation(flag, degrees),
                interpolate: true,
            });
        }
        None => {
            let scale = (raw as f32 / 1000.0).max(MIN_ENTITY_SCALE);
            session.emit(ClientEvent::PropertyChanged {
                id,
                kind,
                value: scale,
            });
        }
    }
    Ok(())
}

fn handle_two_way_ping(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let server_to_client = r.read_u8()? != 0;
    let data = r.read_u16()?;
    if server_to_client {
        session.queue(writer::two_way_ping(true, data));
    } else {
        session.emit(ClientEvent::PingReceived { data });
    }
    Ok(())
}

fn handle_set_inventory_order(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let block = r.read_u8()?;
    let order = r.read_u8()?;
    let slot = match order {
        0 | 255 => None,
        n => Some(n - 1),
    };
    session.emit(ClientEvent::InventoryOrderChanged { block, slot });
    Ok(())
}

fn handle_define_block(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let definition = blocks::decode_define_block(r)?;
    debug!(id = definition.id, name = %definition.name, "Block defined");
    session.emit(ClientEvent::BlockDefined(Box::new(definition)));
    Ok(())
}

fn handle_undefine_block(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let id = r.read_u8()?;
    session.emit(ClientEvent::BlockUndefined { id });
    Ok(())
}

fn handle_define_block_ext(session: &mut ProtocolSession, r: &mut WireReader<'_>) -> Result<()> {
    let per_face = session.capabilities().per_face_block_sides();
    let definition = blocks::decode_define_block_ext(r, per_face)?;
    debug!(id = definition.id, name = %definition.name, "Extended block defined");
    session.emit(ClientEvent::BlockDefined(Box::new(definition)));
    Ok(())
}
