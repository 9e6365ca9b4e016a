// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::ProtocolConfig;
use crate::core::opcode::Opcode;
use crate::core::string::STRING_SIZE;
use crate::core::wire::WireWriter;
use crate::error::ProtocolError;
use crate::protocol::blocks::MapDimensions;
use crate::protocol::events::{ClientEvent, EntityPropertyKind, HotkeyAction, MessageType};
use crate::protocol::location::LocationFlags;
use crate::protocol::map_transfer::TransferState;
use crate::protocol::session::ProtocolSession;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::io::Write;

/// String field written verbatim, so colour codes survive.
fn raw(text: &str) -> [u8; STRING_SIZE] {
    let mut out = [b' '; STRING_SIZE];
    out[..text.len()].copy_from_slice(text.as_bytes());
    out
}

fn start(op: Opcode) -> WireWriter {
    let mut w = WireWriter::new();
    w.write_u8(op.as_u8());
    w
}

fn ext_info(app: &str, count: i16) -> Vec<u8> {
    let mut w = start(Opcode::ExtInfo);
    w.write_string(app).write_i16(count);
    w.freeze().to_vec()
}

fn ext_entry(name: &str, version: i32) -> Vec<u8> {
    let mut w = start(Opcode::ExtEntry);
    w.write_string(name).write_i32(version);
    w.freeze().to_vec()
}

fn add_entity(id: u8, name: &str) -> Vec<u8> {
    let mut w = start(Opcode::AddEntity);
    w.write_u8(id)
        .write_bytes(&raw(name))
        .write_i16(32)
        .write_i16(83)
        .write_i16(32)
        .write_u8(64)
        .write_u8(0);
    w.freeze().to_vec()
}

fn level_chunk(data: &[u8]) -> Vec<u8> {
    let mut payload = [0u8; 1024];
    payload[..data.len()].copy_from_slice(data);
    let mut w = start(Opcode::LevelDataChunk);
    w.write_u16(data.len() as u16).write_bytes(&payload).write_u8(0);
    w.freeze().to_vec()
}

fn finalise(w: u16, h: u16, l: u16) -> Vec<u8> {
    let mut frame = start(Opcode::LevelFinalise);
    frame.write_u16(w).write_u16(h).write_u16(l);
    frame.freeze().to_vec()
}

fn session() -> ProtocolSession {
    ProtocolSession::new(&ProtocolConfig::default())
}

/// Negotiate the given extensions in one announced batch.
fn negotiate(session: &mut ProtocolSession, extensions: &[(&str, i32)]) {
    session
        .dispatch(&ext_info("TestServer", extensions.len() as i16))
        .unwrap();
    for (name, version) in extensions {
        session.dispatch(&ext_entry(name, *version)).unwrap();
    }
    session.drain_events();
    session.drain_outgoing();
}

#[test]
fn test_server_identification() {
    let mut s = session();
    let mut w = start(Opcode::Handshake);
    w.write_u8(7)
        .write_string("Test Server")
        .write_string("Welcome")
        .write_u8(100);
    s.dispatch(&w.freeze()).unwrap();

    assert_eq!(
        s.drain_events(),
        vec![ClientEvent::ServerIdentified {
            protocol_version: 7,
            name: "Test Server".to_string(),
            motd: "Welcome".to_string(),
            user_type: 100,
        }]
    );
}

#[test]
fn test_negotiation_reply_and_widening() {
    let mut s = session();
    s.dispatch(&ext_info("TestServer", 2)).unwrap();
    s.dispatch(&ext_entry("FastMap", 1)).unwrap();
    assert!(s.drain_outgoing().is_empty());
    s.dispatch(&ext_entry("ExtEntityPositions", 1)).unwrap();

    let outgoing = s.drain_outgoing();
    assert_eq!(outgoing.len(), 29);
    assert_eq!(outgoing[0][0], Opcode::ExtInfo.as_u8());

    let events = s.drain_events();
    assert!(matches!(
        &events[0],
        ClientEvent::Message { text, .. } if text == "Server software: TestServer"
    ));
    assert!(matches!(events.last(), Some(ClientEvent::ExtensionsNegotiated(caps)) if caps.fast_map));

    assert_eq!(s.frame_size(Opcode::LevelInit.as_u8()), Some(5));
    assert_eq!(s.frame_size(Opcode::EntityTeleport.as_u8()), Some(16));
    assert_eq!(s.frame_size(Opcode::AddEntity.as_u8()), Some(80));
    assert_eq!(s.frame_size(Opcode::ExtAddEntity2.as_u8()), Some(144));
}

#[test]
fn test_gzip_map_flow() {
    let blocks: Vec<u8> = (0..8u8).collect();
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&8u32.to_be_bytes()).unwrap();
    enc.write_all(&blocks).unwrap();
    let stream = enc.finish().unwrap();

    let mut s = session();
    s.dispatch(&[Opcode::LevelInit.as_u8()]).unwrap();
    assert_eq!(s.drain_events(), vec![ClientEvent::NewMapStarting]);

    // header split across two chunks
    s.dispatch(&level_chunk(&stream[..5])).unwrap();
    s.dispatch(&level_chunk(&stream[5..])).unwrap();
    s.dispatch(&finalise(2, 2, 2)).unwrap();

    let events = s.drain_events();
    assert_eq!(events[0], ClientEvent::LoadProgress(0.0));
    assert_eq!(events[1], ClientEvent::LoadProgress(1.0));
    match &events[2] {
        ClientEvent::MapReady(map) => {
            assert_eq!(map.blocks, blocks);
            assert_eq!(map.dimensions, MapDimensions::new(2, 2, 2));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(s.world_dimensions(), Some(MapDimensions::new(2, 2, 2)));
    assert_eq!(s.map_state(), TransferState::Finalized);
}

#[test]
fn test_fast_map_flow() {
    let blocks = vec![3u8; 4096];
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&blocks).unwrap();
    let stream = enc.finish().unwrap();

    let mut s = session();
    negotiate(&mut s, &[("FastMap", 1)]);

    let mut init = start(Opcode::LevelInit);
    init.write_i32(4096);
    s.dispatch(&init.freeze()).unwrap();
    for chunk in stream.chunks(1024) {
        s.dispatch(&level_chunk(chunk)).unwrap();
    }
    s.dispatch(&finalise(16, 16, 16)).unwrap();

    let ready = s
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            ClientEvent::MapReady(map) => Some(map),
            _ => None,
        })
        .expect("map ready");
    assert_eq!(ready.volume(), 4096);
    assert_eq!(ready.blocks, blocks);
}

#[test]
fn test_chunk_without_init_starts_map() {
    let mut s = session();
    s.dispatch(&level_chunk(&[0x1f])).unwrap();
    let events = s.drain_events();
    assert_eq!(events[0], ClientEvent::NewMapStarting);
    assert_eq!(s.map_state(), TransferState::HeaderPending);
}

#[test]
fn test_finalise_mismatch_disconnects() {
    let mut s = session();
    negotiate(&mut s, &[("FastMap", 1)]);
    let mut init = start(Opcode::LevelInit);
    init.write_i32(4096);
    s.dispatch(&init.freeze()).unwrap();

    let err = s.dispatch(&finalise(16, 16, 15)).unwrap_err();
    assert!(matches!(err, ProtocolError::MapVolumeMismatch { volume: 4096, .. }));
    assert_eq!(s.map_state(), TransferState::Idle);
    assert!(s.is_disconnected());
    assert!(matches!(
        s.drain_events().last(),
        Some(ClientEvent::Disconnected { .. })
    ));
}

#[test]
fn test_set_block_needs_world() {
    let mut s = session();
    let mut w = start(Opcode::SetBlock);
    w.write_u16(1).write_u16(2).write_u16(3).write_u8(9);
    let frame = w.freeze();

    s.dispatch(&frame).unwrap();
    assert!(s.drain_events().is_empty());

    s.world = Some(MapDimensions::new(4, 4, 4));
    s.dispatch(&frame).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![ClientEvent::BlockChanged {
            x: 1,
            y: 2,
            z: 3,
            block: 9
        }]
    );
}

#[test]
fn test_self_spawn_keeps_username() {
    let mut s = session();
    s.dispatch(&add_entity(255, "&cImpostor")).unwrap();
    s.dispatch(&add_entity(255, "&aPlayer+")).unwrap();

    let added: Vec<(String, String)> = s
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::EntityAdded {
                display_name,
                skin_name,
                ..
            } => Some((display_name, skin_name)),
            _ => None,
        })
        .collect();
    assert_eq!(
        added,
        vec![
            ("Player".to_string(), "Impostor".to_string()),
            ("&aPlayer".to_string(), "Player".to_string()),
        ]
    );
}

#[test]
fn test_add_entity_location() {
    let mut s = session();
    s.dispatch(&add_entity(3, "Bob")).unwrap();
    let events = s.drain_events();
    match &events[1] {
        ClientEvent::LocationUpdated {
            id,
            update,
            interpolate,
        } => {
            assert_eq!(*id, 3);
            assert!(!interpolate);
            assert_eq!(update.position, [1.0, 1.0, 1.0]);
            assert!(update.has(LocationFlags::POSITION | LocationFlags::HEAD_YAW));
            assert_eq!(update.head_yaw, 90.0);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_tablist_workaround_lifecycle() {
    let mut s = session();
    s.dispatch(&add_entity(5, "Alice+")).unwrap();
    let events = s.drain_events();
    assert!(events.contains(&ClientEvent::TablistAdded {
        id: 5,
        player_name: "Alice".to_string(),
        list_name: "Alice".to_string(),
        group_name: "Players".to_string(),
        group_rank: 0,
    }));

    s.dispatch(&[Opcode::RemoveEntity.as_u8(), 5]).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![
            ClientEvent::EntityRemoved { id: 5 },
            ClientEvent::TablistRemoved { id: 5 },
        ]
    );

    s.dispatch(&add_entity(6, "Carol")).unwrap();
    s.drain_events();

    let mut w = start(Opcode::ExtAddPlayerName);
    w.write_i16(7)
        .write_bytes(&raw("&eDave+"))
        .write_bytes(&raw("&eDave+"))
        .write_string("Admins")
        .write_u8(2);
    s.dispatch(&w.freeze()).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![
            ClientEvent::TablistRemoved { id: 6 },
            ClientEvent::TablistAdded {
                id: 7,
                player_name: "Dave".to_string(),
                list_name: "&eDave".to_string(),
                group_name: "Admins".to_string(),
                group_rank: 2,
            },
        ]
    );

    // workaround is off for good
    s.dispatch(&add_entity(8, "Erin")).unwrap();
    assert!(!s
        .drain_events()
        .iter()
        .any(|event| matches!(event, ClientEvent::TablistAdded { .. })));
}

#[test]
fn test_remove_unknown_entity_ignored() {
    let mut s = session();
    s.dispatch(&[Opcode::RemoveEntity.as_u8(), 42]).unwrap();
    assert!(s.drain_events().is_empty());
}

#[test]
fn test_message_without_message_types() {
    let mut s = session();
    let mut w = start(Opcode::Message);
    w.write_u8(0xFF).write_string("Server restarting");
    s.dispatch(&w.freeze()).unwrap();

    let mut w = start(Opcode::Message);
    w.write_u8(0).write_string("^Detail.User=abc");
    s.dispatch(&w.freeze()).unwrap();

    assert_eq!(
        s.drain_events(),
        vec![ClientEvent::Message {
            text: "&eServer restarting".to_string(),
            kind: MessageType::Normal,
        }]
    );
}

#[test]
fn test_message_types_select_area() {
    let mut s = session();
    negotiate(&mut s, &[("MessageTypes", 1)]);
    let mut w = start(Opcode::Message);
    w.write_u8(12).write_string("Lag: 20ms");
    s.dispatch(&w.freeze()).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![ClientEvent::Message {
            text: "Lag: 20ms".to_string(),
            kind: MessageType::BottomRight(2),
        }]
    );
}

#[test]
fn test_kick_disconnects_with_reason() {
    let mut s = session();
    let mut w = start(Opcode::Kick);
    w.write_string("Too many players");
    let err = s.dispatch(&w.freeze()).unwrap_err();
    assert!(matches!(err, ProtocolError::Kicked(ref reason) if reason == "Too many players"));
    match s.drain_events().as_slice() {
        [ClientEvent::Disconnected { reason, .. }] => assert_eq!(reason, "Too many players"),
        other => panic!("unexpected events {other:?}"),
    }
}

#[test]
fn test_bulk_update_single_entry() {
    let mut s = session();
    s.world = Some(MapDimensions::new(4, 4, 4));

    let mut w = start(Opcode::BulkBlockUpdate);
    w.write_u8(0).write_i32(5);
    for _ in 1..256 {
        w.write_i32(0);
    }
    w.write_u8(11).write_bytes(&[0u8; 255]);
    s.dispatch(&w.freeze()).unwrap();

    assert_eq!(
        s.drain_events(),
        vec![ClientEvent::BlockChanged {
            x: 1,
            y: 0,
            z: 1,
            block: 11
        }]
    );
}

#[test]
fn test_two_way_ping() {
    let mut s = session();
    s.dispatch(&[Opcode::TwoWayPing.as_u8(), 1, 0x12, 0x34])
        .unwrap();
    let echoed = s.drain_outgoing();
    assert_eq!(echoed.len(), 1);
    assert_eq!(&echoed[0][..], &[Opcode::TwoWayPing.as_u8(), 1, 0x12, 0x34]);

    s.dispatch(&[Opcode::TwoWayPing.as_u8(), 0, 0, 9]).unwrap();
    assert_eq!(s.drain_events(), vec![ClientEvent::PingReceived { data: 9 }]);
    assert!(s.drain_outgoing().is_empty());
}

#[test]
fn test_texture_url_changes() {
    let mut s = session();
    let url = |text: &str| {
        let mut w = start(Opcode::SetMapEnvUrl);
        w.write_string(text);
        w.freeze()
    };

    s.dispatch(&url("")).unwrap();
    s.dispatch(&url("ftp://example.com/pack.zip")).unwrap();
    assert!(s.drain_events().is_empty());

    s.dispatch(&url("https://example.com/pack.zip")).unwrap();
    s.dispatch(&url("")).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![
            ClientEvent::TexturePackChanged {
                url: Some("https://example.com/pack.zip".to_string())
            },
            ClientEvent::TexturePackChanged { url: None },
        ]
    );
}

#[test]
fn test_server_textures_disabled() {
    let config = ProtocolConfig::default_with_overrides(|c| c.protocol.allow_server_textures = false);
    let mut s = ProtocolSession::new(&config);
    let mut w = start(Opcode::SetMapEnvUrl);
    w.write_string("http://example.com/pack.zip");
    s.dispatch(&w.freeze()).unwrap();
    assert!(s.drain_events().is_empty());
}

#[test]
fn test_map_appearance_v2_reads_extra_fields() {
    let mut s = session();
    negotiate(&mut s, &[("EnvMapAppearance", 2)]);
    assert_eq!(s.frame_size(Opcode::EnvSetMapAppearance.as_u8()), Some(73));

    let mut w = start(Opcode::EnvSetMapAppearance);
    w.write_string("")
        .write_u8(7)
        .write_u8(8)
        .write_i16(32)
        .write_i16(64)
        .write_i16(0);
    s.dispatch(&w.freeze()).unwrap();
    match s.drain_events().as_slice() {
        [ClientEvent::MapAppearanceChanged(appearance)] => {
            assert_eq!(appearance.side_block, 7);
            assert_eq!(appearance.clouds_height, Some(64));
            assert_eq!(appearance.max_view_distance, Some(32768));
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[test]
fn test_entity_rotation_property() {
    let mut s = session();
    s.dispatch(&add_entity(4, "Bob")).unwrap();
    s.drain_events();

    let mut w = start(Opcode::SetEntityProperty);
    w.write_u8(4).write_u8(1).write_i32(450);
    s.dispatch(&w.freeze()).unwrap();
    let events = s.drain_events();
    assert_eq!(
        events[0],
        ClientEvent::PropertyChanged {
            id: 4,
            kind: EntityPropertyKind::RotationY,
            value: 90.0,
        }
    );
    match &events[1] {
        ClientEvent::LocationUpdated { update, .. } => {
            assert_eq!(update.flags, LocationFlags::HEAD_YAW);
            assert_eq!(update.head_yaw, 90.0);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let mut w = start(Opcode::SetEntityProperty);
    w.write_u8(4).write_u8(4).write_i32(0);
    s.dispatch(&w.freeze()).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![ClientEvent::PropertyChanged {
            id: 4,
            kind: EntityPropertyKind::ScaleY,
            value: 0.01,
        }]
    );
}

#[test]
fn test_text_hotkey_actions() {
    let mut s = session();
    let hotkey = |action: &str, key: i32| {
        let mut w = start(Opcode::SetTextHotkey);
        w.write_string("Label")
            .write_string(action)
            .write_i32(key)
            .write_u8(1);
        w.freeze()
    };

    s.dispatch(&hotkey("/help\n", 59)).unwrap();
    s.dispatch(&hotkey("/tp ", 60)).unwrap();
    s.dispatch(&hotkey("", 61)).unwrap();
    s.dispatch(&hotkey("/ignored", 300)).unwrap();

    let actions: Vec<HotkeyAction> = s
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::HotkeyChanged { action, .. } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(
        actions,
        vec![
            HotkeyAction::Set {
                text: "/help".to_string(),
                more_input: false
            },
            HotkeyAction::Set {
                text: "/tp".to_string(),
                more_input: true
            },
            HotkeyAction::Remove,
        ]
    );
}

#[test]
fn test_custom_block_support_level_replies() {
    let mut s = session();
    s.dispatch(&[Opcode::CustomBlockSupportLevel.as_u8(), 1])
        .unwrap();
    assert_eq!(s.drain_events(), vec![ClientEvent::CustomBlocksEnabled]);
    assert!(s.capabilities().custom_blocks);
    let reply = s.drain_outgoing();
    assert_eq!(&reply[0][..], &[Opcode::CustomBlockSupportLevel.as_u8(), 1]);
}

#[test]
fn test_inventory_order_slots() {
    let mut s = session();
    s.dispatch(&[Opcode::SetInventoryOrder.as_u8(), 20, 0]).unwrap();
    s.dispatch(&[Opcode::SetInventoryOrder.as_u8(), 21, 3]).unwrap();
    assert_eq!(
        s.drain_events(),
        vec![
            ClientEvent::InventoryOrderChanged {
                block: 20,
                slot: None
            },
            ClientEvent::InventoryOrderChanged {
                block: 21,
                slot: Some(2)
            },
        ]
    );
}

#[test]
fn test_outgoing_shapes_wait_for_reply() {
    let mut s = session();
    s.dispatch(&ext_info("TestServer", 2)).unwrap();
    s.dispatch(&ext_entry("ExtEntityPositions", 1)).unwrap();

    // decoders already use extended positions, writers do not yet
    assert!(s.capabilities().ext_entity_positions);
    s.send_position([0.0; 3], 0.0, 0.0, 1);
    assert_eq!(s.drain_outgoing()[0].len(), 10);

    s.dispatch(&ext_entry("HeldBlock", 1)).unwrap();
    s.drain_outgoing();
    s.send_position([0.0; 3], 0.0, 0.0, 1);
    let frame = &s.drain_outgoing()[0];
    assert_eq!(frame.len(), 16);
    assert_eq!(frame[1], 1);
}
