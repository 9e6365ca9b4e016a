//! Extension negotiation driven through a full session.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use classic_protocol::config::ProtocolConfig;
use classic_protocol::core::opcode::Opcode;
use classic_protocol::core::wire::WireWriter;
use classic_protocol::protocol::handshake::{Extension, NegotiationPhase};
use classic_protocol::protocol::session::ProtocolSession;
use classic_protocol::ClientEvent;
use proptest::prelude::*;

fn ext_info(app: &str, count: i16) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.write_u8(Opcode::ExtInfo.as_u8())
        .write_string(app)
        .write_i16(count);
    w.freeze().to_vec()
}

fn ext_entry(name: &str, version: i32) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.write_u8(Opcode::ExtEntry.as_u8())
        .write_string(name)
        .write_i32(version);
    w.freeze().to_vec()
}

fn reply_count(session: &mut ProtocolSession) -> usize {
    session
        .drain_outgoing()
        .iter()
        .filter(|frame| frame[0] == Opcode::ExtInfo.as_u8())
        .count()
}

#[test]
fn test_zero_extensions_reply_immediately() {
    let mut session = ProtocolSession::new(&ProtocolConfig::default());
    session.dispatch(&ext_info("Vanilla+", 0)).unwrap();
    assert_eq!(reply_count(&mut session), 1);
    assert_eq!(session.negotiation().phase(), NegotiationPhase::Negotiated);
}

#[test]
fn test_late_second_batch_gets_no_second_reply() {
    let mut session = ProtocolSession::new(&ProtocolConfig::default());
    session.dispatch(&ext_info("srv", 1)).unwrap();
    session.dispatch(&ext_entry("HeldBlock", 1)).unwrap();
    assert_eq!(reply_count(&mut session), 1);

    session.dispatch(&ext_info("srv", 1)).unwrap();
    session.dispatch(&ext_entry("FastMap", 1)).unwrap();
    assert_eq!(reply_count(&mut session), 0);
    // still applied to decoding
    assert!(session.capabilities().fast_map);
    assert_eq!(session.frame_size(Opcode::LevelInit.as_u8()), Some(5));
}

#[test]
fn test_duplicate_entry_widens_once() {
    let mut session = ProtocolSession::new(&ProtocolConfig::default());
    session.dispatch(&ext_info("srv", 3)).unwrap();
    session.dispatch(&ext_entry("ExtEntityPositions", 1)).unwrap();
    session.dispatch(&ext_entry("ExtEntityPositions", 1)).unwrap();
    session.dispatch(&ext_entry("ExtEntityPositions", 2)).unwrap();

    assert_eq!(session.frame_size(Opcode::EntityTeleport.as_u8()), Some(16));
    assert_eq!(
        session.negotiation().version_of(Extension::ExtEntityPositions),
        Some(1)
    );
    assert_eq!(reply_count(&mut session), 1);
}

#[test]
fn test_block_definitions_not_announced_when_disabled() {
    let config = ProtocolConfig::default_with_overrides(|c| c.protocol.allow_custom_blocks = false);
    let mut session = ProtocolSession::new(&config);
    session.dispatch(&ext_info("srv", 1)).unwrap();
    session.dispatch(&ext_entry("BlockDefinitionsExt", 2)).unwrap();

    let frames = session.drain_outgoing();
    assert_eq!(frames.len(), 27);
    assert!(!frames
        .iter()
        .any(|frame| frame[1..].starts_with(b"BlockDefinitions")));
    // no DefineBlockExt handler to widen
    assert_eq!(session.frame_size(Opcode::DefineBlockExt.as_u8()), None);
}

#[test]
fn test_negotiated_event_carries_capabilities() {
    let mut session = ProtocolSession::new(&ProtocolConfig::default());
    session.dispatch(&ext_info("srv", 2)).unwrap();
    session.dispatch(&ext_entry("TwoWayPing", 1)).unwrap();
    session.dispatch(&ext_entry("PlayerClick", 1)).unwrap();

    let caps = session
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            ClientEvent::ExtensionsNegotiated(caps) => Some(caps),
            _ => None,
        })
        .expect("negotiated event");
    assert!(caps.two_way_ping && caps.player_click);

    session.drain_outgoing();
    session.send_ping(5);
    assert_eq!(session.drain_outgoing().len(), 1);
}

#[test]
fn test_ping_not_sent_without_negotiation() {
    let mut session = ProtocolSession::new(&ProtocolConfig::default());
    session.send_ping(5);
    assert!(session.drain_outgoing().is_empty());
}

// Property: any interleaving of N announced and M early entries replies exactly once
proptest! {
    #[test]
    fn prop_interleaving_replies_once(
        early in 0usize..6,
        announced in 0usize..10,
        info_at in 0usize..16,
    ) {
        let names = Extension::ALL;
        let total = early + announced;
        let info_at = info_at.min(total);

        let mut session = ProtocolSession::new(&ProtocolConfig::default());
        let mut replies = 0;
        for i in 0..=total {
            if i == info_at {
                session.dispatch(&ext_info("srv", total as i16)).unwrap();
                replies += reply_count(&mut session);
            }
            if i < total {
                session.dispatch(&ext_entry(names[i % names.len()].name(), 1)).unwrap();
                replies += reply_count(&mut session);
            }
        }

        prop_assert_eq!(replies, 1);
        prop_assert_eq!(session.negotiation().remaining(), 0);
        prop_assert!(session.negotiation().is_complete());
    }
}
