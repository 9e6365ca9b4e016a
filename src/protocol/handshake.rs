//! # Extension Negotiation
//!
//! Counted announce/entry handshake for the CPE extension layer.
//!
//! ## Flow
//! ```text
//! Server                         Client
//!   |---- ExtInfo(app, N) ---------->|  remaining += N
//!   |---- ExtEntry(name, ver) x N -->|  remaining -= 1, widen frame sizes
//!   |<--- ExtInfo + ExtEntry x M ----|  once remaining == 0
//! ```
//!
//! The counter is additive: some servers send entries before their ExtInfo, or announce a
//! second batch late. It may go negative in between; the reply is sent the first time it
//! lands on exactly zero after an ExtInfo, and never again.
//!
//! Widening an opcode's frame size happens at most once per extension. A duplicate entry
//! still drains the counter but changes nothing else.

use crate::core::opcode::Opcode;
use crate::protocol::dispatcher::FrameTable;
use crate::protocol::writer;
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, info};

/// App name prefix of servers needing the D3 compatibility behaviour.
const D3_SERVER_PREFIX: &str = "D3 server";

/// Every extension this client recognises and announces, in reply order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Extension {
    ClickDistance,
    CustomBlocks,
    HeldBlock,
    EmoteFix,
    TextHotKey,
    ExtPlayerList,
    EnvColors,
    SelectionCuboid,
    BlockPermissions,
    ChangeModel,
    EnvMapAppearance,
    EnvWeatherType,
    MessageTypes,
    HackControl,
    PlayerClick,
    FullCP437,
    LongerMessages,
    BlockDefinitions,
    BlockDefinitionsExt,
    BulkBlockUpdate,
    TextColors,
    EnvMapAspect,
    EntityProperty,
    ExtEntityPositions,
    TwoWayPing,
    InventoryOrder,
    InstantMOTD,
    FastMap,
}

impl Extension {
    pub const ALL: [Extension; 28] = [
        Extension::ClickDistance,
        Extension::CustomBlocks,
        Extension::HeldBlock,
        Extension::EmoteFix,
        Extension::TextHotKey,
        Extension::ExtPlayerList,
        Extension::EnvColors,
        Extension::SelectionCuboid,
        Extension::BlockPermissions,
        Extension::ChangeModel,
        Extension::EnvMapAppearance,
        Extension::EnvWeatherType,
        Extension::MessageTypes,
        Extension::HackControl,
        Extension::PlayerClick,
        Extension::FullCP437,
        Extension::LongerMessages,
        Extension::BlockDefinitions,
        Extension::BlockDefinitionsExt,
        Extension::BulkBlockUpdate,
        Extension::TextColors,
        Extension::EnvMapAspect,
        Extension::EntityProperty,
        Extension::ExtEntityPositions,
        Extension::TwoWayPing,
        Extension::InventoryOrder,
        Extension::InstantMOTD,
        Extension::FastMap,
    ];

    /// Name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Extension::ClickDistance => "ClickDistance",
            Extension::CustomBlocks => "CustomBlocks",
            Extension::HeldBlock => "HeldBlock",
            Extension::EmoteFix => "EmoteFix",
            Extension::TextHotKey => "TextHotKey",
            Extension::ExtPlayerList => "ExtPlayerList",
            Extension::EnvColors => "EnvColors",
            Extension::SelectionCuboid => "SelectionCuboid",
            Extension::BlockPermissions => "BlockPermissions",
            Extension::ChangeModel => "ChangeModel",
            Extension::EnvMapAppearance => "EnvMapAppearance",
            Extension::EnvWeatherType => "EnvWeatherType",
            Extension::MessageTypes => "MessageTypes",
            Extension::HackControl => "HackControl",
            Extension::PlayerClick => "PlayerClick",
            Extension::FullCP437 => "FullCP437",
            Extension::LongerMessages => "LongerMessages",
            Extension::BlockDefinitions => "BlockDefinitions",
            Extension::BlockDefinitionsExt => "BlockDefinitionsExt",
            Extension::BulkBlockUpdate => "BulkBlockUpdate",
            Extension::TextColors => "TextColors",
            Extension::EnvMapAspect => "EnvMapAspect",
            Extension::EntityProperty => "EntityProperty",
            Extension::ExtEntityPositions => "ExtEntityPositions",
            Extension::TwoWayPing => "TwoWayPing",
            Extension::InventoryOrder => "InventoryOrder",
            Extension::InstantMOTD => "InstantMOTD",
            Extension::FastMap => "FastMap",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ext| ext.name() == name)
    }

    /// Frame size growth this extension applies at `version`.
    pub fn widening(self, version: i32) -> &'static [(Opcode, u16)] {
        match self {
            Extension::ExtEntityPositions => &[
                (Opcode::EntityTeleport, 6),
                (Opcode::AddEntity, 6),
                (Opcode::ExtAddEntity2, 6),
            ],
            Extension::FastMap => &[(Opcode::LevelInit, 4)],
            Extension::EnvMapAppearance if version != 1 => &[(Opcode::EnvSetMapAppearance, 4)],
            Extension::BlockDefinitionsExt if version != 1 => &[(Opcode::DefineBlockExt, 3)],
            _ => &[],
        }
    }

    fn is_block_definition(self) -> bool {
        matches!(
            self,
            Extension::BlockDefinitions | Extension::BlockDefinitionsExt
        )
    }
}

/// Negotiated capabilities that change how packets are decoded or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub held_block: bool,
    pub message_types: bool,
    pub ext_player_list: bool,
    pub block_permissions: bool,
    pub player_click: bool,
    pub longer_messages: bool,
    pub full_cp437: bool,
    pub ext_entity_positions: bool,
    pub two_way_ping: bool,
    pub fast_map: bool,
    /// Set by the server's custom block support level packet
    pub custom_blocks: bool,
    /// Server app name starts with "D3 server"
    pub needs_d3_fix: bool,
    pub env_map_version: Option<i32>,
    pub block_defs_ext_version: Option<i32>,
}

impl Capabilities {
    /// Map appearance frames carry cloud height and view distance.
    pub fn env_map_v2(&self) -> bool {
        matches!(self.env_map_version, Some(version) if version != 1)
    }

    /// Extended block definitions carry four side textures.
    pub fn per_face_block_sides(&self) -> bool {
        matches!(self.block_defs_ext_version, Some(version) if version >= 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationPhase {
    AwaitingExtInfo,
    CountingEntries,
    Negotiated,
}

/// What the handshake needs the caller to do after an ExtInfo or ExtEntry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    Pending,
    /// Counter reached zero for the first time: send the reply now.
    SendReply,
}

/// Per-connection negotiation state.
#[derive(Debug, Clone, Default)]
pub struct ExtensionNegotiation {
    remaining: i32,
    info_received: bool,
    reply_sent: bool,
    negotiated: HashMap<Extension, i32>,
    capabilities: Capabilities,
    server_software: Option<String>,
}

impl ExtensionNegotiation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> NegotiationPhase {
        if self.reply_sent {
            NegotiationPhase::Negotiated
        } else if self.info_received {
            NegotiationPhase::CountingEntries
        } else {
            NegotiationPhase::AwaitingExtInfo
        }
    }

    /// The client may use extended outgoing shapes.
    pub fn is_complete(&self) -> bool {
        self.reply_sent
    }

    /// Server extensions still expected.
    pub fn remaining(&self) -> i32 {
        self.remaining
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn capabilities_mut(&mut self) -> &mut Capabilities {
        &mut self.capabilities
    }

    pub fn server_software(&self) -> Option<&str> {
        self.server_software.as_deref()
    }

    /// Version the server announced for `extension`, if it did.
    pub fn version_of(&self, extension: Extension) -> Option<i32> {
        self.negotiated.get(&extension).copied()
    }

    pub fn negotiated_count(&self) -> usize {
        self.negotiated.len()
    }

    /// Record an ExtInfo announcement.
    pub fn on_ext_info(&mut self, app_name: &str, count: i16) -> NegotiationStep {
        self.info_received = true;
        self.remaining += i32::from(count);
        if app_name
            .get(..D3_SERVER_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(D3_SERVER_PREFIX))
        {
            self.capabilities.needs_d3_fix = true;
        }
        self.server_software = Some(app_name.to_string());
        info!(
            app = app_name,
            count,
            remaining = self.remaining,
            "Server announced extensions"
        );
        self.step()
    }

    /// Record one ExtEntry, widening `table` the first time a recognised extension is seen.
    pub fn on_ext_entry(&mut self, name: &str, version: i32, table: &FrameTable) -> NegotiationStep {
        self.remaining -= 1;
        if self.remaining < 0 {
            debug!(
                extension = name,
                remaining = self.remaining,
                "Extension entry arrived ahead of its announcement"
            );
        }

        match Extension::from_name(name) {
            None => debug!(extension = name, version, "Ignoring unknown extension"),
            Some(extension) if self.negotiated.contains_key(&extension) => {
                debug!(extension = name, version, "Duplicate extension entry ignored")
            }
            Some(extension) => {
                debug!(extension = name, version, "Extension negotiated");
                self.negotiated.insert(extension, version);
                self.enable(extension, version);
                for &(opcode, delta) in extension.widening(version) {
                    table.widen(opcode, delta);
                }
                global_metrics().extension_negotiated();
            }
        }
        self.step()
    }

    fn enable(&mut self, extension: Extension, version: i32) {
        let caps = &mut self.capabilities;
        match extension {
            Extension::HeldBlock => caps.held_block = true,
            Extension::MessageTypes => caps.message_types = true,
            Extension::ExtPlayerList => caps.ext_player_list = true,
            Extension::BlockPermissions => caps.block_permissions = true,
            Extension::PlayerClick => caps.player_click = true,
            Extension::LongerMessages => caps.longer_messages = true,
            Extension::FullCP437 => caps.full_cp437 = true,
            Extension::ExtEntityPositions => caps.ext_entity_positions = true,
            Extension::TwoWayPing => caps.two_way_ping = true,
            Extension::FastMap => caps.fast_map = true,
            Extension::EnvMapAppearance => caps.env_map_version = Some(version),
            Extension::BlockDefinitionsExt => caps.block_defs_ext_version = Some(version),
            _ => {}
        }
    }

    fn step(&mut self) -> NegotiationStep {
        if self.info_received && self.remaining == 0 && !self.reply_sent {
            self.reply_sent = true;
            NegotiationStep::SendReply
        } else {
            NegotiationStep::Pending
        }
    }

    /// Client reply: ExtInfo followed by one ExtEntry per supported extension.
    pub fn reply_frames(&self, app_name: &str, allow_custom_blocks: bool) -> Vec<Bytes> {
        let announced: Vec<(Extension, i32)> = Extension::ALL
            .iter()
            .copied()
            .filter(|ext| allow_custom_blocks || !ext.is_block_definition())
            .map(|ext| (ext, self.reply_version(ext)))
            .collect();

        let mut frames = Vec::with_capacity(announced.len() + 1);
        frames.push(writer::ext_info(app_name, announced.len() as u16));
        for (ext, version) in announced {
            frames.push(writer::ext_entry(ext.name(), version));
        }
        frames
    }

    fn reply_version(&self, extension: Extension) -> i32 {
        match extension {
            Extension::ExtPlayerList => 2,
            Extension::EnvMapAppearance => self.capabilities.env_map_version.unwrap_or(2),
            Extension::BlockDefinitionsExt => self.capabilities.block_defs_ext_version.unwrap_or(2),
            _ => 1,
        }
    }
}
