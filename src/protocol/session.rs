//! # Protocol Session
//!
//! All per-connection protocol state in one owned object: the opcode registry, the
//! extension handshake, the map transfer, and the queues events and outgoing frames are
//! collected in.
//!
//! The session performs no I/O. Callers hand it complete frames through
//! [`ProtocolSession::dispatch`] and drain [`ClientEvent`]s and encoded frames afterwards.
//!
//! ## Example
//! ```rust
//! use classic_protocol::config::ProtocolConfig;
//! use classic_protocol::protocol::session::ProtocolSession;
//!
//! let mut session = ProtocolSession::new(&ProtocolConfig::default());
//! session.send_login();
//! assert_eq!(session.drain_outgoing().len(), 1);
//!
//! // a ping frame
//! session.dispatch(&[1]).expect("ping");
//! assert!(session.drain_events().is_empty());
//! ```

use crate::config::{ProtocolConfig, ProtocolSettings};
use crate::error::{ProtocolError, Result};
use crate::protocol::blocks::MapDimensions;
use crate::protocol::dispatcher::{self, DispatchContext, Dispatcher, FrameTable};
use crate::protocol::events::ClientEvent;
use crate::protocol::handshake::{Capabilities, ExtensionNegotiation};
use crate::protocol::location::SELF_ID;
use crate::protocol::map_transfer::{MapTransfer, TransferState};
use crate::protocol::writer::{self, ClickTarget, MouseButton};
use crate::protocol::{classic, cpe};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Result of [`ProtocolSession::dispatch_all`].
#[derive(Debug)]
pub struct DispatchBatch {
    /// Bytes of the frames dispatched before stopping
    pub consumed: usize,
    /// Error raised by the frame at `consumed`, if any
    pub error: Option<ProtocolError>,
}

impl DispatchBatch {
    /// Fold into a plain result, dropping the count on error.
    pub fn into_result(self) -> Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.consumed),
        }
    }
}

/// Fixed set of 256 entity ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdSet {
    bits: [u64; 4],
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u8) {
        self.bits[usize::from(id >> 6)] |= 1 << (id & 63);
    }

    pub fn remove(&mut self, id: u8) -> bool {
        let present = self.contains(id);
        self.bits[usize::from(id >> 6)] &= !(1 << (id & 63));
        present
    }

    pub fn contains(&self, id: u8) -> bool {
        self.bits[usize::from(id >> 6)] & (1 << (id & 63)) != 0
    }

    pub fn clear(&mut self) {
        self.bits = [0; 4];
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&id| self.contains(id))
    }
}

/// Tablist entries added from AddEntity for servers that announce ExtPlayerList but
/// never send ExtAddPlayerName.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TablistWorkaround {
    pub(crate) enabled: bool,
    pub(crate) added: IdSet,
}

impl Default for TablistWorkaround {
    fn default() -> Self {
        Self {
            enabled: true,
            added: IdSet::new(),
        }
    }
}

/// Identity the session logs in with.
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub(crate) username: String,
    pub(crate) verification_key: String,
    pub(crate) app_name: String,
}

/// One connection's protocol state machine.
pub struct ProtocolSession {
    pub(crate) dispatcher: Dispatcher<ProtocolSession>,
    pub(crate) settings: ProtocolSettings,
    pub(crate) identity: Identity,
    pub(crate) negotiation: ExtensionNegotiation,
    pub(crate) map: MapTransfer,
    pub(crate) world: Option<MapDimensions>,
    pub(crate) entities: IdSet,
    pub(crate) tablist: TablistWorkaround,
    pub(crate) texture_url: Option<String>,
    events: VecDeque<ClientEvent>,
    outgoing: VecDeque<Bytes>,
    disconnected: bool,
}

impl DispatchContext for ProtocolSession {
    fn dispatcher(&self) -> &Dispatcher<Self> {
        &self.dispatcher
    }
}

impl std::fmt::Debug for ProtocolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolSession")
            .field("username", &self.identity.username)
            .field("negotiation", &self.negotiation.phase())
            .field("map", &self.map.state())
            .field("world", &self.world)
            .field("pending_events", &self.events.len())
            .field("pending_outgoing", &self.outgoing.len())
            .field("disconnected", &self.disconnected)
            .finish()
    }
}

impl ProtocolSession {
    pub fn new(config: &ProtocolConfig) -> Self {
        let mut session = Self {
            dispatcher: Dispatcher::new().with_strict_framing(config.protocol.strict_framing),
            settings: config.protocol.clone(),
            identity: Identity {
                username: config.client.username.clone(),
                verification_key: config.client.verification_key.clone(),
                app_name: config.client.app_name.clone(),
            },
            negotiation: ExtensionNegotiation::new(),
            map: MapTransfer::new(config.protocol.max_map_volume),
            world: None,
            entities: IdSet::new(),
            tablist: TablistWorkaround::default(),
            texture_url: None,
            events: VecDeque::new(),
            outgoing: VecDeque::new(),
            disconnected: false,
        };
        session.register_handlers();
        session
    }

    fn register_handlers(&mut self) {
        classic::register(&mut self.dispatcher);
        if self.settings.use_cpe {
            cpe::register(&mut self.dispatcher);
            if self.settings.allow_custom_blocks {
                cpe::register_block_definitions(&mut self.dispatcher);
            }
        }
        self.entities.insert(SELF_ID);
    }

    /// Return to the freshly connected state. Frame sizes revert to their base values in
    /// the same shared table.
    pub fn reset(&mut self) {
        self.dispatcher.reset();
        self.negotiation = ExtensionNegotiation::new();
        self.map.abort();
        self.world = None;
        self.entities.clear();
        self.tablist = TablistWorkaround::default();
        self.texture_url = None;
        self.events.clear();
        self.outgoing.clear();
        self.disconnected = false;
        self.register_handlers();
    }

    /// Dispatch exactly one frame from the front of `frame` and return its size.
    ///
    /// A fatal error also queues the disconnect event and releases any partial map.
    pub fn dispatch(&mut self, frame: &[u8]) -> Result<usize> {
        let result = dispatcher::dispatch(self, frame);
        if let Err(ref e) = result {
            if e.is_fatal() {
                self.fail(e);
            }
        }
        result
    }

    /// Dispatch every complete frame buffered in `buf`.
    ///
    /// Stops at a trailing partial frame or at the first error. `consumed` always counts
    /// the frames already dispatched, so the caller can resume after them.
    pub fn dispatch_all(&mut self, buf: &[u8]) -> DispatchBatch {
        let mut consumed = 0;
        while consumed < buf.len() {
            match self.frame_size(buf[consumed]) {
                Some(size) if buf.len() - consumed < size => break,
                _ => {}
            }
            match self.dispatch(&buf[consumed..]) {
                Ok(size) => consumed += size,
                Err(e) => {
                    return DispatchBatch {
                        consumed,
                        error: Some(e),
                    }
                }
            }
        }
        DispatchBatch {
            consumed,
            error: None,
        }
    }

    /// Current frame size for an opcode.
    pub fn frame_size(&self, opcode: u8) -> Option<usize> {
        self.dispatcher.frame_size(opcode)
    }

    /// Live frame size table, for a transport that needs to cut frames.
    pub fn frame_table(&self) -> FrameTable {
        self.dispatcher.frame_table()
    }

    pub fn negotiation(&self) -> &ExtensionNegotiation {
        &self.negotiation
    }

    /// Capabilities decoders use. They take effect as soon as each entry arrives.
    pub fn capabilities(&self) -> &Capabilities {
        self.negotiation.capabilities()
    }

    /// Capabilities the writers use: none until the reply has gone out.
    pub fn outgoing_capabilities(&self) -> Capabilities {
        if self.negotiation.is_complete() {
            *self.negotiation.capabilities()
        } else {
            Capabilities::default()
        }
    }

    pub fn map_state(&self) -> TransferState {
        self.map.state()
    }

    pub fn map_progress(&self) -> f32 {
        self.map.progress()
    }

    pub fn world_dimensions(&self) -> Option<MapDimensions> {
        self.world
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    pub fn drain_outgoing(&mut self) -> Vec<Bytes> {
        self.outgoing.drain(..).collect()
    }

    pub(crate) fn emit(&mut self, event: ClientEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn queue(&mut self, frame: Bytes) {
        global_metrics().frame_sent(frame.len() as u64);
        self.outgoing.push_back(frame);
    }

    /// Tear down after a fatal error: release the partial map and queue a single
    /// disconnect event.
    pub fn fail(&mut self, error: &ProtocolError) {
        self.map.abort();
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        global_metrics().disconnect();
        warn!(error = %error, "Session failed");
        self.emit(ClientEvent::Disconnected {
            title: error.disconnect_title().to_string(),
            reason: error.disconnect_reason(),
        });
    }

    /// Release any in-progress map without signalling a disconnect.
    pub fn abort(&mut self) {
        self.map.abort();
    }

    pub fn send_login(&mut self) {
        let frame = writer::login(
            &self.identity.username,
            &self.identity.verification_key,
            self.settings.use_cpe,
        );
        self.queue(frame);
    }

    pub fn send_chat(&mut self, text: &str, partial: bool) {
        let frame = writer::chat(text, partial, &self.outgoing_capabilities());
        self.queue(frame);
    }

    pub fn send_position(&mut self, position: [f32; 3], head_yaw: f32, pitch: f32, held_block: u8) {
        let frame = writer::position(
            position,
            head_yaw,
            pitch,
            held_block,
            &self.outgoing_capabilities(),
        );
        self.queue(frame);
    }

    pub fn send_set_block(&mut self, x: i16, y: i16, z: i16, place: bool, block: u8) {
        self.queue(writer::set_block(x, y, z, place, block));
    }

    /// Report a click. Dropped unless the server negotiated PlayerClick.
    pub fn send_player_click(
        &mut self,
        button: MouseButton,
        pressed: bool,
        head_yaw: f32,
        pitch: f32,
        target: &ClickTarget,
    ) {
        if !self.outgoing_capabilities().player_click {
            debug!("Player click not negotiated, not sending");
            return;
        }
        self.queue(writer::player_click(button, pressed, head_yaw, pitch, target));
    }

    /// Start a client-initiated ping. Dropped unless the server negotiated TwoWayPing.
    pub fn send_ping(&mut self, data: u16) {
        if !self.outgoing_capabilities().two_way_ping {
            debug!("Two-way ping not negotiated, not sending");
            return;
        }
        self.queue(writer::two_way_ping(false, data));
    }

    pub(crate) fn send_extension_reply(&mut self) {
        let frames = self
            .negotiation
            .reply_frames(&self.identity.app_name, self.settings.allow_custom_blocks);
        debug!(frames = frames.len(), "Sending extension reply");
        for frame in frames {
            self.queue(frame);
        }
        let caps = *self.negotiation.capabilities();
        self.emit(ClientEvent::ExtensionsNegotiated(caps));
    }
}
