//! # Packet Registry & Dispatcher
//!
//! Opcode → (frame size, handler) registry and the single-frame dispatch step.
//!
//! Framing is purely positional: there is no length prefix, so the only way to find the
//! next frame is the current size of this one. Sizes live in a shared [`FrameTable`] the
//! extension handshake widens at runtime.

use crate::core::opcode::Opcode;
use crate::core::wire::WireReader;
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::global_metrics;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Number of addressable opcodes.
const OPCODE_SPACE: usize = 256;

/// Handler invoked with a cursor scoped to one frame payload (opcode already consumed).
pub type PacketHandler<C> = fn(&mut C, &mut WireReader<'_>) -> Result<()>;

/// Shared opcode → frame size table.
///
/// Each opcode owns one mutable cell. Readers (the dispatcher and the transport codec)
/// re-fetch the cell for every frame; only the extension handshake writes to it.
/// A size of zero marks an unregistered opcode.
#[derive(Clone, Debug)]
pub struct FrameTable {
    cells: Arc<[AtomicU16; OPCODE_SPACE]>,
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTable {
    pub fn new() -> Self {
        Self {
            cells: Arc::new(std::array::from_fn(|_| AtomicU16::new(0))),
        }
    }

    /// Current frame size for `opcode`, or `None` when unregistered.
    #[inline]
    pub fn frame_size(&self, opcode: u8) -> Option<usize> {
        match self.cells[opcode as usize].load(Ordering::Acquire) {
            0 => None,
            size => Some(size as usize),
        }
    }

    fn set(&self, opcode: u8, size: u16) {
        self.cells[opcode as usize].store(size, Ordering::Release);
    }

    fn clear(&self) {
        for cell in self.cells.iter() {
            cell.store(0, Ordering::Release);
        }
    }

    /// Grow the frame size of a registered opcode. Unregistered opcodes stay unregistered.
    pub(crate) fn widen(&self, opcode: Opcode, delta: u16) {
        let cell = &self.cells[opcode.as_u8() as usize];
        let current = cell.load(Ordering::Acquire);
        if current == 0 {
            debug!(opcode = opcode.as_u8(), "Widening skipped for unregistered opcode");
            return;
        }
        cell.store(current.saturating_add(delta), Ordering::Release);
    }
}

/// Snapshot of one registered opcode, taken at dispatch time.
pub struct FrameSpec<C> {
    pub opcode: u8,
    pub frame_size: usize,
    pub handler: PacketHandler<C>,
}

impl<C> Clone for FrameSpec<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for FrameSpec<C> {}

/// Opcode registry with fixed-size framing.
pub struct Dispatcher<C> {
    sizes: FrameTable,
    handlers: [Option<PacketHandler<C>>; OPCODE_SPACE],
    strict_framing: bool,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            sizes: FrameTable::new(),
            handlers: [None; OPCODE_SPACE],
            strict_framing: false,
        }
    }

    /// Enable the consumed-vs-declared check after every handler.
    pub fn with_strict_framing(mut self, strict: bool) -> Self {
        self.strict_framing = strict;
        self
    }

    pub fn strict_framing(&self) -> bool {
        self.strict_framing
    }

    /// Register (or replace) the handler and base frame size for an opcode.
    pub fn register(&mut self, opcode: Opcode, frame_size: u16, handler: PacketHandler<C>) {
        self.sizes.set(opcode.as_u8(), frame_size);
        self.handlers[opcode.as_u8() as usize] = Some(handler);
    }

    /// Unregister every opcode. The size table is cleared in place so handles already
    /// given out keep observing it.
    pub fn reset(&mut self) {
        self.sizes.clear();
        self.handlers = [None; OPCODE_SPACE];
    }

    /// Handle on the live size table, for readers outside the dispatcher.
    pub fn frame_table(&self) -> FrameTable {
        self.sizes.clone()
    }

    pub fn frame_size(&self, opcode: u8) -> Option<usize> {
        self.sizes.frame_size(opcode)
    }

    pub fn lookup(&self, opcode: u8) -> Result<FrameSpec<C>> {
        match (self.sizes.frame_size(opcode), self.handlers[opcode as usize]) {
            (Some(frame_size), Some(handler)) => Ok(FrameSpec {
                opcode,
                frame_size,
                handler,
            }),
            _ => Err(ProtocolError::UnknownOpcode(opcode)),
        }
    }
}

/// Anything that owns a dispatcher over itself.
pub trait DispatchContext: Sized {
    fn dispatcher(&self) -> &Dispatcher<Self>;
}

/// Dispatch exactly one frame from the front of `buf`.
///
/// Reads the opcode byte, requires the opcode's current frame size to be buffered, then
/// runs the handler on a cursor scoped to that frame. Returns the number of bytes the
/// frame occupied; the next frame always starts at that fixed offset no matter how much
/// the handler actually read.
pub fn dispatch<C: DispatchContext>(ctx: &mut C, buf: &[u8]) -> Result<usize> {
    let Some(&opcode) = buf.first() else {
        return Err(ProtocolError::BufferUnderrun {
            needed: 1,
            remaining: 0,
        });
    };

    let entry = match ctx.dispatcher().lookup(opcode) {
        Ok(entry) => entry,
        Err(e) => {
            global_metrics().unknown_opcode();
            warn!(opcode, "Received unknown packet opcode");
            return Err(e);
        }
    };
    let strict = ctx.dispatcher().strict_framing();

    if buf.len() < entry.frame_size {
        return Err(ProtocolError::IncompleteFrame {
            opcode,
            expected: entry.frame_size,
            actual: buf.len(),
        });
    }

    trace!(opcode, size = entry.frame_size, "Dispatching frame");
    let payload = &buf[1..entry.frame_size];
    let mut reader = WireReader::new(payload);
    (entry.handler)(ctx, &mut reader)?;

    let consumed = reader.position();
    if consumed != payload.len() {
        global_metrics().framing_error();
        if strict {
            return Err(ProtocolError::FrameMismatch {
                opcode,
                declared: payload.len(),
                consumed,
            });
        }
        debug!(
            opcode,
            declared = payload.len(),
            consumed,
            "Handler did not consume its whole frame"
        );
    }

    global_metrics().frame_received(entry.frame_size as u64);
    Ok(entry.frame_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        dispatcher: Dispatcher<Recorder>,
        seen: Vec<(u8, u16)>,
    }

    impl DispatchContext for Recorder {
        fn dispatcher(&self) -> &Dispatcher<Self> {
            &self.dispatcher
        }
    }

    fn read_ping(ctx: &mut Recorder, _r: &mut WireReader<'_>) -> Result<()> {
        ctx.seen.push((Opcode::Ping.as_u8(), 0));
        Ok(())
    }

    fn read_short(ctx: &mut Recorder, r: &mut WireReader<'_>) -> Result<()> {
        let v = r.read_u16()?;
        ctx.seen.push((Opcode::RemoveEntity.as_u8(), v));
        Ok(())
    }

    fn recorder(strict: bool) -> Recorder {
        let mut rec = Recorder {
            dispatcher: Dispatcher::new().with_strict_framing(strict),
            seen: Vec::new(),
        };
        rec.dispatcher.register(Opcode::Ping, 1, read_ping);
        rec.dispatcher.register(Opcode::SetBlock, 3, read_short);
        rec.dispatcher.register(Opcode::RemoveEntity, 5, read_short);
        rec
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_dispatch_consumes_fixed_frames() {
        let mut rec = recorder(false);
        let stream = [1u8, 6, 0x12, 0x34, 1];
        let first = dispatch(&mut rec, &stream).unwrap();
        assert_eq!(first, 1);
        let second = dispatch(&mut rec, &stream[first..]).unwrap();
        assert_eq!(second, 3);
        let third = dispatch(&mut rec, &stream[first + second..]).unwrap();
        assert_eq!(third, 1);
        assert_eq!(rec.seen.len(), 3);
        assert_eq!(rec.seen[1], (Opcode::RemoveEntity.as_u8(), 0x1234));
    }

    #[test]
    fn test_unknown_opcode_is_reported() {
        let mut rec = recorder(false);
        let result = dispatch(&mut rec, &[200u8, 0, 0]);
        assert!(matches!(result, Err(ProtocolError::UnknownOpcode(200))));
        assert!(rec.seen.is_empty());
    }

    #[test]
    fn test_incomplete_frame_is_rejected() {
        let mut rec = recorder(false);
        let result = dispatch(&mut rec, &[6u8, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteFrame {
                opcode: 6,
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_under_consumption_tolerated_unless_strict() {
        // RemoveEntity declares 4 payload bytes but the handler reads 2
        let frame = [12u8, 0, 9, 0xAA, 0xBB];

        let mut lenient = recorder(false);
        assert_eq!(dispatch(&mut lenient, &frame).unwrap(), 5);

        let mut strict = recorder(true);
        let result = dispatch(&mut strict, &frame);
        assert!(matches!(
            result,
            Err(ProtocolError::FrameMismatch {
                opcode: 12,
                declared: 4,
                consumed: 2
            })
        ));
    }

    #[test]
    fn test_widen_changes_live_size() {
        let rec = recorder(false);
        let table = rec.dispatcher.frame_table();
        assert_eq!(table.frame_size(Opcode::SetBlock.as_u8()), Some(3));
        table.widen(Opcode::SetBlock, 6);
        assert_eq!(rec.dispatcher.frame_size(Opcode::SetBlock.as_u8()), Some(9));

        // unregistered opcodes are not brought into existence by widening
        table.widen(Opcode::LevelInit, 4);
        assert_eq!(table.frame_size(Opcode::LevelInit.as_u8()), None);
    }

    #[test]
    fn test_reset_keeps_shared_table() {
        let mut rec = recorder(false);
        let table = rec.dispatcher.frame_table();
        rec.dispatcher.reset();
        assert_eq!(table.frame_size(Opcode::Ping.as_u8()), None);

        rec.dispatcher.register(Opcode::Ping, 1, read_ping);
        assert_eq!(table.frame_size(Opcode::Ping.as_u8()), Some(1));
    }
}
