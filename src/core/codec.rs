use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::FrameTable;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Cuts opcode-framed packets from a byte stream.
///
/// Frame sizes come from the shared [`FrameTable`] and are re-read for every frame, so a
/// widening applied while one frame is being dispatched takes effect for the next one.
/// An unregistered opcode is fatal here: without its size the codec cannot find where
/// the next frame starts.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    table: FrameTable,
}

impl FrameCodec {
    pub fn new(table: FrameTable) -> Self {
        Self { table }
    }

    pub fn frame_table(&self) -> &FrameTable {
        &self.table
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(&opcode) = src.first() else {
            return Ok(None);
        };

        let Some(size) = self.table.frame_size(opcode) else {
            warn!(opcode, "Cannot frame unknown opcode");
            return Err(ProtocolError::UnknownOpcode(opcode));
        };

        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(size).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
