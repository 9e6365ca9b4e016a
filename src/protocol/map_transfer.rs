//! # Map Transfer
//!
//! Reassembles the voxel volume streamed over level chunk packets.
//!
//! ## States
//! ```text
//! Idle → HeaderPending → SizePending → Accumulating → Finalized
//! ```
//! - **HeaderPending**: gzip header bytes are consumed as they arrive, any split allowed
//! - **SizePending**: the first four inflated bytes are the big-endian volume
//! - **Accumulating**: inflated bytes are appended until the volume is full
//! - **Finalized**: the level finalise packet handed the buffer out
//!
//! With fast map negotiated the init packet carries the volume and the chunks are a bare
//! DEFLATE stream, so the transfer starts directly in `Accumulating`.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::blocks::MapDimensions;
use crate::utils::compression::{GzipHeader, StreamInflater};
use crate::utils::metrics::global_metrics;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Payload bytes carried by one level chunk.
pub const CHUNK_PAYLOAD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    Idle,
    HeaderPending,
    SizePending,
    Accumulating,
    Finalized,
}

/// A completely received world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedMap {
    pub blocks: Vec<u8>,
    pub dimensions: MapDimensions,
}

impl LoadedMap {
    pub fn volume(&self) -> usize {
        self.blocks.len()
    }
}

/// Incremental map reassembly for one connection.
#[derive(Debug)]
pub struct MapTransfer {
    state: TransferState,
    header: GzipHeader,
    inflater: StreamInflater,
    size_prefix: [u8; 4],
    size_filled: usize,
    volume: Option<usize>,
    buffer: Vec<u8>,
    staging: Vec<u8>,
    max_volume: usize,
    started: Option<Instant>,
}

impl MapTransfer {
    pub fn new(max_volume: usize) -> Self {
        Self {
            state: TransferState::Idle,
            header: GzipHeader::new(),
            inflater: StreamInflater::new(),
            size_prefix: [0; 4],
            size_filled: 0,
            volume: None,
            buffer: Vec::new(),
            staging: Vec::new(),
            max_volume,
            started: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// A transfer has begun and not yet been finalised or aborted.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            TransferState::HeaderPending | TransferState::SizePending | TransferState::Accumulating
        )
    }

    /// Declared volume, once known.
    pub fn volume(&self) -> Option<usize> {
        self.volume
    }

    /// Bytes written into the destination buffer so far.
    pub fn write_offset(&self) -> usize {
        self.buffer.len()
    }

    /// Fraction of the volume received; 0.0 while the volume is unknown.
    pub fn progress(&self) -> f32 {
        match self.volume {
            None => 0.0,
            Some(0) => 1.0,
            Some(volume) => self.buffer.len() as f32 / volume as f32,
        }
    }

    /// Start a new transfer unless one is already in progress. Returns whether a new
    /// transfer was started.
    pub fn begin(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        self.reset_stream();
        self.state = TransferState::HeaderPending;
        self.started = Some(Instant::now());
        global_metrics().map_started();
        debug!("Map transfer started");
        true
    }

    /// Switch the current transfer to the fast map layout with a known volume.
    pub fn begin_fast(&mut self, volume: i32) -> Result<()> {
        if !self.is_active() {
            self.begin();
        }
        if self.volume.is_some() || self.inflater.total_out() > 0 {
            warn!(volume, "Fast map volume announced after map data, ignoring");
            return Ok(());
        }

        let volume = usize::try_from(volume)
            .map_err(|_| ProtocolError::MapTransfer(format!("Invalid map volume {volume}")))?;
        self.header = GzipHeader::completed();
        self.size_filled = self.size_prefix.len();
        self.allocate(volume)
    }

    /// Feed the used bytes of one chunk packet and return the progress afterwards.
    pub fn push_chunk(&mut self, data: &[u8]) -> Result<f32> {
        if !self.is_active() {
            return Err(ProtocolError::MapTransfer(
                "Map chunk received with no transfer in progress".to_string(),
            ));
        }

        let mut body = data;
        if self.state == TransferState::HeaderPending {
            let used = self.header.feed(body)?;
            body = &body[used..];
            if self.header.is_done() {
                self.state = TransferState::SizePending;
            }
        }

        if self.state != TransferState::HeaderPending && !body.is_empty() {
            let mut staged = std::mem::take(&mut self.staging);
            staged.clear();
            let produced = self
                .inflater
                .inflate(body, |bytes| staged.extend_from_slice(bytes))?;
            global_metrics().map_inflated(produced as u64);

            let absorbed = self.absorb(&staged);
            self.staging = staged;
            absorbed?;
        }

        Ok(self.progress())
    }

    fn absorb(&mut self, mut bytes: &[u8]) -> Result<()> {
        if self.state == TransferState::SizePending {
            let wanted = self.size_prefix.len() - self.size_filled;
            let take = wanted.min(bytes.len());
            self.size_prefix[self.size_filled..self.size_filled + take]
                .copy_from_slice(&bytes[..take]);
            self.size_filled += take;
            bytes = &bytes[take..];

            if self.size_filled == self.size_prefix.len() {
                let volume = u32::from_be_bytes(self.size_prefix) as usize;
                self.allocate(volume)?;
            }
        }

        if self.state == TransferState::Accumulating && !bytes.is_empty() {
            let volume = self.volume.unwrap_or(0);
            let room = volume - self.buffer.len();
            let take = room.min(bytes.len());
            self.buffer.extend_from_slice(&bytes[..take]);
            if bytes.len() > take {
                warn!(
                    discarded = bytes.len() - take,
                    volume, "Map stream longer than its declared volume"
                );
            }
        }
        Ok(())
    }

    fn allocate(&mut self, volume: usize) -> Result<()> {
        if volume > self.max_volume {
            warn!(volume, max = self.max_volume, "Map volume over the configured limit");
            return Err(ProtocolError::AllocationFailure(volume));
        }
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(volume)
            .map_err(|_| ProtocolError::AllocationFailure(volume))?;

        debug!(volume, "Map volume known, buffer allocated");
        self.buffer = buffer;
        self.volume = Some(volume);
        self.state = TransferState::Accumulating;
        Ok(())
    }

    /// Complete the transfer with the announced dimensions and hand the buffer out.
    ///
    /// The dimensions must multiply out to the declared volume. Any failure releases the
    /// partial buffer.
    pub fn finalise(&mut self, dimensions: MapDimensions) -> Result<LoadedMap> {
        if !self.is_active() {
            return Err(ProtocolError::MapTransfer(
                constants::ERR_FINALISE_WITHOUT_MAP.to_string(),
            ));
        }

        let volume = self.volume.unwrap_or(0);
        if dimensions.volume() != volume {
            self.abort();
            return Err(ProtocolError::MapVolumeMismatch {
                volume,
                width: dimensions.width,
                height: dimensions.height,
                length: dimensions.length,
            });
        }

        let mut blocks = std::mem::take(&mut self.buffer);
        if blocks.len() < volume {
            warn!(
                received = blocks.len(),
                volume, "Map stream ended early, padding with air"
            );
            blocks.resize(volume, 0);
        }

        let elapsed_ms = self
            .started
            .map(|started| started.elapsed().as_millis())
            .unwrap_or_default();
        info!(
            volume,
            width = dimensions.width,
            height = dimensions.height,
            length = dimensions.length,
            elapsed_ms,
            "Map loaded"
        );
        global_metrics().map_loaded();

        self.reset_stream();
        self.state = TransferState::Finalized;
        Ok(LoadedMap { blocks, dimensions })
    }

    /// Drop any partial transfer and return to `Idle`.
    pub fn abort(&mut self) {
        if self.is_active() {
            debug!(received = self.buffer.len(), "Map transfer aborted");
        }
        self.reset_stream();
        self.state = TransferState::Idle;
    }

    fn reset_stream(&mut self) {
        self.header = GzipHeader::new();
        self.inflater = StreamInflater::new();
        self.size_prefix = [0; 4];
        self.size_filled = 0;
        self.volume = None;
        self.buffer = Vec::new();
        self.staging = Vec::new();
        self.started = None;
    }
}
