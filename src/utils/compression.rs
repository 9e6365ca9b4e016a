//! Incremental gzip unwrapping for the streamed map transfer.
//!
//! The map arrives as a gzip member split across arbitrary 1024-byte chunk boundaries.
//! [`GzipHeader`] consumes header bytes as they trickle in (including the optional
//! extra/name/comment/header-CRC fields selected by the flag byte), and [`StreamInflater`]
//! drives a raw DEFLATE decompressor over whatever payload follows, resuming across calls.

use crate::error::{constants, ProtocolError, Result};
use flate2::{Decompress, FlushDecompress, Status};

const GZIP_ID1: u8 = 0x1F;
const GZIP_ID2: u8 = 0x8B;
const GZIP_METHOD_DEFLATE: u8 = 8;

const FLAG_HCRC: u8 = 0x02;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_COMMENT: u8 = 0x10;

/// Size of the scratch buffer inflate output is staged through.
const INFLATE_SCRATCH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStep {
    Id1,
    Id2,
    Method,
    Flags,
    /// MTIME(4) + XFL(1) + OS(1)
    Fixed(u8),
    ExtraLen(u8),
    Extra(u16),
    Name,
    Comment,
    HeaderCrc(u8),
    Done,
}

/// Resumable parser for the gzip member header.
#[derive(Debug, Clone)]
pub struct GzipHeader {
    step: HeaderStep,
    flags: u8,
    extra_len: u16,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl GzipHeader {
    pub fn new() -> Self {
        Self {
            step: HeaderStep::Id1,
            flags: 0,
            extra_len: 0,
        }
    }

    /// A header that needs no parsing (raw DEFLATE streams).
    pub fn completed() -> Self {
        Self {
            step: HeaderStep::Done,
            flags: 0,
            extra_len: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.step == HeaderStep::Done
    }

    /// Consume header bytes from `data`. Returns how many bytes were used; anything
    /// after that belongs to the compressed body.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize> {
        let mut used = 0;
        while used < data.len() && self.step != HeaderStep::Done {
            let byte = data[used];
            used += 1;
            self.step = match self.step {
                HeaderStep::Id1 if byte == GZIP_ID1 => HeaderStep::Id2,
                HeaderStep::Id2 if byte == GZIP_ID2 => HeaderStep::Method,
                HeaderStep::Id1 | HeaderStep::Id2 => {
                    return Err(ProtocolError::InvalidGzipHeader(
                        constants::ERR_BAD_GZIP_MAGIC.into(),
                    ))
                }
                HeaderStep::Method if byte == GZIP_METHOD_DEFLATE => HeaderStep::Flags,
                HeaderStep::Method => {
                    return Err(ProtocolError::InvalidGzipHeader(
                        constants::ERR_BAD_GZIP_METHOD.into(),
                    ))
                }
                HeaderStep::Flags => {
                    self.flags = byte;
                    HeaderStep::Fixed(6)
                }
                HeaderStep::Fixed(1) => self.after_fixed(),
                HeaderStep::Fixed(n) => HeaderStep::Fixed(n - 1),
                HeaderStep::ExtraLen(0) => {
                    self.extra_len = u16::from(byte);
                    HeaderStep::ExtraLen(1)
                }
                HeaderStep::ExtraLen(_) => {
                    // little-endian
                    self.extra_len |= u16::from(byte) << 8;
                    match self.extra_len {
                        0 => self.after_extra(),
                        n => HeaderStep::Extra(n),
                    }
                }
                HeaderStep::Extra(1) => self.after_extra(),
                HeaderStep::Extra(n) => HeaderStep::Extra(n - 1),
                HeaderStep::Name if byte == 0 => self.after_name(),
                HeaderStep::Name => HeaderStep::Name,
                HeaderStep::Comment if byte == 0 => self.after_comment(),
                HeaderStep::Comment => HeaderStep::Comment,
                HeaderStep::HeaderCrc(0) => HeaderStep::HeaderCrc(1),
                HeaderStep::HeaderCrc(_) => HeaderStep::Done,
                HeaderStep::Done => HeaderStep::Done,
            };
        }
        Ok(used)
    }

    fn after_fixed(&self) -> HeaderStep {
        if self.flags & FLAG_EXTRA != 0 {
            HeaderStep::ExtraLen(0)
        } else {
            self.after_extra()
        }
    }

    fn after_extra(&self) -> HeaderStep {
        if self.flags & FLAG_NAME != 0 {
            HeaderStep::Name
        } else {
            self.after_name()
        }
    }

    fn after_name(&self) -> HeaderStep {
        if self.flags & FLAG_COMMENT != 0 {
            HeaderStep::Comment
        } else {
            self.after_comment()
        }
    }

    fn after_comment(&self) -> HeaderStep {
        if self.flags & FLAG_HCRC != 0 {
            HeaderStep::HeaderCrc(0)
        } else {
            HeaderStep::Done
        }
    }
}

/// Raw DEFLATE decompressor that can be fed one partial buffer at a time.
pub struct StreamInflater {
    inner: Decompress,
    finished: bool,
    scratch: Box<[u8; INFLATE_SCRATCH]>,
}

impl Default for StreamInflater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamInflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInflater")
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .field("finished", &self.finished)
            .finish()
    }
}

impl StreamInflater {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            finished: false,
            scratch: Box::new([0u8; INFLATE_SCRATCH]),
        }
    }

    /// True once the end-of-stream block has been seen. Trailing bytes (the gzip
    /// CRC32/ISIZE trailer) are ignored from then on.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn total_out(&self) -> u64 {
        self.inner.total_out()
    }

    /// Inflate all of `input`, handing every produced run of bytes to `sink`.
    /// Returns the number of decompressed bytes produced by this call.
    pub fn inflate<F>(&mut self, mut input: &[u8], mut sink: F) -> Result<usize>
    where
        F: FnMut(&[u8]),
    {
        let mut produced_total = 0;
        while !self.finished {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();

            let status = self
                .inner
                .decompress(input, &mut self.scratch[..], FlushDecompress::None)
                .map_err(|_| ProtocolError::DecompressionFailure)?;

            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = (self.inner.total_out() - before_out) as usize;
            input = &input[consumed..];

            if produced > 0 {
                sink(&self.scratch[..produced]);
                produced_total += produced;
            }

            if status == Status::StreamEnd {
                self.finished = true;
            } else if consumed == 0 && produced == 0 {
                // needs more input
                break;
            }
        }
        Ok(produced_total)
    }
}
