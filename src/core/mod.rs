//! # Core Protocol Components
//!
//! Low-level wire handling: primitive codecs, string fields, the opcode table, and
//! stream framing.
//!
//! ## Components
//! - **Wire**: big-endian integer reader/writer over a frame cursor
//! - **String**: fixed 64-byte string fields
//! - **Opcode**: packet ids and their base frame sizes
//! - **Codec**: Tokio codec cutting fixed-size frames from a byte stream
//!
//! ## Wire Format
//! ```text
//! [Opcode(1)] [Payload(frame_size - 1)]
//! ```
//! There is no length prefix. The frame size of every opcode is fixed for a given set of
//! negotiated extensions and is looked up in the live size table for each frame.

pub mod codec;
pub mod opcode;
pub mod string;
pub mod wire;
