//! # Classic Protocol
//!
//! Client-side protocol core for Classic voxel-world servers with the CPE (Classic
//! Protocol Extension) layer.
//!
//! The crate covers everything between raw socket bytes and game-level events:
//! fixed-size framing driven by a live opcode table, the extension handshake that widens
//! that table, streamed gzip map downloads, and semantic decoding of every server packet.
//! World, entity, chat, and UI state live in collaborators that consume
//! [`ClientEvent`]s.
//!
//! ## Layout
//! - [`core`]: wire primitives, fixed strings, opcodes, and the stream codec
//! - [`protocol`]: dispatcher, negotiation, map transfer, decoders, and the session
//! - [`transport`]: async TCP connection driving a session
//! - [`utils`]: decompression, logging, metrics, and timeouts
//!
//! ## Example
//! ```rust,no_run
//! use classic_protocol::{Connection, ProtocolConfig};
//!
//! # async fn run() -> classic_protocol::Result<()> {
//! let config = ProtocolConfig::from_file("client.toml")?;
//! let mut connection = Connection::connect(&config).await?;
//! connection
//!     .run(|event| println!("{event:?}"))
//!     .await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::ProtocolConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{ClientEvent, ProtocolSession};
pub use transport::Connection;
