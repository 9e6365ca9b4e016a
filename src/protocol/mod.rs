//! # Protocol Layer
//!
//! Session state, the opcode registry, the CPE extension handshake, map transfer, and the
//! decoders that turn frames into [`ClientEvent`](events::ClientEvent)s.
//!
//! ## Components
//! - **Dispatcher**: opcode registry with a shared, widenable frame size table
//! - **Handshake**: counted ExtInfo/ExtEntry negotiation and the client reply
//! - **Map transfer**: streamed gzip map download into a preallocated buffer
//! - **Session**: per-connection state machine tying the above together
//! - **Writer**: outgoing packet encoders

pub mod blocks;
mod classic;
mod cpe;
pub mod dispatcher;
pub mod events;
pub mod handshake;
pub mod location;
pub mod map_transfer;
pub mod session;
pub mod writer;

#[cfg(test)]
mod tests;

pub use events::ClientEvent;
pub use handshake::{Capabilities, Extension, ExtensionNegotiation};
pub use session::{DispatchBatch, ProtocolSession};
