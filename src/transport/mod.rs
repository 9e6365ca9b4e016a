//! # Transport
//!
//! Async TCP adapter: cuts frames with [`FrameCodec`](crate::core::codec::FrameCodec),
//! feeds them to a [`ProtocolSession`](crate::protocol::ProtocolSession), and writes the
//! frames the session queues.

pub mod connection;

pub use connection::Connection;
