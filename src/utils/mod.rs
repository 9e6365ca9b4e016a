//! # Utility Modules
//!
//! Supporting utilities for map decompression, logging, metrics, and timing.
//!
//! ## Components
//! - **Compression**: resumable gzip header parser and raw DEFLATE inflater
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: thread-safe observability counters
//! - **Timeout**: async timeout wrappers

pub mod compression;
pub mod logging;
pub mod metrics;
pub mod timeout;
