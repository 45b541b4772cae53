#![deny(missing_docs)]
//! Reel Relay core library.
//!
//! The single-video slot, its persistence backends, the owner guard and the
//! inline answer builder. Nothing in here knows about Telegram types.

/// Owner-only mutation guard.
pub mod access;
/// Configuration management.
pub mod config;
/// Inline query answers.
pub mod inline;
/// The single-slot video store.
pub mod slot;
/// Persistence backends (R2, REST KV, local file).
pub mod storage;
/// In-memory backend for tests.
pub mod testing;
/// Utility functions.
pub mod utils;
