#![deny(missing_docs)]
//! Telegram transport adapter for Reel Relay.

/// Telegram-specific bot/transport implementation.
pub mod bot;
/// Telegram transport configuration.
pub mod config;
/// Telegram runtime entrypoint.
pub mod runner;
/// HTTP boundary for webhook mode.
pub mod webhook;
