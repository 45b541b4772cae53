/// Command and video message handlers
pub mod handlers;
/// Inline query answers
pub mod inline;
/// Owner error notifications
pub mod notify;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Reply texts
pub mod views;
