// Core Gemini API functionality:
// - API client for Gemini
// - Request/response data structures
// - Chat session with bounded history
// - Configuration loading
// - Shared error types

pub mod client;
pub use client::*;

pub mod types;
pub use types::*;

pub mod chat;
pub use chat::ChatSession;

pub mod config;
pub use config::*;

pub mod errors;
pub use errors::*;
