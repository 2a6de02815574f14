// ADS chat backend:
// - Configuration layering (file, environment, CLI)
// - Tool declarations and dispatch to the lookups
// - Two-turn chat coordination with optional prompt screening
// - Conversation store and the HTTP surface

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod guard;
pub mod http_server;
pub mod session;
