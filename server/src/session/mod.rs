//! Conversation state for the HTTP surface
//!
//! Each conversation owns one `ChatSession`. Conversations are keyed by the
//! `session_id` a client sends and expire after a period of inactivity.

pub mod store;

pub use store::{spawn_cleanup, ConversationRef, ConversationStore, StoreError};

use ads_core::chat::ChatSession;
use chrono::{DateTime, Duration, Utc};

/// Id used when a request carries no `session_id`
pub const DEFAULT_CONVERSATION: &str = "default";
/// Requesting this id starts a fresh conversation under a generated id
pub const NEW_CONVERSATION: &str = "new";

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Last time a message was processed
    pub updated_at: DateTime<Utc>,
    pub chat: ChatSession,
}

impl Conversation {
    pub fn new(id: String, chat: ChatSession) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            chat,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        Utc::now() - self.updated_at > idle_timeout
    }
}
