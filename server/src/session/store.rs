use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use ads_core::chat::ChatSession;
use chrono::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Conversation;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("conversation store lock poisoned: {0}")]
    Poisoned(String),

    #[error("too many active conversations (limit {0}), try again later")]
    Full(usize),
}

/// A conversation held behind its own lock so one client's turns run in order
pub type ConversationRef = Arc<Mutex<Conversation>>;

/// In-memory conversations, each seeded from a template chat session
#[derive(Debug)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, ConversationRef>>,
    template: ChatSession,
    idle_timeout: Duration,
    max_conversations: usize,
}

impl ConversationStore {
    pub fn new(template: ChatSession, idle_timeout: Duration, max_conversations: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            template,
            idle_timeout,
            max_conversations: max_conversations.max(1),
        }
    }

    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Fetch the conversation for `id`, creating it from the template if absent.
    ///
    /// A new conversation is refused with `StoreError::Full` once the store
    /// holds `max_conversations` and none of them has gone idle.
    pub fn get_or_create(&self, id: &str) -> Result<ConversationRef, StoreError> {
        if let Some(existing) = self.read()?.get(id) {
            return Ok(existing.clone());
        }

        let mut conversations = self.write()?;
        if let Some(existing) = conversations.get(id) {
            return Ok(existing.clone());
        }
        if conversations.len() >= self.max_conversations
            && self.drop_expired(&mut conversations) == 0
        {
            warn!(limit = self.max_conversations, "Conversation store is full");
            return Err(StoreError::Full(self.max_conversations));
        }

        debug!(id, "Created conversation");
        let conversation = Arc::new(Mutex::new(Conversation::new(
            id.to_string(),
            self.template.clone(),
        )));
        conversations.insert(id.to_string(), conversation.clone());
        Ok(conversation)
    }

    /// Drop idle conversations. Ones busy with a request are left alone.
    pub fn cleanup_expired(&self) -> Result<usize, StoreError> {
        let mut conversations = self.write()?;
        let count = self.drop_expired(&mut conversations);
        if count > 0 {
            info!(count, "Cleaned up idle conversations");
        }
        Ok(count)
    }

    fn drop_expired(&self, conversations: &mut HashMap<String, ConversationRef>) -> usize {
        let expired: Vec<String> = conversations
            .iter()
            .filter(|(_, conversation)| match conversation.try_lock() {
                Ok(guard) => guard.is_expired(self.idle_timeout),
                Err(_) => false,
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            conversations.remove(id);
            debug!(id = %id, "Dropped idle conversation");
        }
        expired.len()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, ConversationRef>>, StoreError> {
        self.conversations
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, ConversationRef>>, StoreError> {
        self.conversations
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

/// Periodically drop idle conversations for the life of the process
pub fn spawn_cleanup(store: Arc<ConversationStore>, period: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match store.cleanup_expired().and_then(|_| store.len()) {
                Ok(active) => debug!(active, "Conversation sweep finished"),
                Err(e) => warn!(error = %e, "Conversation cleanup failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store() -> ConversationStore {
        ConversationStore::new(ChatSession::new().with_max_turns(3), Duration::seconds(60), 2)
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_conversation() {
        let store = store();
        let first = store.get_or_create("abc").unwrap();
        let second = store.get_or_create("abc").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(first.lock().await.id, "abc");
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = store();
        let a = store.get_or_create("a").unwrap();
        let b = store.get_or_create("b").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(ConversationStore::new_id(), ConversationStore::new_id());
    }

    #[tokio::test]
    async fn test_full_store_refuses_new_ids() {
        let store = store();
        store.get_or_create("a").unwrap();
        store.get_or_create("b").unwrap();

        assert!(matches!(store.get_or_create("c"), Err(StoreError::Full(2))));
        assert!(store.get_or_create("a").is_ok());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_full_store_reclaims_idle_conversation() {
        let store = store();
        let stale = store.get_or_create("a").unwrap();
        store.get_or_create("b").unwrap();
        stale.lock().await.updated_at = Utc::now() - Duration::seconds(120);

        assert!(store.get_or_create("c").is_ok());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_drops_only_idle_conversations() {
        let store = store();
        let stale = store.get_or_create("stale").unwrap();
        store.get_or_create("fresh").unwrap();
        stale.lock().await.updated_at = Utc::now() - Duration::seconds(120);

        assert_eq!(store.cleanup_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);

        let recreated = store.get_or_create("stale").unwrap();
        assert!(!Arc::ptr_eq(&stale, &recreated));
    }

    #[tokio::test]
    async fn test_cleanup_skips_busy_conversation() {
        let store = store();
        let busy = store.get_or_create("busy").unwrap();
        let mut guard = busy.lock().await;
        guard.updated_at = Utc::now() - Duration::seconds(120);

        assert_eq!(store.cleanup_expired().unwrap(), 0);
        drop(guard);
        assert_eq!(store.cleanup_expired().unwrap(), 1);
    }
}
