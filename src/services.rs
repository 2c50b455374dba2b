//! Interfaces to the collaborators the bot depends on, plus in-memory
//! implementations for tests and small deployments.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::bot::Notification;
use crate::error::ServiceError;

/// Supplies OAuth access tokens for (re)connecting.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ServiceError>;
}

/// Maps between user logins and numeric user ids. A channel's id is its
/// owner's user id.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn login_for_id(&self, user_id: u64) -> Result<Option<String>, ServiceError>;
    async fn id_for_login(&self, login: &str) -> Result<Option<u64>, ServiceError>;
}

/// A chat line kept for rebuilding chains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: Uuid,
    pub channel_id: u64,
    pub user_id: u64,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Persistent chat history and bot settings.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Texts of every stored message for the channel, oldest first.
    async fn channel_messages(&self, channel_id: u64) -> Result<Vec<String>, ServiceError>;

    async fn append(&self, message: StoredMessage) -> Result<(), ServiceError>;

    /// Returns whether a message was removed.
    async fn delete_message(&self, channel_id: u64, message_id: Uuid) -> Result<bool, ServiceError>;

    /// Remove every message of the channel containing `word`, ignoring case.
    /// Returns how many were removed.
    async fn purge_word(&self, channel_id: u64, word: &str) -> Result<usize, ServiceError>;

    /// Remove the user's messages from the channel and stop storing new
    /// ones. Returns how many were removed.
    async fn ignore_user(&self, channel_id: u64, user_id: u64) -> Result<usize, ServiceError>;

    async fn is_ignored(&self, channel_id: u64, user_id: u64) -> Result<bool, ServiceError>;

    /// Channels the bot should be in.
    async fn channel_ids(&self) -> Result<Vec<u64>, ServiceError>;

    async fn add_channel(&self, channel_id: u64) -> Result<(), ServiceError>;

    async fn remove_channel(&self, channel_id: u64) -> Result<(), ServiceError>;
}

/// Receives the intents the router derives from chat.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn publish(&self, notification: Notification) -> Result<(), ServiceError>;
}

/// A fixed token.
#[async_trait]
impl TokenProvider for String {
    async fn access_token(&self) -> Result<String, ServiceError> {
        Ok(self.clone())
    }
}

/// [`MessageStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    messages: HashMap<u64, Vec<StoredMessage>>,
    ignored: HashSet<(u64, u64)>,
    channels: HashSet<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages for the channel.
    pub fn len(&self, channel_id: u64) -> usize {
        self.inner
            .read()
            .messages
            .get(&channel_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn channel_messages(&self, channel_id: u64) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .inner
            .read()
            .messages
            .get(&channel_id)
            .map(|messages| messages.iter().map(|m| m.text.clone()).collect())
            .unwrap_or_default())
    }

    async fn append(&self, message: StoredMessage) -> Result<(), ServiceError> {
        self.inner
            .write()
            .messages
            .entry(message.channel_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: Uuid) -> Result<bool, ServiceError> {
        let mut inner = self.inner.write();
        let Some(messages) = inner.messages.get_mut(&channel_id) else {
            return Ok(false);
        };
        let before = messages.len();
        messages.retain(|m| m.id != message_id);
        Ok(messages.len() != before)
    }

    async fn purge_word(&self, channel_id: u64, word: &str) -> Result<usize, ServiceError> {
        let word = word.to_lowercase();
        let mut inner = self.inner.write();
        let Some(messages) = inner.messages.get_mut(&channel_id) else {
            return Ok(0);
        };
        let before = messages.len();
        messages.retain(|m| !m.text.to_lowercase().contains(&word));
        Ok(before - messages.len())
    }

    async fn ignore_user(&self, channel_id: u64, user_id: u64) -> Result<usize, ServiceError> {
        let mut inner = self.inner.write();
        inner.ignored.insert((channel_id, user_id));
        let Some(messages) = inner.messages.get_mut(&channel_id) else {
            return Ok(0);
        };
        let before = messages.len();
        messages.retain(|m| m.user_id != user_id);
        Ok(before - messages.len())
    }

    async fn is_ignored(&self, channel_id: u64, user_id: u64) -> Result<bool, ServiceError> {
        Ok(self.inner.read().ignored.contains(&(channel_id, user_id)))
    }

    async fn channel_ids(&self) -> Result<Vec<u64>, ServiceError> {
        let mut ids: Vec<u64> = self.inner.read().channels.iter().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn add_channel(&self, channel_id: u64) -> Result<(), ServiceError> {
        self.inner.write().channels.insert(channel_id);
        Ok(())
    }

    async fn remove_channel(&self, channel_id: u64) -> Result<(), ServiceError> {
        self.inner.write().channels.remove(&channel_id);
        Ok(())
    }
}

/// [`UserResolver`] over a fixed login/id table.
#[derive(Clone, Debug, Default)]
pub struct StaticUsers {
    by_id: HashMap<u64, String>,
}

impl StaticUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: u64, login: impl Into<String>) -> Self {
        self.by_id.insert(user_id, login.into().to_ascii_lowercase());
        self
    }
}

impl<S: Into<String>> FromIterator<(u64, S)> for StaticUsers {
    fn from_iter<I: IntoIterator<Item = (u64, S)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |users, (id, login)| users.with_user(id, login))
    }
}

#[async_trait]
impl UserResolver for StaticUsers {
    async fn login_for_id(&self, user_id: u64) -> Result<Option<String>, ServiceError> {
        Ok(self.by_id.get(&user_id).cloned())
    }

    async fn id_for_login(&self, login: &str) -> Result<Option<u64>, ServiceError> {
        Ok(self
            .by_id
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(login))
            .map(|(&id, _)| id))
    }
}
