use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ChainError, ServiceError};
use crate::services::MessageStore;

use super::chain::{MarkovChain, DEFAULT_MAX_TOKENS};

/// One [`MarkovChain`] per channel id.
///
/// The map sits behind a fair [`tokio::sync::RwLock`]: generations share a
/// read lock, every mutation takes the write lock for its whole duration,
/// and a queued writer blocks readers that arrive after it.
#[derive(Debug)]
pub struct ChainEngine {
    chains: RwLock<HashMap<u64, MarkovChain>>,
    max_tokens: usize,
}

impl Default for ChainEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

impl ChainEngine {
    /// `max_tokens` bounds the length of each generated line.
    pub fn new(max_tokens: usize) -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            max_tokens,
        }
    }

    /// Learn `text` into the channel's chain.
    ///
    /// # Errors
    ///
    /// [`ChainError::NoSuchChannel`] if the channel has no chain; chains are
    /// only created by [`rebuild_from_corpus`](Self::rebuild_from_corpus).
    pub async fn add_message(&self, channel_id: u64, text: &str) -> Result<(), ChainError> {
        let mut chains = self.chains.write().await;
        let chain = chains
            .get_mut(&channel_id)
            .ok_or(ChainError::NoSuchChannel(channel_id))?;
        chain.add_message(text);
        Ok(())
    }

    /// Replace the channel's chain with one built from `messages`.
    ///
    /// The write lock is held for the whole fold, so concurrent writers for
    /// any channel wait until the new chain is in place.
    pub async fn rebuild_from_corpus<I, M, T>(&self, channel_id: u64, messages: I)
    where
        I: IntoIterator<Item = M>,
        M: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut chains = self.chains.write().await;
        let mut chain = MarkovChain::new();
        for tokens in messages {
            chain.add_tokens(tokens);
        }
        debug!(channel_id, messages = chain.message_count(), "chain rebuilt");
        chains.insert(channel_id, chain);
    }

    /// Drop the channel's chain.
    pub async fn remove_channel(&self, channel_id: u64) -> Result<(), ChainError> {
        self.chains
            .write()
            .await
            .remove(&channel_id)
            .map(drop)
            .ok_or(ChainError::NoSuchChannel(channel_id))
    }

    /// Generate a line for the channel. `None` when the channel has no chain
    /// or its chain has learned nothing yet.
    pub async fn generate(&self, channel_id: u64) -> Option<String> {
        let chains = self.chains.read().await;
        chains
            .get(&channel_id)?
            .generate_with(&mut rand::thread_rng(), self.max_tokens)
    }

    pub async fn contains(&self, channel_id: u64) -> bool {
        self.chains.read().await.contains_key(&channel_id)
    }

    /// Messages learned by the channel's chain, if it has one.
    pub async fn message_count(&self, channel_id: u64) -> Option<usize> {
        self.chains
            .read()
            .await
            .get(&channel_id)
            .map(MarkovChain::message_count)
    }

    /// Ids of every channel with a chain, sorted.
    pub async fn channel_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Rebuild each channel from its stored history.
    ///
    /// Stops at the first store failure; channels rebuilt before it keep
    /// their new chains.
    pub async fn load_channels(
        &self,
        store: &dyn MessageStore,
        channel_ids: &[u64],
    ) -> Result<(), ServiceError> {
        for &channel_id in channel_ids {
            info!(channel_id, "building chain");
            let started = Instant::now();
            let messages = store.channel_messages(channel_id).await?;
            let count = messages.len();
            self.rebuild_from_corpus(
                channel_id,
                messages.iter().map(|text| text.split_whitespace()),
            )
            .await;
            info!(
                channel_id,
                messages = count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "chain built"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_add_requires_chain() {
        let engine = ChainEngine::default();
        assert_eq!(
            engine.add_message(7, "hello").await,
            Err(ChainError::NoSuchChannel(7))
        );
        assert_eq!(engine.remove_channel(7).await, Err(ChainError::NoSuchChannel(7)));
    }

    #[tokio::test]
    async fn test_empty_rebuild_generates_nothing() {
        let engine = ChainEngine::default();
        engine
            .rebuild_from_corpus(1, Vec::<Vec<String>>::new())
            .await;
        assert!(engine.contains(1).await);
        assert_eq!(engine.message_count(1).await, Some(0));
        assert_eq!(engine.generate(1).await, None);
        assert_eq!(engine.generate(2).await, None);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_chain() {
        let engine = ChainEngine::default();
        engine.rebuild_from_corpus(1, vec![vec!["old", "words"]]).await;
        engine.add_message(1, "old words").await.unwrap();
        assert_eq!(engine.message_count(1).await, Some(2));

        engine.rebuild_from_corpus(1, vec![vec!["new", "words"]]).await;
        assert_eq!(engine.message_count(1).await, Some(1));
        assert_eq!(engine.generate(1).await.as_deref(), Some("new words"));
    }

    #[tokio::test]
    async fn test_remove_channel() {
        let engine = ChainEngine::default();
        engine.rebuild_from_corpus(3, vec![vec!["hi"]]).await;
        engine.rebuild_from_corpus(1, vec![vec!["yo"]]).await;
        assert_eq!(engine.channel_ids().await, vec![1, 3]);

        engine.remove_channel(3).await.unwrap();
        assert!(!engine.contains(3).await);
        assert_eq!(engine.channel_ids().await, vec![1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_add_waits_for_rebuild() {
        let engine = Arc::new(ChainEngine::default());
        engine.rebuild_from_corpus(1, vec![vec!["seed"]]).await;

        let corpus: Vec<Vec<String>> = (0..20_000)
            .map(|i| vec!["word".to_string(), i.to_string()])
            .collect();

        let rebuild = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.rebuild_from_corpus(1, corpus).await })
        };
        let add = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_message(1, "late arrival").await })
        };

        rebuild.await.unwrap();
        add.await.unwrap().unwrap();

        // Either order is fine, but never a mix of the two corpora.
        let count = engine.message_count(1).await.unwrap();
        assert!(count == 20_000 || count == 20_001, "count = {}", count);
    }

    #[tokio::test]
    async fn test_concurrent_generations() {
        let engine = Arc::new(ChainEngine::default());
        engine
            .rebuild_from_corpus(1, vec![vec!["just", "one", "line"]])
            .await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.generate(1).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("just one line"));
        }
    }
}
