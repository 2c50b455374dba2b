//! Generation request queue and its single consumer.
//!
//! Requests are served one at a time, in the order they were queued, so
//! generation load on the [`ChainEngine`] is bounded no matter how many
//! channels ask at once.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::error::ServiceError;
use crate::markov::ChainEngine;
use crate::services::UserResolver;

/// A request for one generated line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub channel_id: u64,
    /// Chat message to thread the reply under.
    pub reply_to: Option<Uuid>,
}

impl GenerationRequest {
    pub fn new(channel_id: u64) -> Self {
        Self {
            channel_id,
            reply_to: None,
        }
    }

    pub fn reply(channel_id: u64, reply_to: Uuid) -> Self {
        Self {
            channel_id,
            reply_to: Some(reply_to),
        }
    }
}

/// Producer side of the queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct GenerationQueue {
    tx: mpsc::UnboundedSender<GenerationRequest>,
}

/// Consumer side of the queue, handed to a [`GenerationWorker`].
#[derive(Debug)]
pub struct GenerationRequests {
    rx: mpsc::UnboundedReceiver<GenerationRequest>,
}

impl GenerationQueue {
    pub fn new() -> (Self, GenerationRequests) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, GenerationRequests { rx })
    }

    /// Queue a request. Fails only if the consumer is gone.
    pub fn enqueue(
        &self,
        request: GenerationRequest,
    ) -> Result<(), mpsc::error::SendError<GenerationRequest>> {
        self.tx.send(request)
    }
}

impl GenerationRequests {
    pub async fn next(&mut self) -> Option<GenerationRequest> {
        self.rx.recv().await
    }
}

/// Where generated lines go.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(
        &self,
        channel: &str,
        text: String,
        reply_to: Option<Uuid>,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
impl ReplySink for Client {
    async fn send_reply(
        &self,
        channel: &str,
        text: String,
        reply_to: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        self.send_chat_message(channel, &text, reply_to).await?;
        Ok(())
    }
}

/// Serves generation requests.
pub struct GenerationWorker {
    engine: Arc<ChainEngine>,
    users: Arc<dyn UserResolver>,
    sink: Arc<dyn ReplySink>,
    fallback: Option<String>,
}

impl GenerationWorker {
    pub fn new(
        engine: Arc<ChainEngine>,
        users: Arc<dyn UserResolver>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            engine,
            users,
            sink,
            fallback: None,
        }
    }

    /// Text sent when a channel has nothing to generate from yet.
    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Serve requests until the queue closes or `shutdown` fires.
    pub async fn run(self, mut requests: GenerationRequests, shutdown: CancellationToken) {
        loop {
            let request = tokio::select! {
                _ = shutdown.cancelled() => break,
                request = requests.next() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            if let Err(e) = self.handle(request).await {
                warn!(channel_id = request.channel_id, error = %e, "generation request failed");
            }
        }
        debug!("generation worker stopped");
    }

    /// Serve one request. Returns the text sent, if any.
    pub async fn handle(&self, request: GenerationRequest) -> Result<Option<String>, ServiceError> {
        let Some(channel) = self.users.login_for_id(request.channel_id).await? else {
            warn!(channel_id = request.channel_id, "no login for channel");
            return Ok(None);
        };

        let text = match self.engine.generate(request.channel_id).await {
            Some(text) => text,
            None => match &self.fallback {
                Some(fallback) => fallback.clone(),
                None => {
                    debug!(%channel, "nothing to generate");
                    return Ok(None);
                }
            },
        };

        self.sink
            .send_reply(&channel, text.clone(), request.reply_to)
            .await?;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::services::StaticUsers;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(String, String, Option<Uuid>)>>);

    #[async_trait]
    impl ReplySink for Recorded {
        async fn send_reply(
            &self,
            channel: &str,
            text: String,
            reply_to: Option<Uuid>,
        ) -> Result<(), ServiceError> {
            self.0.lock().push((channel.to_string(), text, reply_to));
            Ok(())
        }
    }

    fn worker(engine: Arc<ChainEngine>, sink: Arc<Recorded>) -> GenerationWorker {
        let users = StaticUsers::new().with_user(1, "dallas");
        GenerationWorker::new(engine, Arc::new(users), sink)
    }

    #[tokio::test]
    async fn test_handle_sends_generated_reply() {
        let engine = Arc::new(ChainEngine::default());
        engine.rebuild_from_corpus(1, vec![vec!["hi", "chat"]]).await;
        let sink = Arc::new(Recorded::default());
        let parent = Uuid::new_v4();

        let sent = worker(engine, sink.clone())
            .handle(GenerationRequest::reply(1, parent))
            .await
            .unwrap();

        assert_eq!(sent.as_deref(), Some("hi chat"));
        assert_eq!(
            sink.0.lock().as_slice(),
            &[("dallas".to_string(), "hi chat".to_string(), Some(parent))]
        );
    }

    #[tokio::test]
    async fn test_handle_empty_chain_uses_fallback() {
        let engine = Arc::new(ChainEngine::default());
        engine
            .rebuild_from_corpus(1, Vec::<Vec<String>>::new())
            .await;
        let sink = Arc::new(Recorded::default());

        let silent = worker(engine.clone(), sink.clone());
        assert_eq!(silent.handle(GenerationRequest::new(1)).await.unwrap(), None);
        assert!(sink.0.lock().is_empty());

        let chatty = worker(engine, sink.clone()).with_fallback(Some("say stuff first".into()));
        assert_eq!(
            chatty.handle(GenerationRequest::new(1)).await.unwrap().as_deref(),
            Some("say stuff first")
        );
        assert_eq!(sink.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_unknown_channel_login() {
        let engine = Arc::new(ChainEngine::default());
        engine.rebuild_from_corpus(9, vec![vec!["hi"]]).await;
        let sink = Arc::new(Recorded::default());
        assert_eq!(
            worker(engine, sink.clone())
                .handle(GenerationRequest::new(9))
                .await
                .unwrap(),
            None
        );
        assert!(sink.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_serves_in_order_until_closed() {
        let engine = Arc::new(ChainEngine::default());
        engine.rebuild_from_corpus(1, vec![vec!["one"]]).await;
        let sink = Arc::new(Recorded::default());
        let (queue, requests) = GenerationQueue::new();

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        queue.enqueue(GenerationRequest::reply(1, first)).unwrap();
        queue.enqueue(GenerationRequest::reply(1, second)).unwrap();
        drop(queue);

        worker(engine, sink.clone())
            .run(requests, CancellationToken::new())
            .await;

        let replies: Vec<Option<Uuid>> = sink.0.lock().iter().map(|r| r.2).collect();
        assert_eq!(replies, vec![Some(first), Some(second)]);
    }
}
