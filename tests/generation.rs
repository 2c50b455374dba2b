//! The generation pipeline: chat events in, generated replies out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tmi_ebooks::error::ServiceError;
use tmi_ebooks::event::{Chat, Join};
use tmi_ebooks::generation::ReplySink;
use tmi_ebooks::services::{MemoryStore, MessageStore, StaticUsers, StoredMessage};
use tmi_ebooks::{
    BotCommand, ChainEngine, GenerationQueue, GenerationRequest, GenerationWorker, IntentHandler,
    Router,
};

const BOT_ID: u64 = 100;

type Reply = (String, String, Option<Uuid>);

struct ChannelSink(mpsc::UnboundedSender<Reply>);

#[async_trait]
impl ReplySink for ChannelSink {
    async fn send_reply(
        &self,
        channel: &str,
        text: String,
        reply_to: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        self.0.send((channel.to_string(), text, reply_to))?;
        Ok(())
    }
}

fn users() -> Arc<StaticUsers> {
    Arc::new(
        StaticUsers::new()
            .with_user(BOT_ID, "ebooks_bot")
            .with_user(1, "dallas")
            .with_user(2, "ronni")
            .with_user(3, "fred"),
    )
}

fn chat(text: &str) -> Chat {
    Chat {
        channel: "dallas".into(),
        room_id: 1,
        user_id: 2,
        username: "ronni".into(),
        display_name: Some("Ronni".into()),
        message_id: Uuid::new_v4(),
        text: text.into(),
        is_highlighted: false,
        is_moderator: false,
        is_broadcaster: false,
        is_me: false,
        bits: 0,
        sent_at: Some(Utc::now()),
    }
}

struct Pipeline {
    router: Router,
    engine: Arc<ChainEngine>,
    store: Arc<MemoryStore>,
    replies: mpsc::UnboundedReceiver<Reply>,
    commands: mpsc::UnboundedReceiver<BotCommand>,
    shutdown: CancellationToken,
    worker: tokio::task::JoinHandle<()>,
}

fn pipeline(fallback: Option<&str>) -> Pipeline {
    let users = users();
    let engine = Arc::new(ChainEngine::default());
    let store = Arc::new(MemoryStore::new());
    let (queue, requests) = GenerationQueue::new();
    let (commands_tx, commands) = mpsc::unbounded_channel();
    let (replies_tx, replies) = mpsc::unbounded_channel();

    let handler = Arc::new(IntentHandler::new(
        engine.clone(),
        store.clone(),
        queue,
        commands_tx,
    ));
    let router = Router::new("ebooks_bot", BOT_ID, users.clone(), handler);

    let shutdown = CancellationToken::new();
    let worker = GenerationWorker::new(engine.clone(), users, Arc::new(ChannelSink(replies_tx)))
        .with_fallback(fallback.map(str::to_owned));
    let worker = tokio::spawn(worker.run(requests, shutdown.clone()));

    Pipeline {
        router,
        engine,
        store,
        replies,
        commands,
        shutdown,
        worker,
    }
}

impl Pipeline {
    async fn stop(self) {
        self.shutdown.cancel();
        self.worker.await.unwrap();
    }
}

async fn seed(store: &MemoryStore, channel_id: u64, text: &str) {
    store
        .append(StoredMessage {
            id: Uuid::new_v4(),
            channel_id,
            user_id: 3,
            text: text.into(),
            received_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_generate_replies_from_learned_chat() {
    let mut p = pipeline(None);
    seed(&p.store, 1, "hello chat").await;

    p.router
        .route(
            Join {
                channel: "dallas".into(),
                username: "ebooks_bot".into(),
            }
            .into(),
        )
        .await
        .unwrap();
    assert_eq!(p.engine.message_count(1).await, Some(1));

    p.router.route(chat("good morning").into()).await.unwrap();
    assert_eq!(p.engine.message_count(1).await, Some(2));
    assert_eq!(p.store.len(1), 2);

    let request = chat("~generate");
    let request_id = request.message_id;
    p.router.route(request.into()).await.unwrap();

    let (channel, text, reply_to) = p.replies.recv().await.unwrap();
    assert_eq!(channel, "dallas");
    assert_eq!(reply_to, Some(request_id));
    assert!(
        text == "hello chat" || text == "good morning",
        "unexpected text {:?}",
        text
    );
    // The command itself is not learned.
    assert_eq!(p.engine.message_count(1).await, Some(2));

    p.stop().await;
}

#[tokio::test]
async fn test_empty_chain_sends_fallback() {
    let mut p = pipeline(Some("I haven't learned anything yet!"));
    p.engine
        .rebuild_from_corpus(1, Vec::<Vec<String>>::new())
        .await;

    p.router.route(chat("~generate").into()).await.unwrap();
    let (channel, text, _) = p.replies.recv().await.unwrap();
    assert_eq!(channel, "dallas");
    assert_eq!(text, "I haven't learned anything yet!");

    p.stop().await;
}

#[tokio::test]
async fn test_requests_are_served_in_order() {
    let users = users();
    let engine = Arc::new(ChainEngine::default());
    engine.rebuild_from_corpus(1, vec![vec!["one"]]).await;
    engine.rebuild_from_corpus(2, vec![vec!["two"]]).await;
    engine.rebuild_from_corpus(3, vec![vec!["three"]]).await;

    let (queue, requests) = GenerationQueue::new();
    for channel_id in [3, 1, 2, 1] {
        queue.enqueue(GenerationRequest::new(channel_id)).unwrap();
    }
    drop(queue);

    let (tx, mut rx) = mpsc::unbounded_channel();
    GenerationWorker::new(engine, users, Arc::new(ChannelSink(tx)))
        .run(requests, CancellationToken::new())
        .await;

    let mut sent = Vec::new();
    while let Ok((channel, text, _)) = rx.try_recv() {
        sent.push(format!("{}:{}", channel, text));
    }
    assert_eq!(sent, vec!["fred:three", "dallas:one", "ronni:two", "dallas:one"]);
}

#[tokio::test]
async fn test_nothing_sent_for_unknown_or_unlearned_channels() {
    let users = users();
    let engine = Arc::new(ChainEngine::default());
    engine
        .rebuild_from_corpus(1, Vec::<Vec<String>>::new())
        .await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = GenerationWorker::new(engine, users, Arc::new(ChannelSink(tx)));

    assert_eq!(worker.handle(GenerationRequest::new(1)).await.unwrap(), None);
    assert_eq!(worker.handle(GenerationRequest::new(2)).await.unwrap(), None);
    assert_eq!(worker.handle(GenerationRequest::new(999)).await.unwrap(), None);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_join_request_from_own_room() {
    let mut p = pipeline(None);

    let mut request = chat("~join");
    request.channel = "ebooks_bot".into();
    request.room_id = BOT_ID;
    p.router.route(request.into()).await.unwrap();

    assert_eq!(p.store.channel_ids().await.unwrap(), vec![2]);
    assert_eq!(
        p.commands.recv().await.unwrap(),
        BotCommand::Join {
            channel: "ronni".into()
        }
    );

    p.stop().await;
}
