//! An ebooks bot: learns each channel's chat and talks back on `~generate`.
//!
//! Usage: `TMI_OAUTH_TOKEN=... cargo run --example ebooks_bot -- [config.toml]`
//!
//! Chat history is kept in memory only, so every channel starts from an
//! empty chain.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tmi_ebooks::services::{MemoryStore, MessageStore, StaticUsers, UserResolver};
use tmi_ebooks::{
    BotConfig, ChainEngine, Client, GenerationQueue, GenerationWorker, IntentHandler, Router,
    WebSocketConnector,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/ebooks_bot.toml".to_string());
    let config = BotConfig::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    let token = std::env::var("TMI_OAUTH_TOKEN").context("TMI_OAUTH_TOKEN is not set")?;

    let username = config.connection.username.to_ascii_lowercase();
    let users = Arc::new(
        config
            .users
            .iter()
            .map(|(login, &id)| (id, login.clone()))
            .collect::<StaticUsers>(),
    );
    let bot_id = users
        .id_for_login(&username)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| anyhow!("[users] has no id for the bot account {:?}", username))?;

    // The bot's own room takes ~join and ~leave requests.
    let store = Arc::new(MemoryStore::new());
    store.add_channel(bot_id).await.map_err(|e| anyhow!(e))?;
    for login in &config.bot.channels {
        match users.id_for_login(login).await.map_err(|e| anyhow!(e))? {
            Some(id) => store.add_channel(id).await.map_err(|e| anyhow!(e))?,
            None => warn!(channel = %login, "no id configured for channel, skipping"),
        }
    }

    let engine = Arc::new(ChainEngine::new(config.generation.max_tokens));
    let (queue, requests) = GenerationQueue::new();
    let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(IntentHandler::new(
        engine.clone(),
        store.clone(),
        queue,
        commands_tx,
    ));
    let router = Router::new(username.clone(), bot_id, users.clone(), handler)
        .with_prefix(config.bot.command_prefix.clone());

    let client = Arc::new(
        Client::builder(WebSocketConnector)
            .options(config.client_options())
            .build(),
    );
    client
        .connect(&username, &token, &config.connection.endpoint)
        .await?;
    info!(%username, "Connected");

    for channel_id in store.channel_ids().await.map_err(|e| anyhow!(e))? {
        if let Some(login) = users.login_for_id(channel_id).await.map_err(|e| anyhow!(e))? {
            client.join_channel(&login)?;
        }
    }

    let shutdown = CancellationToken::new();
    let worker = GenerationWorker::new(engine, users, client.clone())
        .with_fallback(config.generation.fallback_message.clone());
    let worker = tokio::spawn(worker.run(requests, shutdown.clone()));

    let executor = {
        let client = client.clone();
        tokio::spawn(async move {
            while let Some(command) = commands_rx.recv().await {
                if let Err(e) = client.execute(command).await {
                    warn!(error = %e, "Failed to execute bot command");
                }
            }
        })
    };

    tokio::select! {
        _ = router.run(&client) => info!("Client stopped"),
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    shutdown.cancel();
    executor.abort();
    client.shutdown().await;
    worker.await?;
    Ok(())
}
