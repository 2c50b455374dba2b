//! Chat commands and intents.
//!
//! The [`Router`] turns client events into [`Notification`]s on a
//! [`NotificationBus`]. [`IntentHandler`] is the bus implementation that
//! keeps the store and the chains up to date and asks the client to act
//! through [`BotCommand`]s.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::config::DEFAULT_COMMAND_PREFIX;
use crate::error::ServiceError;
use crate::event::{Chat, Event};
use crate::generation::{GenerationQueue, GenerationRequest};
use crate::markov::ChainEngine;
use crate::services::{MessageStore, NotificationBus, StoredMessage, UserResolver};

/// Something the client should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Send {
        channel: String,
        text: String,
        reply_to: Option<Uuid>,
    },
    Join {
        channel: String,
    },
    Leave {
        channel: String,
    },
}

impl BotCommand {
    pub fn send(channel: impl Into<String>, text: impl Into<String>) -> Self {
        BotCommand::Send {
            channel: channel.into(),
            text: text.into(),
            reply_to: None,
        }
    }
}

/// A high-level intent derived from chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// An ordinary chat line to learn from.
    MessageReceived {
        channel_id: u64,
        message_id: Uuid,
        user_id: u64,
        text: String,
    },
    GenerationRequested {
        channel_id: u64,
        reply_to: Option<Uuid>,
    },
    /// The server confirmed the bot joined.
    ChannelJoined { channel_id: u64, channel: String },
    /// The server confirmed the bot left.
    ChannelLeft { channel_id: u64, channel: String },
    /// A user asked the bot to join their channel.
    JoinRequested { channel_id: u64, channel: String },
    /// The bot was asked to leave a channel.
    LeaveRequested { channel_id: u64, channel: String },
    PurgeWord {
        channel_id: u64,
        channel: String,
        word: String,
    },
    IgnoreUser {
        channel_id: u64,
        channel: String,
        user_id: u64,
    },
    /// A moderator deleted a chat message.
    MessageDeleted { channel_id: u64, message_id: Uuid },
    GiftReceived {
        channel_id: u64,
        channel: String,
        sender: String,
    },
    /// Reply to a user directly.
    SendRequested {
        channel: String,
        text: String,
        reply_to: Option<Uuid>,
    },
}

/// Routes client events to the bus.
pub struct Router {
    bot_login: String,
    bot_id: u64,
    prefix: String,
    users: Arc<dyn UserResolver>,
    bus: Arc<dyn NotificationBus>,
}

impl Router {
    pub fn new(
        bot_login: impl Into<String>,
        bot_id: u64,
        users: Arc<dyn UserResolver>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            bot_login: bot_login.into(),
            bot_id,
            prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            users,
            bus,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Route events until the client shuts down.
    pub async fn run(&self, client: &Client) {
        while let Some(event) = client.next_event().await {
            if let Err(e) = self.route(event).await {
                warn!(error = %e, "failed to route event");
            }
        }
        debug!("router stopped");
    }

    /// Publish whatever intents `event` implies.
    pub async fn route(&self, event: Event) -> Result<(), ServiceError> {
        match event {
            Event::Chat(chat) => self.route_chat(chat).await,
            Event::Join(join) if self.is_bot(&join.username) => {
                let Some(channel_id) = self.users.id_for_login(&join.channel).await? else {
                    warn!(channel = %join.channel, "joined channel with unknown id");
                    return Ok(());
                };
                self.bus
                    .publish(Notification::ChannelJoined {
                        channel_id,
                        channel: join.channel,
                    })
                    .await
            }
            Event::Part(part) if self.is_bot(&part.username) => {
                let Some(channel_id) = self.users.id_for_login(&part.channel).await? else {
                    warn!(channel = %part.channel, "left channel with unknown id");
                    return Ok(());
                };
                self.bus
                    .publish(Notification::ChannelLeft {
                        channel_id,
                        channel: part.channel,
                    })
                    .await
            }
            Event::ClearMsg(cleared) => {
                let Some(channel_id) = self.users.id_for_login(&cleared.channel).await? else {
                    return Ok(());
                };
                self.bus
                    .publish(Notification::MessageDeleted {
                        channel_id,
                        message_id: cleared.target_message_id,
                    })
                    .await
            }
            Event::GiftSub(gift) => {
                self.bus
                    .publish(Notification::GiftReceived {
                        channel_id: gift.room_id,
                        channel: gift.channel,
                        sender: gift.sender_display_name,
                    })
                    .await
            }
            _ => Ok(()),
        }
    }

    fn is_bot(&self, login: &str) -> bool {
        login.eq_ignore_ascii_case(&self.bot_login)
    }

    async fn route_chat(&self, chat: Chat) -> Result<(), ServiceError> {
        if self.is_bot(&chat.username) {
            return Ok(());
        }

        let mut words = chat.text.split_whitespace();
        let command = words
            .next()
            .and_then(|first| first.strip_prefix(self.prefix.as_str()))
            .filter(|_| !self.prefix.is_empty())
            .map(str::to_owned);
        let argument = words.next().map(str::to_owned);

        if chat.room_id == self.bot_id {
            // Commands in the bot's own room act on the sender's channel.
            let notification = match command.as_deref() {
                Some("join") => Notification::JoinRequested {
                    channel_id: chat.user_id,
                    channel: chat.username,
                },
                Some("leave") => Notification::LeaveRequested {
                    channel_id: chat.user_id,
                    channel: chat.username,
                },
                _ => return Ok(()),
            };
            return self.bus.publish(notification).await;
        }

        let privileged = chat.is_broadcaster || chat.is_moderator;
        let notification = match command.as_deref() {
            Some("generate") => Notification::GenerationRequested {
                channel_id: chat.room_id,
                reply_to: Some(chat.message_id),
            },
            Some("leave") if chat.is_broadcaster => Notification::LeaveRequested {
                channel_id: chat.room_id,
                channel: chat.channel,
            },
            Some("purge") if privileged => match argument {
                Some(word) => Notification::PurgeWord {
                    channel_id: chat.room_id,
                    channel: chat.channel,
                    word,
                },
                None => Notification::SendRequested {
                    channel: chat.channel,
                    text: format!("@{} You have to include a word to purge!", chat.username),
                    reply_to: Some(chat.message_id),
                },
            },
            Some("ignore") if privileged => {
                let login = argument.as_deref().map(|name| name.trim_start_matches('@'));
                let user_id = match login {
                    Some(login) => self.users.id_for_login(login).await?,
                    None => None,
                };
                match (login, user_id) {
                    (_, Some(user_id)) => Notification::IgnoreUser {
                        channel_id: chat.room_id,
                        channel: chat.channel,
                        user_id,
                    },
                    (Some(login), None) => Notification::SendRequested {
                        channel: chat.channel,
                        text: format!(
                            "@{} Couldn't find a user by the name of \"{}\", sorry!",
                            chat.username, login
                        ),
                        reply_to: Some(chat.message_id),
                    },
                    (None, None) => Notification::SendRequested {
                        channel: chat.channel,
                        text: format!("@{} You have to include a username to ignore!", chat.username),
                        reply_to: Some(chat.message_id),
                    },
                }
            }
            _ => Notification::MessageReceived {
                channel_id: chat.room_id,
                message_id: chat.message_id,
                user_id: chat.user_id,
                text: chat.text,
            },
        };
        self.bus.publish(notification).await
    }
}

/// Applies intents: learns chat, queues generations, keeps chains in step
/// with joins and leaves, and issues [`BotCommand`]s for the client.
pub struct IntentHandler {
    engine: Arc<ChainEngine>,
    store: Arc<dyn MessageStore>,
    queue: GenerationQueue,
    commands: mpsc::UnboundedSender<BotCommand>,
}

impl IntentHandler {
    pub fn new(
        engine: Arc<ChainEngine>,
        store: Arc<dyn MessageStore>,
        queue: GenerationQueue,
        commands: mpsc::UnboundedSender<BotCommand>,
    ) -> Self {
        Self {
            engine,
            store,
            queue,
            commands,
        }
    }

    fn command(&self, command: BotCommand) -> Result<(), ServiceError> {
        self.commands.send(command)?;
        Ok(())
    }

    async fn rebuild(&self, channel_id: u64) -> Result<(), ServiceError> {
        self.engine
            .load_channels(self.store.as_ref(), &[channel_id])
            .await
    }
}

#[async_trait]
impl NotificationBus for IntentHandler {
    async fn publish(&self, notification: Notification) -> Result<(), ServiceError> {
        match notification {
            Notification::MessageReceived {
                channel_id,
                message_id,
                user_id,
                text,
            } => {
                if !self.engine.contains(channel_id).await {
                    debug!(channel_id, "no chain for channel, not learning");
                    return Ok(());
                }
                if self.store.is_ignored(channel_id, user_id).await? {
                    return Ok(());
                }
                self.store
                    .append(StoredMessage {
                        id: message_id,
                        channel_id,
                        user_id,
                        text: text.clone(),
                        received_at: Utc::now(),
                    })
                    .await?;
                self.engine.add_message(channel_id, &text).await?;
            }
            Notification::GenerationRequested {
                channel_id,
                reply_to,
            } => {
                self.queue.enqueue(GenerationRequest {
                    channel_id,
                    reply_to,
                })?;
            }
            Notification::ChannelJoined { channel_id, channel } => {
                info!(%channel, channel_id, "loading chain for joined channel");
                self.rebuild(channel_id).await?;
            }
            Notification::ChannelLeft { channel_id, channel } => {
                info!(%channel, channel_id, "dropping chain for left channel");
                if let Err(e) = self.engine.remove_channel(channel_id).await {
                    warn!(error = %e, "chain already gone");
                }
            }
            Notification::JoinRequested { channel_id, channel } => {
                self.store.add_channel(channel_id).await?;
                self.command(BotCommand::Join { channel })?;
            }
            Notification::LeaveRequested { channel_id, channel } => {
                self.store.remove_channel(channel_id).await?;
                self.command(BotCommand::Leave { channel })?;
            }
            Notification::PurgeWord {
                channel_id,
                channel,
                word,
            } => {
                let purged = self.store.purge_word(channel_id, &word).await?;
                info!(%channel, purged, "purged messages");
                self.rebuild(channel_id).await?;
            }
            Notification::IgnoreUser {
                channel_id,
                channel,
                user_id,
            } => {
                let removed = self.store.ignore_user(channel_id, user_id).await?;
                info!(%channel, user_id, removed, "ignoring user");
                self.rebuild(channel_id).await?;
                self.command(BotCommand::send(
                    channel,
                    "Alrighty, I won't listen to them anymore!",
                ))?;
            }
            Notification::MessageDeleted {
                channel_id,
                message_id,
            } => {
                if self.store.delete_message(channel_id, message_id).await?
                    && self.engine.contains(channel_id).await
                {
                    self.rebuild(channel_id).await?;
                }
            }
            Notification::GiftReceived {
                channel_id,
                channel,
                sender,
            } => {
                let text = match self.engine.generate(channel_id).await {
                    Some(line) => format!("Thanks @{}! {}", sender, line),
                    None => format!("Thanks @{}!", sender),
                };
                self.command(BotCommand::send(channel, text))?;
            }
            Notification::SendRequested {
                channel,
                text,
                reply_to,
            } => {
                self.command(BotCommand::Send {
                    channel,
                    text,
                    reply_to,
                })?;
            }
        }
        Ok(())
    }
}
