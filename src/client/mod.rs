//! The chat client.
//!
//! A [`Client`] owns one transport connection at a time and runs three
//! tasks once connected:
//!
//! - the receive loop, which splits frames into lines, classifies them,
//!   answers `PING`, tracks the bot's own channel membership and publishes
//!   every event to an unbounded queue read through [`Client::next_event`]
//!   and [`Client::read_matching`]. It also owns reconnection.
//! - the send loop, which drains a bounded queue of chat messages under a
//!   sliding-window rate limit.
//! - the join loop, which drains an unbounded queue of channel joins under
//!   its own limit.
//!
//! All three stop when [`Client::shutdown`] is called or the client is
//! dropped.

mod rate_limit;
mod session;
mod state;

pub use self::rate_limit::SlidingWindow;
pub use self::state::{ConnectionState, Status};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bot::BotCommand;
use crate::command::{Command, TWITCH_CAPABILITIES};
use crate::error::ClientError;
use crate::event::Event;
use crate::services::TokenProvider;
use crate::transport::Connector;

use self::session::Shared;

/// Default TMI WebSocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://irc-ws.chat.twitch.tv:443";

/// `max` operations per `per`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub max: usize,
    pub per: Duration,
}

impl RateLimit {
    pub const fn new(max: usize, per: Duration) -> Self {
        Self { max, per }
    }
}

/// Tuning for a [`Client`]. The defaults match Twitch's limits for
/// unverified bots.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Capabilities requested after `NICK`.
    pub capabilities: Vec<String>,
    /// Capacity of the outgoing chat queue.
    pub outgoing_capacity: usize,
    pub send_limit: RateLimit,
    pub join_limit: RateLimit,
    /// Delay after the first failed reconnect attempt; doubles up to
    /// `reconnect_max_delay`.
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            capabilities: TWITCH_CAPABILITIES.iter().map(|cap| cap.to_string()).collect(),
            outgoing_capacity: 30,
            send_limit: RateLimit::new(20, Duration::from_secs(30)),
            join_limit: RateLimit::new(20, Duration::from_secs(10)),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
        }
    }
}

/// Builds a [`Client`].
pub struct ClientBuilder {
    connector: Arc<dyn Connector>,
    tokens: Option<Arc<dyn TokenProvider>>,
    options: ClientOptions,
}

impl ClientBuilder {
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Ask `provider` for a fresh token before every automatic reconnect.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(provider);
        self
    }

    pub fn build(self) -> Client {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.options.outgoing_capacity.max(1));
        let (joins_tx, joins_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Client {
            shared: Arc::new(Shared::new(self.connector, self.tokens, self.options)),
            outgoing: outgoing_tx,
            joins: joins_tx,
            events: tokio::sync::Mutex::new(events_rx),
            idle: Mutex::new(Some(IdleLoops {
                outgoing: outgoing_rx,
                joins: joins_rx,
                events: events_tx,
            })),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

/// Loop ends held until the first successful connect spawns the loops.
struct IdleLoops {
    outgoing: mpsc::Receiver<Command>,
    joins: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<Event>,
}

/// A TMI chat client. See the [module docs](self).
pub struct Client {
    shared: Arc<Shared>,
    outgoing: mpsc::Sender<Command>,
    joins: mpsc::UnboundedSender<Command>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<Event>>,
    idle: Mutex<Option<IdleLoops>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    pub fn builder(connector: impl Connector + 'static) -> ClientBuilder {
        ClientBuilder {
            connector: Arc::new(connector),
            tokens: None,
            options: ClientOptions::default(),
        }
    }

    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::builder(connector).build()
    }

    /// Open the connection, send the handshake and start the loops.
    ///
    /// `PASS`, `NICK` and the capability requests are sent before any loop
    /// runs. Calling this again on a running client replaces the session with
    /// the new credentials.
    pub async fn connect(
        &self,
        username: &str,
        token: &str,
        endpoint: &str,
    ) -> Result<(), ClientError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(ClientError::Disposed);
        }

        *self.shared.credentials.lock() = Some(session::Credentials {
            username: username.to_owned(),
            token: token.to_owned(),
            endpoint: endpoint.to_owned(),
        });

        let idle = self.idle.lock().take();
        match idle {
            Some(idle) => self.start(idle, token).await,
            None => self.restart(Some(token.to_owned())).await,
        }
    }

    /// Drop the current connection and connect again with the last username
    /// and endpoint. `token` replaces the stored token; without it the token
    /// provider (or the stored token) is used. Returns once the new session
    /// has completed its handshake.
    pub async fn reconnect(&self, token: Option<String>) -> Result<(), ClientError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(ClientError::Disposed);
        }
        if self.shared.credentials.lock().is_none() {
            return Err(ClientError::NoCredentials);
        }

        let idle = self.idle.lock().take();
        match idle {
            Some(idle) => {
                let token = match token {
                    Some(token) => token,
                    None => match self.shared.fetch_token().await {
                        Ok(token) => token,
                        Err(e) => {
                            *self.idle.lock() = Some(idle);
                            return Err(e);
                        }
                    },
                };
                self.start(idle, &token).await
            }
            None => self.restart(token).await,
        }
    }

    async fn start(&self, idle: IdleLoops, token: &str) -> Result<(), ClientError> {
        let reader = match self.shared.open_session(token).await {
            Ok(reader) => reader,
            Err(e) => {
                *self.idle.lock() = Some(idle);
                return Err(e);
            }
        };

        let options = &self.shared.options;
        let tasks = [
            tokio::spawn(session::receive_loop(
                self.shared.clone(),
                reader,
                idle.events,
                self.joins.clone(),
            )),
            tokio::spawn(session::rate_limited_loop(
                self.shared.clone(),
                idle.outgoing,
                options.send_limit,
                "send",
            )),
            tokio::spawn(session::rate_limited_loop(
                self.shared.clone(),
                idle.joins,
                options.join_limit,
                "join",
            )),
        ];
        self.tasks.lock().extend(tasks);
        Ok(())
    }

    async fn restart(&self, token: Option<String>) -> Result<(), ClientError> {
        if let Some(token) = token {
            *self.shared.next_token.lock() = Some(token);
        }

        let mut status = self.shared.status.subscribe();
        let session = status.borrow().session;
        self.shared.request_reconnect();

        tokio::select! {
            _ = self.shared.shutdown.cancelled() => Err(ClientError::Disposed),
            next = status.wait_for(|s| s.session > session && s.is_connected()) => {
                next.map(|_| ()).map_err(|_| ClientError::Disposed)
            }
        }
    }

    /// Queue a join. Joins are sent by the join loop under its rate limit;
    /// the channel shows up in [`joined_channels`](Self::joined_channels)
    /// once the server confirms it.
    pub fn join_channel(&self, channel: &str) -> Result<(), ClientError> {
        self.joins
            .send(Command::JOIN(channel_login(channel)))
            .map_err(|_| ClientError::Disposed)
    }

    /// Send `PART` immediately, bypassing the join limiter.
    pub async fn leave_channel(&self, channel: &str) -> Result<(), ClientError> {
        self.shared
            .send_command(&Command::PART(channel_login(channel)))
            .await
    }

    /// Queue a chat message. Waits while the outgoing queue is full.
    ///
    /// Text containing CR, LF or NUL is rejected, since the server would
    /// read anything after a line break as a separate command.
    pub async fn send_chat_message(
        &self,
        channel: &str,
        text: &str,
        reply_to: Option<Uuid>,
    ) -> Result<(), ClientError> {
        if let Some(ch) = text.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(ClientError::IllegalControlChar(ch));
        }
        let command = Command::PRIVMSG {
            channel: channel_login(channel),
            text: text.to_owned(),
            reply_to,
        };
        tokio::select! {
            _ = self.shared.shutdown.cancelled() => Err(ClientError::Disposed),
            sent = self.outgoing.send(command) => sent.map_err(|_| ClientError::Disposed),
        }
    }

    /// Apply a command received from the bus.
    pub async fn execute(&self, command: BotCommand) -> Result<(), ClientError> {
        match command {
            BotCommand::Send {
                channel,
                text,
                reply_to,
            } => self.send_chat_message(&channel, &text, reply_to).await,
            BotCommand::Join { channel } => self.join_channel(&channel),
            BotCommand::Leave { channel } => self.leave_channel(&channel).await,
        }
    }

    /// Next event in arrival order. `None` once the client has shut down.
    ///
    /// A dropped connection does not end the stream: the client reconnects
    /// on its own and events resume with the next session.
    pub async fn next_event(&self) -> Option<Event> {
        let mut events = self.events.lock().await;
        tokio::select! {
            biased;
            event = events.recv() => event,
            _ = self.shared.shutdown.cancelled() => None,
        }
    }

    /// Wait for the next event of kind `T` accepted by `predicate`,
    /// discarding everything before it.
    ///
    /// Returns `None` if `cancel` fires or the client shuts down first.
    /// Cancelling only affects this call.
    pub async fn read_matching<T, F>(&self, mut predicate: F, cancel: &CancellationToken) -> Option<T>
    where
        T: TryFrom<Event, Error = Event>,
        F: FnMut(&T) -> bool,
    {
        let mut events = self.events.lock().await;
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = self.shared.shutdown.cancelled() => return None,
                event = events.recv() => event?,
            };
            if let Ok(typed) = T::try_from(event) {
                if predicate(&typed) {
                    return Some(typed);
                }
            }
        }
    }

    /// [`read_matching`](Self::read_matching) without a predicate.
    pub async fn read<T>(&self, cancel: &CancellationToken) -> Option<T>
    where
        T: TryFrom<Event, Error = Event>,
    {
        self.read_matching(|_: &T| true, cancel).await
    }

    /// Channels the server has confirmed the bot is in, sorted.
    pub fn joined_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.shared.membership.read().iter().cloned().collect();
        channels.sort();
        channels
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        self.shared.membership.read().contains(&channel_login(channel))
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.borrow().is_connected()
    }

    /// Watch connection state changes. A transition to
    /// [`ConnectionState::Disconnected`] is the disconnect notification.
    pub fn status(&self) -> watch::Receiver<Status> {
        self.shared.status.subscribe()
    }

    /// Username given to the last [`connect`](Self::connect).
    pub fn username(&self) -> Option<String> {
        self.shared
            .credentials
            .lock()
            .as_ref()
            .map(|creds| creds.username.clone())
    }

    /// Stop all loops and close the transport. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "client task failed");
            }
        }
        self.shared.close_writer().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Channel login as Twitch reports it: no `#`, lowercase.
fn channel_login(channel: &str) -> String {
    channel.trim_start_matches('#').to_ascii_lowercase()
}
