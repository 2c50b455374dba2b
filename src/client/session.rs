//! Connection lifecycle and the three client loops.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::{ClientError, ProtocolError};
use crate::event::Event;
use crate::services::TokenProvider;
use crate::transport::{Connection, Connector, FrameReader, FrameWriter, LineBuffer};
use crate::Message;

use super::rate_limit::SlidingWindow;
use super::state::{ConnectionState, Status};
use super::{ClientOptions, RateLimit};

pub(super) struct Credentials {
    pub username: String,
    pub token: String,
    pub endpoint: String,
}

/// State shared by the client handle and its loops.
pub(super) struct Shared {
    pub connector: Arc<dyn Connector>,
    pub tokens: Option<Arc<dyn TokenProvider>>,
    pub options: ClientOptions,
    pub writer: tokio::sync::Mutex<Option<Box<dyn FrameWriter>>>,
    pub status: watch::Sender<Status>,
    /// Server-confirmed joins. Written only by the receive loop.
    pub membership: RwLock<HashSet<String>>,
    pub credentials: Mutex<Option<Credentials>>,
    /// Token to use for the next reconnect instead of asking the provider.
    pub next_token: Mutex<Option<String>>,
    /// Set by [`request_reconnect`](Self::request_reconnect) and cleared
    /// when a session opens; the `Notify` only wakes the receive loop.
    reconnect_requested: AtomicBool,
    reconnect_wakeup: Notify,
    pub shutdown: CancellationToken,
}

impl Shared {
    pub fn new(
        connector: Arc<dyn Connector>,
        tokens: Option<Arc<dyn TokenProvider>>,
        options: ClientOptions,
    ) -> Self {
        let (status, _) = watch::channel(Status::default());
        Self {
            connector,
            tokens,
            options,
            writer: tokio::sync::Mutex::new(None),
            status,
            membership: RwLock::new(HashSet::new()),
            credentials: Mutex::new(None),
            next_token: Mutex::new(None),
            reconnect_requested: AtomicBool::new(false),
            reconnect_wakeup: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Ask the receive loop to drop the current connection and reopen it.
    /// Any session opened after this call satisfies the request.
    pub fn request_reconnect(&self) {
        self.reconnect_requested.store(true, Ordering::SeqCst);
        self.reconnect_wakeup.notify_one();
    }

    /// Wait for a reconnect request still outstanding for the live session.
    async fn requested_reconnect(&self) {
        loop {
            self.reconnect_wakeup.notified().await;
            if self.reconnect_requested.swap(false, Ordering::SeqCst) {
                return;
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_modify(|status| status.state = state);
    }

    /// Open the transport and send the handshake. On success the writer is
    /// installed, the session number is bumped and the reader is returned
    /// for the receive loop.
    pub async fn open_session(&self, token: &str) -> Result<Box<dyn FrameReader>, ClientError> {
        let (username, endpoint) = match self.credentials.lock().as_ref() {
            Some(creds) => (creds.username.clone(), creds.endpoint.clone()),
            None => return Err(ClientError::NoCredentials),
        };

        self.set_state(ConnectionState::Connecting);
        let result = self.handshake(&username, token, &endpoint).await;
        let (writer, reader) = match result {
            Ok(halves) => halves,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        *self.writer.lock().await = Some(writer);
        if let Some(creds) = self.credentials.lock().as_mut() {
            creds.token = token.to_owned();
        }
        self.reconnect_requested.store(false, Ordering::SeqCst);
        self.status.send_modify(|status| {
            status.state = ConnectionState::Connected;
            status.session += 1;
        });
        info!(%username, %endpoint, "connected");
        Ok(reader)
    }

    async fn handshake(
        &self,
        username: &str,
        token: &str,
        endpoint: &str,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), ClientError> {
        let Connection { mut writer, reader } = self.connector.connect(endpoint).await?;
        for command in Command::handshake(username, token, &self.options.capabilities) {
            writer.send_text(command.to_string()).await?;
        }
        Ok((writer, reader))
    }

    /// Close the writer, forget membership and report `Disconnected`.
    /// Returns the channels that were joined.
    async fn close_session(&self) -> Vec<String> {
        self.close_writer().await;
        let joined: Vec<String> = self.membership.write().drain().collect();
        self.set_state(ConnectionState::Disconnected);
        joined
    }

    pub async fn close_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "error while closing transport");
            }
        }
    }

    pub async fn send_command(&self, command: &Command) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(ClientError::NotConnected)?;
        writer.send_text(command.to_string()).await?;
        Ok(())
    }

    /// Token for the next connection attempt: an explicitly supplied one,
    /// else a fresh one from the provider, else the last one used.
    pub async fn fetch_token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.next_token.lock().take() {
            return Ok(token);
        }
        if let Some(provider) = &self.tokens {
            return provider.access_token().await.map_err(ClientError::Token);
        }
        self.credentials
            .lock()
            .as_ref()
            .map(|creds| creds.token.clone())
            .ok_or(ClientError::NoCredentials)
    }

    fn is_self(&self, username: &str) -> bool {
        self.credentials
            .lock()
            .as_ref()
            .is_some_and(|creds| creds.username.eq_ignore_ascii_case(username))
    }

    /// Wait for a live connection. `false` once the client is shutting down.
    async fn wait_connected(&self, status: &mut watch::Receiver<Status>) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            connected = status.wait_for(Status::is_connected) => connected.is_ok(),
        }
    }

    /// Reopen the connection, backing off exponentially between failures.
    /// `None` if the client shuts down first.
    async fn reopen(&self) -> Option<Box<dyn FrameReader>> {
        let mut delay = self.options.reconnect_initial_delay;
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }

            info!("reconnecting");
            let attempt = match self.fetch_token().await {
                Ok(token) => self.open_session(&token).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(reader) => return Some(reader),
                Err(e) => {
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "reconnect failed")
                }
            }

            // A requested reconnect retries right away.
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = self.reconnect_wakeup.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(self.options.reconnect_max_delay);
        }
    }
}

/// Receive loop: reads frames, dispatches events and owns reconnection.
pub(super) async fn receive_loop(
    shared: Arc<Shared>,
    mut reader: Box<dyn FrameReader>,
    events: mpsc::UnboundedSender<Event>,
    joins: mpsc::UnboundedSender<Command>,
) {
    let mut lines = LineBuffer::new();
    let mut reconnect_pending = false;

    loop {
        let reason = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = shared.requested_reconnect() => "reconnect requested",
            frame = reader.next_text() => match frame {
                Some(Ok(text)) => {
                    for line in lines.push(&text) {
                        dispatch(&shared, line, &events, &mut reconnect_pending).await;
                    }
                    continue;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "transport read failed");
                    "transport error"
                }
                None if reconnect_pending => "server requested reconnect",
                None => "connection closed",
            },
        };

        info!(reason, "disconnected");
        let rejoin = shared.close_session().await;
        reconnect_pending = false;
        lines.clear();

        reader = match shared.reopen().await {
            Some(reader) => reader,
            None => break,
        };
        for channel in rejoin {
            // The join loop outlives this one unless the client is gone.
            let _ = joins.send(Command::JOIN(channel));
        }
    }

    shared.close_session().await;
    debug!("receive loop stopped");
}

async fn dispatch(
    shared: &Shared,
    line: Result<String, ProtocolError>,
    events: &mpsc::UnboundedSender<Event>,
    reconnect_pending: &mut bool,
) {
    let event = match line.and_then(|line| classify_line(&line)) {
        Ok(Some(event)) => event,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "skipping line");
            return;
        }
    };

    match &event {
        Event::Ping(ping) => {
            if let Err(e) = shared.send_command(&Command::PONG(ping.server.clone())).await {
                warn!(error = %e, "failed to answer PING");
            }
        }
        Event::Join(join) if shared.is_self(&join.username) => {
            info!(channel = %join.channel, "joined channel");
            shared.membership.write().insert(join.channel.clone());
        }
        Event::Part(part) if shared.is_self(&part.username) => {
            info!(channel = %part.channel, "left channel");
            shared.membership.write().remove(&part.channel);
        }
        Event::Reconnect(_) => {
            info!("server announced reconnect");
            *reconnect_pending = true;
        }
        _ => {}
    }

    debug!(kind = event.kind(), channel = event.channel(), "dispatching event");
    // Nobody reading events is not an error for the loop.
    let _ = events.send(event);
}

fn classify_line(line: &str) -> Result<Option<Event>, ProtocolError> {
    let msg = Message::parse(line).map_err(|cause| ProtocolError::InvalidMessage {
        string: line.to_owned(),
        cause,
    })?;
    let event = Event::classify(&msg).map_err(|cause| ProtocolError::Classify {
        string: line.to_owned(),
        cause,
    })?;
    if event.is_none() {
        debug!(command = %msg.command, "unhandled command");
    }
    Ok(event)
}

/// A queue feeding one of the rate-limited loops.
#[async_trait]
pub(super) trait CommandQueue: Send {
    async fn next(&mut self) -> Option<Command>;
}

#[async_trait]
impl CommandQueue for mpsc::Receiver<Command> {
    async fn next(&mut self) -> Option<Command> {
        self.recv().await
    }
}

#[async_trait]
impl CommandQueue for mpsc::UnboundedReceiver<Command> {
    async fn next(&mut self) -> Option<Command> {
        self.recv().await
    }
}

/// Send loop and join loop: wait for the limiter, then dequeue, then send.
///
/// Waiting before the dequeue leaves queued items in the queue, so a full
/// bounded queue pushes back on producers.
pub(super) async fn rate_limited_loop<Q: CommandQueue>(
    shared: Arc<Shared>,
    mut queue: Q,
    limit: RateLimit,
    name: &'static str,
) {
    let mut window = SlidingWindow::new(limit.max, limit.per);
    let mut status = shared.status.subscribe();

    loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = window.ready() => {}
        }

        let command = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            next = queue.next() => match next {
                Some(command) => command,
                None => break,
            },
        };

        if !shared.wait_connected(&mut status).await {
            break;
        }

        match shared.send_command(&command).await {
            Ok(()) => window.record(),
            Err(e) => warn!(queue = name, error = %e, command = %command, "dropping command"),
        }
    }

    debug!(queue = name, "loop stopped");
}
