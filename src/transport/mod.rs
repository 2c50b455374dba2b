//! Frame transport between the client and the chat server.
//!
//! The client talks to the server through three small traits so that the
//! WebSocket implementation can be swapped for an in-memory one in tests:
//! a [`Connector`] opens a [`Connection`], which is split into a
//! [`FrameWriter`] and a [`FrameReader`]. Frames may hold several wire lines
//! (or part of one); [`LineBuffer`] turns them back into lines.

mod lines;
#[cfg(feature = "tokio")]
mod websocket;

pub use self::lines::{LineBuffer, MAX_LINE_LEN};
#[cfg(feature = "tokio")]
pub use self::websocket::WebSocketConnector;

#[cfg(feature = "tokio")]
use async_trait::async_trait;

#[cfg(feature = "tokio")]
use crate::error::TransportError;

/// Outbound half of an open connection.
#[cfg(feature = "tokio")]
#[async_trait]
pub trait FrameWriter: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start a clean close of the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of an open connection.
#[cfg(feature = "tokio")]
#[async_trait]
pub trait FrameReader: Send {
    /// Next text frame, or `None` once the connection has closed.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;
}

/// An open connection, already split into its two halves.
#[cfg(feature = "tokio")]
pub struct Connection {
    pub writer: Box<dyn FrameWriter>,
    pub reader: Box<dyn FrameReader>,
}

/// Opens connections to an endpoint.
#[cfg(feature = "tokio")]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Connection, TransportError>;
}
