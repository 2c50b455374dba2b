/// Lifecycle of the client's transport connection.
///
/// `Connected -> Connecting` happens on a server `RECONNECT` followed by a
/// close, on an unexpected close, or on [`Client::reconnect`](super::Client::reconnect).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport open.
    #[default]
    Disconnected,
    /// Opening the transport or sending the handshake.
    Connecting,
    /// Handshake sent; the loops are serving this connection.
    Connected,
}

/// Snapshot published on every state change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub state: ConnectionState,
    /// Incremented each time a connection completes its handshake, so
    /// observers can tell one session from the next.
    pub session: u64,
}

impl Status {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
