//! Error types for the chat client and generation engine.
//!
//! This module defines error types for line-level protocol failures,
//! message parsing and classification, the transport, the client, and the
//! Markov chain engine.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Error type returned by collaborator implementations (stores, resolvers, token providers).
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// Per-line protocol errors raised while handling received text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Line exceeded the maximum allowed length.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    /// Failed to parse a wire line.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// A recognized command was missing data needed to build its event.
    #[error("could not classify message: {string}")]
    Classify {
        /// The raw line.
        string: String,
        /// The underlying classification error.
        #[source]
        cause: ClassifyError,
    },
}

/// Errors encountered when parsing wire lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Parsing error with position information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// A recognized command lacked a tag, parameter or source, or carried a
/// value of the wrong shape.
///
/// Unknown commands are not errors; see [`Event::classify`](crate::event::Event::classify).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClassifyError {
    /// A required tag was absent.
    #[error("{command}: missing tag `{tag}`")]
    MissingTag {
        /// Command being classified.
        command: String,
        /// The absent tag key.
        tag: &'static str,
    },

    /// A required parameter was absent.
    #[error("{command}: missing parameter {index}")]
    MissingParameter {
        /// Command being classified.
        command: String,
        /// Zero-based parameter index.
        index: usize,
    },

    /// The message had no source, or the source had no nickname part.
    #[error("{command}: missing source")]
    MissingSource {
        /// Command being classified.
        command: String,
    },

    /// A tag value could not be converted to the expected type.
    #[error("invalid value for tag `{tag}`: {value:?}")]
    InvalidTag {
        /// The tag key.
        tag: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Errors raised by a transport connection.
#[cfg(feature = "tokio")]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// WebSocket protocol or connection error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}

/// Errors returned by [`Client`](crate::client::Client) operations.
#[cfg(feature = "tokio")]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// No transport is currently open.
    #[error("not connected")]
    NotConnected,

    /// The client was shut down.
    #[error("client has been shut down")]
    Disposed,

    /// Connect was requested before any credentials were supplied.
    #[error("no credentials; connect must be called first")]
    NoCredentials,

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The token provider failed.
    #[error("token provider failed: {0}")]
    Token(#[source] ServiceError),

    /// Chat text contains a character that would end the line early.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),
}

/// Errors returned by the Markov chain engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChainError {
    /// No chain exists for the channel id.
    #[error("no chain exists for channel {0}")]
    NoSuchChannel(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::MessageTooLong(9000);
        assert_eq!(format!("{}", err), "message too long: 9000 bytes");

        let err = ClassifyError::MissingTag {
            command: "PRIVMSG".to_string(),
            tag: "room-id",
        };
        assert_eq!(format!("{}", err), "PRIVMSG: missing tag `room-id`");

        let err = ChainError::NoSuchChannel(42);
        assert_eq!(format!("{}", err), "no chain exists for channel 42");
    }

    #[test]
    fn test_protocol_error_chaining() {
        let parse_err = MessageParseError::InvalidCommand;
        let protocol_err = ProtocolError::InvalidMessage {
            string: "@a=b".to_string(),
            cause: parse_err.clone(),
        };

        let source = std::error::Error::source(&protocol_err);
        assert!(source.is_some());
        assert_eq!(source.unwrap().to_string(), parse_err.to_string());
    }

    #[test]
    fn test_classify_error_chaining() {
        let cause = ClassifyError::MissingSource {
            command: "JOIN".to_string(),
        };
        let protocol_err = ProtocolError::Classify {
            string: "JOIN #chan".to_string(),
            cause: cause.clone(),
        };

        let source = std::error::Error::source(&protocol_err).unwrap();
        assert_eq!(source.to_string(), "JOIN: missing source");
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn test_transport_error_conversion() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let transport: TransportError = io_err.into();
        let client: ClientError = transport.into();

        match client {
            ClientError::Transport(TransportError::Io(_)) => {}
            other => panic!("Expected Transport(Io), got {:?}", other),
        }
    }
}
