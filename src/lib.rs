//! # tmi-ebooks
//!
//! A Twitch chat (TMI) client and a per-channel Markov chain engine, the two
//! halves of an "ebooks" chat bot that learns from a channel's chat and talks
//! back on request.
//!
//! ## Features
//!
//! - Wire line parsing with tags, source, command and parameters
//! - Classification into typed chat events (chat lines, joins, gift subs,
//!   moderation, room state, reconnect notices)
//! - An async client with separate rate-limited send and join loops,
//!   automatic `PONG`, membership tracking and automatic reconnect
//! - Order-1 Markov chains per channel behind a readers-writer lock
//! - A serialized generation queue and a chat command router
//!
//! Everything async sits behind the default `tokio` feature.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing and classifying a line
//!
//! ```rust
//! use tmi_ebooks::{Message, event::{Event, Chat}};
//!
//! let raw = "@id=b34ccfc7-4977-403a-8a94-33c6bac34fb8;room-id=1337;user-id=42 \
//!            :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Kappa Keepo Kappa";
//! let message: Message = raw.parse().expect("valid line");
//! assert_eq!(message.params[1], "Kappa Keepo Kappa");
//!
//! let event = Event::classify(&message).unwrap().unwrap();
//! let chat = Chat::try_from(event).unwrap();
//! assert_eq!(chat.channel, "dallas");
//! assert_eq!(chat.user_id, 42);
//! ```
//!
//! ### Building outbound commands
//!
//! ```rust
//! use tmi_ebooks::Command;
//!
//! assert_eq!(Command::privmsg("dallas", "hi chat").to_string(), "PRIVMSG #dallas :hi chat");
//! assert_eq!(Command::JOIN("dallas".into()).to_string(), "JOIN #dallas");
//! ```
//!
//! ### Learning and generating
//!
//! ```rust
//! use tmi_ebooks::markov::MarkovChain;
//!
//! let mut chain = MarkovChain::new();
//! assert_eq!(chain.generate(100), None);
//! chain.add_message("hello there chat");
//! assert_eq!(chain.generate(100).as_deref(), Some("hello there chat"));
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod markov;
pub mod message;
pub mod transport;

#[cfg(feature = "tokio")]
pub mod bot;
#[cfg(feature = "tokio")]
pub mod client;
#[cfg(feature = "tokio")]
pub mod generation;
#[cfg(feature = "tokio")]
pub mod services;

pub use self::command::{Command, TWITCH_CAPABILITIES};
pub use self::config::{BotConfig, ConfigError};
pub use self::error::{ChainError, ClassifyError, MessageParseError, ProtocolError};
pub use self::event::Event;
pub use self::markov::MarkovChain;
pub use self::message::Message;
pub use self::transport::{LineBuffer, MAX_LINE_LEN};

#[cfg(feature = "tokio")]
pub use self::bot::{BotCommand, IntentHandler, Notification, Router};
#[cfg(feature = "tokio")]
pub use self::client::{Client, ClientOptions, ConnectionState, Status, DEFAULT_ENDPOINT};
#[cfg(feature = "tokio")]
pub use self::error::{ClientError, TransportError};
#[cfg(feature = "tokio")]
pub use self::generation::{GenerationQueue, GenerationRequest, GenerationWorker};
#[cfg(feature = "tokio")]
pub use self::markov::ChainEngine;
#[cfg(feature = "tokio")]
pub use self::transport::{Connection, Connector, WebSocketConnector};
