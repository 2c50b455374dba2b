//! Tagged wire messages.
//!
//! A [`Message`] is the structural view of one wire line: tags, optional
//! source, command and parameters. It knows nothing about what a command
//! means; see [`crate::event`] for that.

mod nom_parser;
pub mod tags;
mod types;

pub use self::nom_parser::{DetailedParseError, ParsedMessage};
pub use self::types::Message;
