//! Outbound commands.
//!
//! The client only ever sends a handful of commands; [`Command`] covers that
//! vocabulary and serializes each one to its exact wire form.

mod serialize;
mod types;

pub use types::{Command, TWITCH_CAPABILITIES};
