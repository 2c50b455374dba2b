//! Bot configuration, loaded from TOML.
//!
//! ```toml
//! [connection]
//! username = "ebooks_bot"
//!
//! [limits]
//! send = { max = 20, per_secs = 30 }
//!
//! [generation]
//! fallback_message = "You gotta say stuff in chat before I can generate a message!"
//! ```
//!
//! Every section and field is optional; missing values take the defaults
//! Twitch documents for unverified bots.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::command::TWITCH_CAPABILITIES;
use crate::markov::DEFAULT_MAX_TOKENS;

/// Default prefix of chat commands.
pub const DEFAULT_COMMAND_PREFIX: &str = "~";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub bot: BotSection,
    /// Known users, login to numeric id. Must include the bot itself and
    /// every channel it should sit in.
    #[serde(default)]
    pub users: HashMap<String, u64>,
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Client tuning derived from this configuration.
    #[cfg(feature = "tokio")]
    pub fn client_options(&self) -> crate::client::ClientOptions {
        use crate::client::{ClientOptions, RateLimit};
        use std::time::Duration;

        let limit = |section: &RateLimitConfig| {
            RateLimit::new(section.max, Duration::from_secs(section.per_secs))
        };
        ClientOptions {
            capabilities: self.connection.capabilities.clone(),
            outgoing_capacity: self.limits.outgoing_capacity,
            send_limit: limit(&self.limits.send),
            join_limit: limit(&self.limits.join),
            reconnect_initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            reconnect_max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
        }
    }
}

/// `[connection]`
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            endpoint: default_endpoint(),
            capabilities: default_capabilities(),
        }
    }
}

/// `[limits]`
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Chat messages that may wait in the outgoing queue.
    #[serde(default = "default_outgoing_capacity")]
    pub outgoing_capacity: usize,
    #[serde(default = "default_send_limit")]
    pub send: RateLimitConfig,
    #[serde(default = "default_join_limit")]
    pub join: RateLimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            outgoing_capacity: default_outgoing_capacity(),
            send: default_send_limit(),
            join: default_join_limit(),
        }
    }
}

/// `max` operations per `per_secs` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    pub max: usize,
    pub per_secs: u64,
}

/// `[reconnect]`
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// `[generation]`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Sent when a channel has nothing to generate from. Nothing is sent
    /// when unset.
    #[serde(default)]
    pub fallback_message: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            fallback_message: None,
        }
    }
}

/// `[bot]`
#[derive(Debug, Clone, Deserialize)]
pub struct BotSection {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Channel logins to sit in from startup, besides the bot's own room.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            channels: Vec::new(),
        }
    }
}

fn default_endpoint() -> String {
    "wss://irc-ws.chat.twitch.tv:443".to_string()
}

fn default_capabilities() -> Vec<String> {
    TWITCH_CAPABILITIES.iter().map(|cap| cap.to_string()).collect()
}

fn default_outgoing_capacity() -> usize {
    30
}

fn default_send_limit() -> RateLimitConfig {
    RateLimitConfig {
        max: 20,
        per_secs: 30,
    }
}

fn default_join_limit() -> RateLimitConfig {
    RateLimitConfig {
        max: 20,
        per_secs: 10,
    }
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_command_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_string()
}
