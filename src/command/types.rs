use uuid::Uuid;

/// Capabilities requested during the handshake: message tags, Twitch-specific
/// commands and JOIN/PART membership events.
pub const TWITCH_CAPABILITIES: [&str; 3] = [
    "twitch.tv/tags",
    "twitch.tv/commands",
    "twitch.tv/membership",
];

/// A command sent by the client.
///
/// Channel arguments are bare channel logins; the `#` is added when the
/// command is serialized.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// `PASS oauth:<token>`
    PASS(String),
    /// `NICK <username>`
    NICK(String),
    /// `CAP REQ :<capability>`
    CapREQ(String),
    /// `JOIN #<channel>`
    JOIN(String),
    /// `PART #<channel>`
    PART(String),
    /// `[@reply-parent-msg-id=<id> ]PRIVMSG #<channel> :<text>`
    PRIVMSG {
        /// Target channel login.
        channel: String,
        /// Message text.
        text: String,
        /// Id of the chat message this one replies to.
        reply_to: Option<Uuid>,
    },
    /// `PONG :<server>`
    PONG(String),
}

impl Command {
    /// Build a chat message without a reply thread.
    pub fn privmsg(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG {
            channel: channel.into(),
            text: text.into(),
            reply_to: None,
        }
    }

    /// Build a chat message threaded under `parent`.
    pub fn reply(channel: impl Into<String>, text: impl Into<String>, parent: Uuid) -> Self {
        Command::PRIVMSG {
            channel: channel.into(),
            text: text.into(),
            reply_to: Some(parent),
        }
    }

    /// The connection handshake, in the order it must be sent.
    pub fn handshake<S: AsRef<str>>(username: &str, token: &str, capabilities: &[S]) -> Vec<Command> {
        let mut commands = vec![
            Command::PASS(token.to_owned()),
            Command::NICK(username.to_owned()),
        ];
        commands.extend(
            capabilities
                .iter()
                .map(|cap| Command::CapREQ(cap.as_ref().to_owned())),
        );
        commands
    }
}
