//! Typed chat events.
//!
//! [`Event::classify`] turns a tagged wire [`Message`](crate::Message) into one
//! variant of a closed set of events. Each event kind is its own struct so
//! that readers can ask the client for exactly the kind they want:
//!
//! ```
//! use tmi_ebooks::{Message, event::{Event, Join}};
//!
//! let msg: Message = ":alice!alice@alice.tmi.twitch.tv JOIN #somechannel".parse().unwrap();
//! let event = Event::classify(&msg).unwrap().unwrap();
//! let join = Join::try_from(event).unwrap();
//! assert_eq!(join.channel, "somechannel");
//! assert_eq!(join.username, "alice");
//! ```

mod classify;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `001`: registration succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Welcome;

/// `PING`: the server expects a `PONG` carrying `server`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ping {
    pub server: String,
}

/// `CAP * ACK`: a requested capability was granted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapAck {
    pub capability: String,
}

/// `375`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotdStart;

/// `372`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Motd {
    pub message: String,
}

/// `376`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndOfMotd;

/// `353`: a page of channel member logins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameReply {
    pub channel: String,
    pub users: Vec<String>,
}

/// `366`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndOfNames {
    pub channel: String,
}

/// `421`: the server did not understand a command we sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownCommand {
    pub command: String,
}

/// A user (possibly the bot itself) joined a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub channel: String,
    pub username: String,
}

/// A user (possibly the bot itself) left a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    pub channel: String,
    pub username: String,
}

/// A chat line (`PRIVMSG`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chat {
    /// Channel login, without `#`.
    pub channel: String,
    /// Numeric id of the channel's owner.
    pub room_id: u64,
    pub user_id: u64,
    /// Sender login.
    pub username: String,
    pub display_name: Option<String>,
    pub message_id: Uuid,
    /// Message text; for `/me` messages the `ACTION` wrapper is removed.
    pub text: String,
    pub is_highlighted: bool,
    pub is_moderator: bool,
    pub is_broadcaster: bool,
    /// Sent with `/me`.
    pub is_me: bool,
    pub bits: u32,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A gifted subscription (`USERNOTICE` with `msg-id` `subgift` or `anonsubgift`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GiftSub {
    pub channel: String,
    pub room_id: u64,
    pub sender_id: u64,
    pub sender_login: String,
    pub sender_display_name: String,
    pub recipient_id: u64,
    pub recipient_login: String,
    pub recipient_display_name: String,
    pub cumulative_months: u32,
    /// Months gifted at once. Twitch omits the tag for single-month gifts,
    /// so an absent tag means [`GiftSub::DEFAULT_GIFT_MONTHS`].
    pub gift_months: u32,
    /// The unescaped `system-msg` text.
    pub message: String,
}

impl GiftSub {
    /// Gift length assumed when `msg-param-gift-months` is absent.
    pub const DEFAULT_GIFT_MONTHS: u32 = 1;
}

/// `CLEARCHAT`: a user was banned or timed out, or the whole chat was cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearChat {
    pub channel: String,
    /// The affected login; `None` when the whole channel was cleared.
    pub user: Option<String>,
    /// Timeout length; `None` for a permanent ban or a channel clear.
    pub ban_duration_seconds: Option<u32>,
}

/// `CLEARMSG`: a single message was deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearMsg {
    pub channel: String,
    pub login: String,
    pub target_message_id: Uuid,
    pub message: String,
}

/// `ROOMSTATE`. Partial updates only carry the changed tags; absent tags
/// read as "off".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomState {
    pub channel: String,
    pub emote_only: bool,
    pub followers_only: bool,
    pub r9k: bool,
    pub slow_seconds: u32,
    pub subs_only: bool,
}

/// `RECONNECT`: the server is about to close the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconnect;

/// Every event the client understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Welcome(Welcome),
    Ping(Ping),
    CapAck(CapAck),
    MotdStart(MotdStart),
    Motd(Motd),
    EndOfMotd(EndOfMotd),
    NameReply(NameReply),
    EndOfNames(EndOfNames),
    UnknownCommand(UnknownCommand),
    Join(Join),
    Part(Part),
    Chat(Chat),
    GiftSub(GiftSub),
    ClearChat(ClearChat),
    ClearMsg(ClearMsg),
    RoomState(RoomState),
    Reconnect(Reconnect),
}

macro_rules! event_kinds {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Event {
                fn from(event: $kind) -> Self {
                    Event::$kind(event)
                }
            }

            impl TryFrom<Event> for $kind {
                type Error = Event;

                fn try_from(event: Event) -> Result<Self, Self::Error> {
                    match event {
                        Event::$kind(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*

        impl Event {
            /// Name of the event kind, for logging.
            pub fn kind(&self) -> &'static str {
                match self {
                    $(Event::$kind(_) => stringify!($kind),)*
                }
            }
        }
    };
}

event_kinds!(
    Welcome,
    Ping,
    CapAck,
    MotdStart,
    Motd,
    EndOfMotd,
    NameReply,
    EndOfNames,
    UnknownCommand,
    Join,
    Part,
    Chat,
    GiftSub,
    ClearChat,
    ClearMsg,
    RoomState,
    Reconnect,
);

impl Event {
    /// Channel the event is scoped to, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Event::NameReply(e) => Some(&e.channel),
            Event::EndOfNames(e) => Some(&e.channel),
            Event::Join(e) => Some(&e.channel),
            Event::Part(e) => Some(&e.channel),
            Event::Chat(e) => Some(&e.channel),
            Event::GiftSub(e) => Some(&e.channel),
            Event::ClearChat(e) => Some(&e.channel),
            Event::ClearMsg(e) => Some(&e.channel),
            Event::RoomState(e) => Some(&e.channel),
            Event::Welcome(_)
            | Event::Ping(_)
            | Event::CapAck(_)
            | Event::MotdStart(_)
            | Event::Motd(_)
            | Event::EndOfMotd(_)
            | Event::UnknownCommand(_)
            | Event::Reconnect(_) => None,
        }
    }
}
