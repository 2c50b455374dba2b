use std::fmt::{self, Write};

use crate::message::tags::escape_tag_value;

use super::types::Command;

/// Write `#channel`, tolerating a channel that already carries the `#`.
fn write_channel(f: &mut fmt::Formatter<'_>, channel: &str) -> fmt::Result {
    f.write_char('#')?;
    f.write_str(channel.trim_start_matches('#'))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PASS(token) => {
                f.write_str("PASS ")?;
                if !token.starts_with("oauth:") {
                    f.write_str("oauth:")?;
                }
                f.write_str(token)
            }
            Command::NICK(username) => write!(f, "NICK {}", username),
            Command::CapREQ(cap) => write!(f, "CAP REQ :{}", cap),
            Command::JOIN(channel) => {
                f.write_str("JOIN ")?;
                write_channel(f, channel)
            }
            Command::PART(channel) => {
                f.write_str("PART ")?;
                write_channel(f, channel)
            }
            Command::PRIVMSG {
                channel,
                text,
                reply_to,
            } => {
                if let Some(parent) = reply_to {
                    f.write_str("@reply-parent-msg-id=")?;
                    escape_tag_value(f, &parent.to_string())?;
                    f.write_char(' ')?;
                }
                f.write_str("PRIVMSG ")?;
                write_channel(f, channel)?;
                f.write_str(" :")?;
                f.write_str(text)
            }
            Command::PONG(server) => write!(f, "PONG :{}", server),
        }
    }
}
