//! Message → event classification.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ClassifyError;
use crate::message::tags::unescape_tag_value;
use crate::Message;

use super::*;

/// Prefix and suffix wrapping a `/me` message.
const ACTION_PREFIX: &str = "\u{1}ACTION ";
const ACTION_SUFFIX: char = '\u{1}';

/// Typed access to a message's tags and parameters that reports which
/// piece was missing.
struct Fields<'a> {
    msg: &'a Message,
}

impl<'a> Fields<'a> {
    fn missing_tag(&self, tag: &'static str) -> ClassifyError {
        ClassifyError::MissingTag {
            command: self.msg.command.clone(),
            tag,
        }
    }

    fn tag(&self, key: &'static str) -> Result<&'a str, ClassifyError> {
        self.msg.tag(key).ok_or_else(|| self.missing_tag(key))
    }

    fn parse_tag<T: FromStr>(&self, key: &'static str) -> Result<T, ClassifyError> {
        let raw = self.tag(key)?;
        raw.parse().map_err(|_| ClassifyError::InvalidTag {
            tag: key,
            value: raw.to_owned(),
        })
    }

    fn parse_opt_tag<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ClassifyError> {
        match self.msg.tag(key) {
            Some(_) => self.parse_tag(key).map(Some),
            None => Ok(None),
        }
    }

    /// Tag value unescaped; empty values read as absent.
    fn text_tag(&self, key: &'static str) -> Option<String> {
        self.msg
            .tag(key)
            .filter(|value| !value.is_empty())
            .map(unescape_tag_value)
    }

    fn flag(&self, key: &'static str) -> bool {
        self.msg.tag(key).is_some_and(|value| value == "1")
    }

    fn param(&self, index: usize) -> Result<&'a str, ClassifyError> {
        self.msg
            .param(index)
            .ok_or_else(|| ClassifyError::MissingParameter {
                command: self.msg.command.clone(),
                index,
            })
    }

    fn channel(&self, index: usize) -> Result<String, ClassifyError> {
        self.param(index)
            .map(|param| param.trim_start_matches('#').to_owned())
    }

    fn nickname(&self) -> Result<String, ClassifyError> {
        self.msg
            .source_nickname()
            .filter(|nick| !nick.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| ClassifyError::MissingSource {
                command: self.msg.command.clone(),
            })
    }
}

impl Event {
    /// Classify a parsed message.
    ///
    /// Returns `Ok(None)` for commands the client does not model (and for
    /// `CAP` replies other than `ACK`, or `USERNOTICE`s other than gifted
    /// subscriptions). A recognized command that lacks something its event
    /// needs is an error.
    pub fn classify(msg: &Message) -> Result<Option<Event>, ClassifyError> {
        let fields = Fields { msg };

        let event = match msg.command.as_str() {
            "001" => Welcome.into(),
            "372" => Motd {
                message: fields.param(1)?.to_owned(),
            }
            .into(),
            "375" => MotdStart.into(),
            "376" => EndOfMotd.into(),
            "353" => NameReply {
                channel: fields.channel(2)?,
                users: fields
                    .param(3)?
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect(),
            }
            .into(),
            "366" => EndOfNames {
                channel: fields.channel(1)?,
            }
            .into(),
            "421" => UnknownCommand {
                command: fields.param(1)?.to_owned(),
            }
            .into(),
            "PING" => Ping {
                server: fields.param(0)?.to_owned(),
            }
            .into(),
            "CAP" => {
                if fields.param(1)? != "ACK" {
                    return Ok(None);
                }
                CapAck {
                    capability: fields.param(2)?.to_owned(),
                }
                .into()
            }
            "JOIN" => Join {
                channel: fields.channel(0)?,
                username: fields.nickname()?,
            }
            .into(),
            "PART" => Part {
                channel: fields.channel(0)?,
                username: fields.nickname()?,
            }
            .into(),
            "PRIVMSG" => chat(&fields)?.into(),
            "USERNOTICE" => match fields.tag("msg-id")? {
                "subgift" | "anonsubgift" => gift_sub(&fields)?.into(),
                _ => return Ok(None),
            },
            "CLEARCHAT" => ClearChat {
                channel: fields.channel(0)?,
                user: msg.param(1).map(str::to_owned),
                ban_duration_seconds: fields.parse_opt_tag("ban-duration")?,
            }
            .into(),
            "CLEARMSG" => ClearMsg {
                channel: fields.channel(0)?,
                login: fields.tag("login")?.to_owned(),
                target_message_id: fields.parse_tag("target-msg-id")?,
                message: msg.param(1).unwrap_or_default().to_owned(),
            }
            .into(),
            "ROOMSTATE" => RoomState {
                channel: fields.channel(0)?,
                emote_only: fields.flag("emote-only"),
                followers_only: fields
                    .parse_opt_tag::<i64>("followers-only")?
                    .is_some_and(|minutes| minutes >= 0),
                r9k: fields.flag("r9k"),
                slow_seconds: fields.parse_opt_tag("slow")?.unwrap_or(0),
                subs_only: fields.flag("subs-only"),
            }
            .into(),
            "RECONNECT" => Reconnect.into(),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

fn chat(fields: &Fields<'_>) -> Result<Chat, ClassifyError> {
    let channel = fields.channel(0)?;
    let username = fields.nickname()?;

    let raw_text = fields.param(1)?;
    let (text, is_me) = match raw_text
        .strip_prefix(ACTION_PREFIX)
        .and_then(|rest| rest.strip_suffix(ACTION_SUFFIX))
    {
        Some(action) => (action, true),
        None => (raw_text, false),
    };

    let is_broadcaster = username.eq_ignore_ascii_case(&channel)
        || fields
            .msg
            .tag("badges")
            .is_some_and(|badges| badges.split(',').any(|b| b.starts_with("broadcaster/")));

    let sent_at = match fields.parse_opt_tag::<i64>("tmi-sent-ts")? {
        Some(millis) => Some(DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            ClassifyError::InvalidTag {
                tag: "tmi-sent-ts",
                value: millis.to_string(),
            }
        })?),
        None => None,
    };

    Ok(Chat {
        room_id: fields.parse_tag("room-id")?,
        user_id: fields.parse_tag("user-id")?,
        display_name: fields.text_tag("display-name"),
        message_id: fields.parse_tag::<Uuid>("id")?,
        text: text.to_owned(),
        is_highlighted: fields.msg.tag("msg-id") == Some("highlighted-message"),
        is_moderator: fields.flag("mod"),
        is_broadcaster,
        is_me,
        bits: fields.parse_opt_tag("bits")?.unwrap_or(0),
        sent_at,
        channel,
        username,
    })
}

fn gift_sub(fields: &Fields<'_>) -> Result<GiftSub, ClassifyError> {
    let sender_login = fields.tag("login")?.to_owned();
    let recipient_login = fields.tag("msg-param-recipient-user-name")?.to_owned();

    Ok(GiftSub {
        channel: fields.channel(0)?,
        room_id: fields.parse_tag("room-id")?,
        sender_id: fields.parse_tag("user-id")?,
        sender_display_name: fields
            .text_tag("display-name")
            .unwrap_or_else(|| sender_login.clone()),
        sender_login,
        recipient_id: fields.parse_tag("msg-param-recipient-id")?,
        recipient_display_name: fields
            .text_tag("msg-param-recipient-display-name")
            .unwrap_or_else(|| recipient_login.clone()),
        recipient_login,
        cumulative_months: fields.parse_tag("msg-param-months")?,
        gift_months: fields
            .parse_opt_tag("msg-param-gift-months")?
            .unwrap_or(GiftSub::DEFAULT_GIFT_MONTHS),
        message: fields.text_tag("system-msg").unwrap_or_default(),
    })
}
