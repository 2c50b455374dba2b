use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

use super::nom_parser::ParsedMessage;
use super::tags::parse_tags;

/// One wire line, split into tags, source, command and parameters.
///
/// Tag values are kept in their escaped wire form; use
/// [`unescape_tag_value`](super::tags::unescape_tag_value) for human-readable
/// text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Message tags. Bare keys carry the value `"1"`.
    pub tags: HashMap<String, String>,
    /// Message source without the leading `:`.
    pub source: Option<String>,
    /// Command name or three-digit numeric. Never empty after a successful parse.
    pub command: String,
    /// Parameters in order; the trailing parameter, if any, is last.
    pub params: Vec<String>,
}

impl Message {
    /// Parse a single wire line. Trailing CR/LF characters are ignored.
    pub fn parse(line: &str) -> Result<Message, MessageParseError> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let parsed = ParsedMessage::parse(trimmed).map_err(|e| match e.context {
            Some(context) => MessageParseError::ParseContext {
                position: e.position,
                context: context.to_owned(),
            },
            None => MessageParseError::InvalidCommand,
        })?;

        Ok(Message {
            tags: parsed.tags.map(parse_tags).unwrap_or_default(),
            source: parsed.source.map(str::to_owned),
            command: parsed.command.to_owned(),
            params: parsed.params.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Raw value of a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Nickname part of the source: everything before the first `!`.
    ///
    /// A source without `!` (a server name) is returned whole.
    pub fn source_nickname(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(|source| source.split_once('!').map_or(source, |(nick, _)| nick))
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    /// Serialize back to wire form. Tags are written in key order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();
            f.write_str("@")?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                write!(f, "{}={}", key, self.tags[key])?;
            }
            f.write_str(" ")?;
        }

        if let Some(source) = &self.source {
            write!(f, ":{} ", source)?;
        }

        f.write_str(&self.command)?;

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let trailing =
                i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if trailing {
                write!(f, " :{}", param)?;
            } else {
                write!(f, " {}", param)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_line_endings() {
        let msg = Message::parse("PING :tmi.twitch.tv\r\n").unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["tmi.twitch.tv"]);
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(Message::parse(""), Err(MessageParseError::EmptyMessage));
        assert_eq!(Message::parse("\r\n"), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn test_parse_missing_command_reports_context() {
        match Message::parse(":tmi.twitch.tv") {
            Err(MessageParseError::ParseContext { context, .. }) => {
                assert!(context.contains("command"));
            }
            other => panic!("Expected ParseContext, got {:?}", other),
        }
    }

    #[test]
    fn test_source_nickname() {
        let msg = Message::parse(":ronni!ronni@ronni.tmi.twitch.tv PART #dallas").unwrap();
        assert_eq!(msg.source_nickname(), Some("ronni"));

        let msg = Message::parse(":tmi.twitch.tv RECONNECT").unwrap();
        assert_eq!(msg.source_nickname(), Some("tmi.twitch.tv"));

        let msg = Message::parse("PING :tmi.twitch.tv").unwrap();
        assert_eq!(msg.source_nickname(), None);
    }

    #[test]
    fn test_display_writes_trailing_when_needed() {
        let msg = Message::parse(":a!a@a PRIVMSG #ch :two words").unwrap();
        assert_eq!(msg.to_string(), ":a!a@a PRIVMSG #ch :two words");

        let msg = Message::parse("JOIN #ch").unwrap();
        assert_eq!(msg.to_string(), "JOIN #ch");

        let msg = Message::parse("PRIVMSG #ch :").unwrap();
        assert_eq!(msg.to_string(), "PRIVMSG #ch :");
    }

    #[test]
    fn test_display_sorts_tags() {
        let msg = Message::parse("@mod=0;badges=;color=#FFF PRIVMSG #ch :hi there").unwrap();
        assert_eq!(msg.to_string(), "@badges=;color=#FFF;mod=0 PRIVMSG #ch :hi there");
    }
}
