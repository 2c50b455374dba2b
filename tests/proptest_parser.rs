//! Property-based tests for wire line parsing.
//!
//! Uses proptest to generate random line components and verify that:
//! 1. Parsing never panics, whatever the input
//! 2. Serialized messages can be re-parsed (roundtrip)
//! 3. Frame boundaries never change the lines a `LineBuffer` yields

use proptest::prelude::*;
use tmi_ebooks::{Command, Event, LineBuffer, Message};

// =============================================================================
// STRATEGIES
// =============================================================================

/// Twitch login: lowercase letters, digits and underscores.
fn login_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9_]{0,24}").expect("valid regex")
}

/// Text that doesn't contain CR/LF (which would end the line).
fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9\\-]{0,30}").expect("valid regex")
}

/// Tag value in wire form, kept free of separators.
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9._\\-/,#]{0,100}").expect("valid regex")
}

fn source_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("tmi.twitch.tv".to_string()),
        login_strategy().prop_map(|login| format!("{0}!{0}@{0}.tmi.twitch.tv", login)),
    ]
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec![
            "PRIVMSG",
            "JOIN",
            "PART",
            "PING",
            "USERNOTICE",
            "CLEARCHAT",
            "CLEARMSG",
            "ROOMSTATE",
            "RECONNECT",
            "CAP",
            "NOTICE",
        ])
        .prop_map(str::to_owned),
        prop::string::string_regex("[0-9]{3}").expect("valid regex"),
    ]
}

/// Middle parameter: no spaces, never starts with `:`.
fn middle_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[#*=a-zA-Z0-9_][a-zA-Z0-9_:.]{0,24}").expect("valid regex")
}

fn message_strategy() -> impl Strategy<Value = Message> {
    (
        prop::collection::hash_map(tag_key_strategy(), tag_value_strategy(), 0..15),
        prop::option::of(source_strategy()),
        command_strategy(),
        prop::collection::vec(middle_strategy(), 0..4),
        prop::option::of(text_strategy()),
    )
        .prop_map(|(tags, source, command, mut params, trailing)| {
            params.extend(trailing);
            Message {
                tags,
                source,
                command,
                params,
            }
        })
}

/// Printable ASCII lines, so any byte offset is a valid split point.
fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::string::string_regex("[ -~]{1,80}").expect("valid regex"),
        1..10,
    )
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// parse → serialize → parse = identity
    #[test]
    fn message_roundtrip(msg in message_strategy()) {
        let serialized = msg.to_string();
        let parsed: Message = serialized.parse()
            .expect("Serialized message should be parseable");
        prop_assert_eq!(&msg, &parsed, "Roundtrip failed for serialized: {}", serialized);
    }

    /// The parser returns an error rather than panicking on garbage.
    #[test]
    fn parse_never_panics(line in any::<String>()) {
        let _ = Message::parse(&line);
    }

    /// Classification of any parsed line returns instead of panicking.
    #[test]
    fn classify_never_panics(msg in message_strategy()) {
        let _ = Event::classify(&msg);
    }

    /// Chat text survives serialization verbatim, colons and spaces included.
    #[test]
    fn privmsg_text_is_verbatim(channel in login_strategy(), text in text_strategy()) {
        let line = Command::privmsg(channel.clone(), text.clone()).to_string();
        let parsed = Message::parse(&line).expect("PRIVMSG should parse");
        prop_assert_eq!(parsed.command.as_str(), "PRIVMSG");
        prop_assert_eq!(parsed.params, vec![format!("#{}", channel), text]);
    }

    /// Bare tag keys read as "1"; keyed values are kept as sent.
    #[test]
    fn bare_tags_read_as_one(
        bare in tag_key_strategy(),
        key in tag_key_strategy(),
        value in tag_value_strategy(),
    ) {
        prop_assume!(bare != key);
        let line = format!("@{};{}={} PING :tmi.twitch.tv", bare, key, value);
        let parsed = Message::parse(&line).expect("Tagged line should parse");
        prop_assert_eq!(parsed.tag(&bare), Some("1"));
        prop_assert_eq!(parsed.tag(&key), Some(value.as_str()));
    }

    #[test]
    fn source_nickname_extraction(login in login_strategy()) {
        let line = format!(":{0}!{0}@{0}.tmi.twitch.tv JOIN #dallas", login);
        let parsed = Message::parse(&line).expect("JOIN should parse");
        prop_assert_eq!(parsed.source_nickname(), Some(login.as_str()));
    }

    /// Splitting the same text into frames differently yields the same lines.
    #[test]
    fn line_buffer_ignores_frame_boundaries(
        lines in lines_strategy(),
        split in any::<prop::sample::Index>(),
    ) {
        let joined: String = lines.iter().map(|line| format!("{}\r\n", line)).collect();
        let at = split.index(joined.len() + 1);

        let mut buffer = LineBuffer::new();
        let received: Vec<String> = buffer.push(&joined[..at])
            .into_iter()
            .chain(buffer.push(&joined[at..]))
            .map(|line| line.expect("short lines are accepted"))
            .collect();

        prop_assert_eq!(received, lines);
        prop_assert_eq!(buffer.pending(), "");
    }
}
