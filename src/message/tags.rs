//! IRCv3 message tag parsing and escaping.

use std::collections::HashMap;
use std::fmt::{Result as FmtResult, Write};

/// Split a raw tag block (without the leading `@`) into key/value pairs.
///
/// Values are kept in their escaped wire form. A bare key with no `=` gets
/// the value `"1"`; a repeated key keeps the last value.
pub fn parse_tags(raw: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for tag in raw.split(';').filter(|t| !t.is_empty()) {
        match tag.split_once('=') {
            Some((key, value)) => tags.insert(key.to_owned(), value.to_owned()),
            None => tags.insert(tag.to_owned(), "1".to_owned()),
        };
    }
    tags
}

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Reverses the escaping applied by [`escape_tag_value`]. Twitch sends
/// human-readable text such as `system-msg` with spaces encoded as `\s`.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}
