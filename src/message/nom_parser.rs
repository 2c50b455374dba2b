//! Nom-based wire line parser.
//!
//! This module splits a wire line into its tag block, source, command and
//! parameters using the nom parser combinator library. It borrows from the
//! input; [`Message`](super::Message) owns the result.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::{context, ErrorKind, ParseError, VerboseError},
    sequence::preceded,
    IResult,
};

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse the tag block (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context("parsing message tags", preceded(char('@'), take_until(" ")))(input)
}

/// Parse the message source (the part after `:` and before the first space).
fn parse_source(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message source",
        preceded(char(':'), take_while1(|c| c != ' ')),
    )(input)
}

/// Parse the command name (letters for named commands, digits for numerics).
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing command",
        take_while1(|c: char| c.is_ascii_alphanumeric()),
    )(input)
}

/// Parse a complete wire line into its components.
///
/// Line format:
/// ```text
/// [@tags] [:source] <command> [params...] [:trailing]
/// ```
///
/// Middle parameters are separated by single spaces. A parameter starting
/// with `:` is the trailing parameter: the colon is dropped and the rest of
/// the line, spaces included, becomes the last parameter. A bare `:` at the
/// end of the line yields an empty trailing parameter.
pub fn parse_message(input: &str) -> ParseResult<&str, ParsedMessage<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, source) = opt(parse_source)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = context("parsing required command", parse_command)(input)?;
    if !input.is_empty() && !input.starts_with(' ') {
        return Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::AlphaNumeric,
        )));
    }

    let mut params: Vec<&str> = Vec::new();
    let mut rest = input;

    while let Some(after_space) = rest.strip_prefix(' ') {
        rest = after_space;

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        let param = &rest[..end];
        rest = &rest[end..];
        if !param.is_empty() {
            params.push(param);
        }
    }

    Ok((
        rest,
        ParsedMessage {
            tags,
            source,
            command,
            params,
        },
    ))
}

/// A parsed wire line with borrowed string slices.
///
/// This is the intermediate representation produced by the nom parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage<'a> {
    /// Raw tag block (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw source (without the leading `:`), if present.
    pub source: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse a wire line into a `ParsedMessage`.
    ///
    /// Returns detailed error information for debugging failed parses.
    pub fn parse(input: &'a str) -> Result<Self, DetailedParseError> {
        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut context_info = None;
                let mut position = input.len();
                let mut kind = ErrorKind::Tag;

                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    match error_kind {
                        nom::error::VerboseErrorKind::Context(ctx) => {
                            context_info = Some(*ctx);
                        }
                        nom::error::VerboseErrorKind::Nom(ek) => {
                            kind = *ek;
                        }
                        nom::error::VerboseErrorKind::Char(_) => {
                            kind = ErrorKind::Char;
                        }
                    }
                }

                Err(DetailedParseError {
                    input: input.to_string(),
                    position,
                    context: context_info,
                    kind,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(DetailedParseError {
                input: input.to_string(),
                position: input.len(),
                context: Some("incomplete input"),
                kind: ErrorKind::Eof,
            }),
        }
    }
}

/// Detailed parse error with position and context information.
#[derive(Debug, Clone)]
pub struct DetailedParseError {
    /// The original input string that failed to parse.
    pub input: String,
    /// Byte position where parsing failed.
    pub position: usize,
    /// Context about what was being parsed when the error occurred.
    pub context: Option<&'static str>,
    /// The nom error kind.
    pub kind: ErrorKind,
}

impl std::fmt::Display for DetailedParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at position {}", self.position)?;
        if let Some(ctx) = self.context {
            write!(f, " while {}", ctx)?;
        }
        write!(f, ": {:?}", self.kind)
    }
}

impl std::error::Error for DetailedParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_command() {
        let msg = ParsedMessage::parse("RECONNECT").unwrap();
        assert_eq!(msg.command, "RECONNECT");
        assert!(msg.tags.is_none());
        assert!(msg.source.is_none());
        assert!(msg.params.is_empty());
    }

    #[test]
    fn test_parse_ping_without_tags_or_source() {
        let msg = ParsedMessage::parse("PING :tmi.twitch.tv").unwrap();
        assert_eq!(msg.command, "PING");
        assert!(msg.tags.is_none());
        assert!(msg.source.is_none());
        assert_eq!(msg.params, vec!["tmi.twitch.tv"]);
    }

    #[test]
    fn test_parse_join_with_source() {
        let msg = ParsedMessage::parse(":bar!bar@bar.tmi.twitch.tv JOIN #twitchdev").unwrap();
        assert_eq!(msg.source, Some("bar!bar@bar.tmi.twitch.tv"));
        assert_eq!(msg.command, "JOIN");
        assert_eq!(msg.params, vec!["#twitchdev"]);
    }

    #[test]
    fn test_parse_with_tags() {
        let msg =
            ParsedMessage::parse("@emote-only=0;r9k=0 :tmi.twitch.tv ROOMSTATE #dallas").unwrap();
        assert_eq!(msg.tags, Some("emote-only=0;r9k=0"));
        assert_eq!(msg.source, Some("tmi.twitch.tv"));
        assert_eq!(msg.command, "ROOMSTATE");
        assert_eq!(msg.params, vec!["#dallas"]);
    }

    #[test]
    fn test_parse_trailing_keeps_colons_and_spaces() {
        let msg = ParsedMessage::parse(":a!a@a PRIVMSG #ch :hey :) look: here").unwrap();
        assert_eq!(msg.params, vec!["#ch", "hey :) look: here"]);
    }

    #[test]
    fn test_parse_numeric_reply() {
        let msg = ParsedMessage::parse(":tmi.twitch.tv 001 bot :Welcome, GLHF!").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["bot", "Welcome, GLHF!"]);
    }

    #[test]
    fn test_parse_cap_ack() {
        let msg = ParsedMessage::parse(":tmi.twitch.tv CAP * ACK :twitch.tv/tags").unwrap();
        assert_eq!(msg.command, "CAP");
        assert_eq!(msg.params, vec!["*", "ACK", "twitch.tv/tags"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let msg = ParsedMessage::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(msg.params, vec!["#channel", ""]);
    }

    #[test]
    fn test_parse_ignores_repeated_spaces() {
        let msg = ParsedMessage::parse("CAP  *  ACK").unwrap();
        assert_eq!(msg.params, vec!["*", "ACK"]);
    }

    #[test]
    fn test_parse_rejects_missing_command() {
        assert!(ParsedMessage::parse("").is_err());
        assert!(ParsedMessage::parse(":tmi.twitch.tv").is_err());
        assert!(ParsedMessage::parse("@a=b").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_command() {
        let err = ParsedMessage::parse("PRIV$MSG #ch :hi").unwrap_err();
        assert_eq!(err.position, 4);
    }
}
