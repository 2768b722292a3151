//! Line splitting for the IRC message grammar.
//!
//! This module slices a raw line into its sections (tags, prefix, command,
//! params, trailing) without allocating. The owned [`Message`](super::Message)
//! type is assembled from the result by `FromStr`.

use nom::{
    bytes::complete::take_until,
    character::complete::char,
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::MessageParseError;

/// Message sections borrowed from the input line.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct RawMessage<'a> {
    pub tags: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

/// The tags section: `@` up to (and consuming) the next space.
fn tags_section(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), terminated(take_until(" "), char(' ')))(input)
}

/// The prefix section: `:` up to (and consuming) the next space.
fn prefix_section(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), terminated(take_until(" "), char(' ')))(input)
}

/// Split a line into raw message sections.
///
/// Leading and trailing whitespace is trimmed first. The command is
/// preserved verbatim; case folding is the caller's concern.
pub(super) fn split_line(input: &str) -> Result<RawMessage<'_>, MessageParseError> {
    let line = input.trim();
    if line.is_empty() {
        return Err(MessageParseError::EmptyMessage);
    }

    let (rest, tags) = if line.starts_with('@') {
        let (rest, tags) = tags_section(line)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                MessageParseError::MissingDataAfterTags
            })?;
        (rest, Some(tags))
    } else {
        (line, None)
    };

    let rest = rest.trim_start_matches(' ');
    let (rest, prefix) = if rest.starts_with(':') {
        let (rest, prefix) = prefix_section(rest)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                MessageParseError::MissingDataAfterPrefix
            })?;
        (rest, Some(prefix))
    } else {
        (rest, None)
    };

    // The first ` :` starts the trailing param; everything before it is
    // space-separated fields with empties discarded.
    let (head, trailing) = match rest.find(" :") {
        Some(i) => (&rest[..i], Some(&rest[i + 2..])),
        None => (rest, None),
    };

    let mut fields = head.split(' ').filter(|f| !f.is_empty());
    let command = fields.next().ok_or(MessageParseError::MissingCommand)?;
    let mut params: Vec<&str> = fields.collect();
    if let Some(trailing) = trailing {
        params.push(trailing);
    }

    Ok(RawMessage {
        tags,
        prefix,
        command,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_command() {
        let raw = split_line("PING").unwrap();
        assert_eq!(raw.command, "PING");
        assert!(raw.tags.is_none());
        assert!(raw.prefix.is_none());
        assert!(raw.params.is_empty());
    }

    #[test]
    fn test_split_command_with_params() {
        let raw = split_line("PRIVMSG #channel :Hello, world!").unwrap();
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params, vec!["#channel", "Hello, world!"]);
    }

    #[test]
    fn test_split_with_prefix() {
        let raw = split_line(":nick!user@host PRIVMSG #channel :Hello").unwrap();
        assert_eq!(raw.prefix, Some("nick!user@host"));
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params, vec!["#channel", "Hello"]);
    }

    #[test]
    fn test_split_with_tags() {
        let raw = split_line("@time=2023-01-01T00:00:00Z :nick PRIVMSG #ch :Hi").unwrap();
        assert_eq!(raw.tags, Some("time=2023-01-01T00:00:00Z"));
        assert_eq!(raw.prefix, Some("nick"));
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params, vec!["#ch", "Hi"]);
    }

    #[test]
    fn test_split_trims_whitespace() {
        let raw = split_line("  PING :server\r\n").unwrap();
        assert_eq!(raw.command, "PING");
        assert_eq!(raw.params, vec!["server"]);
    }

    #[test]
    fn test_split_collapses_repeated_spaces() {
        let raw = split_line("USER  guest  0  * :Real Name").unwrap();
        assert_eq!(raw.command, "USER");
        assert_eq!(raw.params, vec!["guest", "0", "*", "Real Name"]);
    }

    #[test]
    fn test_split_empty_trailing() {
        let raw = split_line("PRIVMSG #channel :").unwrap();
        assert_eq!(raw.params, vec!["#channel", ""]);
    }

    #[test]
    fn test_split_trailing_keeps_later_colons() {
        let raw = split_line("PRIVMSG #ch :one :two :three").unwrap();
        assert_eq!(raw.params, vec!["#ch", "one :two :three"]);
    }

    #[test]
    fn test_split_empty_input() {
        assert_eq!(split_line(""), Err(MessageParseError::EmptyMessage));
        assert_eq!(split_line("   \r\n"), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn test_split_tags_without_data() {
        assert_eq!(
            split_line("@id=123"),
            Err(MessageParseError::MissingDataAfterTags)
        );
    }

    #[test]
    fn test_split_prefix_without_data() {
        assert_eq!(
            split_line(":nick!user@host"),
            Err(MessageParseError::MissingDataAfterPrefix)
        );
        assert_eq!(
            split_line("@id=123 :nick"),
            Err(MessageParseError::MissingDataAfterPrefix)
        );
    }

    #[test]
    fn test_split_missing_command() {
        assert_eq!(
            split_line(":nick  :trailing only"),
            Err(MessageParseError::MissingCommand)
        );
    }
}
