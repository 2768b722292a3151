//! IRC message model: parsing, construction, and serialization.
//!
//! A [`Message`] owns all of its data, so `Clone` is a deep copy: mutating a
//! clone's tags or params never affects the original.

mod parser;
pub mod tags;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;
use crate::prefix::Prefix;

use self::tags::{escape_tag_value, unescape_tag_value};

/// A parsed IRC message.
///
/// ```
/// use slirc_client::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.command, "PRIVMSG");
/// assert_eq!(msg.trailing(), "Hello!");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 message tags. Values are stored unescaped; escaping is applied
    /// on serialization. Output order is the map's order, not wire order.
    pub tags: BTreeMap<String, String>,
    /// The message source, if any.
    pub prefix: Option<Prefix>,
    /// The command verb or 3-digit numeric, preserved verbatim.
    pub command: String,
    /// Ordered parameters. Only the last may contain spaces.
    pub params: Vec<String>,
}

impl Message {
    /// Create a message with the given command and no parameters.
    pub fn new(command: impl Into<String>) -> Self {
        Message {
            command: command.into(),
            ..Message::default()
        }
    }

    /// Parse a message from its wire form, panicking on error.
    ///
    /// For string literals that are statically known to be valid; everything
    /// else should go through `line.parse::<Message>()`.
    pub fn must_parse(line: &str) -> Self {
        line.parse()
            .unwrap_or_else(|e| panic!("must_parse {:?}: {}", line, e))
    }

    /// A PRIVMSG to the given target.
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::new("PRIVMSG")
            .with_param(target)
            .with_param(text)
    }

    /// A NOTICE to the given target.
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::new("NOTICE")
            .with_param(target)
            .with_param(text)
    }

    /// A JOIN for the given channel.
    pub fn join(channel: impl Into<String>) -> Self {
        Message::new("JOIN").with_param(channel)
    }

    /// A PING carrying the given token.
    pub fn ping(token: impl Into<String>) -> Self {
        Message::new("PING").with_param(token)
    }

    /// A PONG carrying the given token.
    pub fn pong(token: impl Into<String>) -> Self {
        Message::new("PONG").with_param(token)
    }

    /// Append a parameter.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Set a tag. `None` stores an empty value, serialized as a bare key.
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.tags
            .insert(key.into(), value.unwrap_or_default().to_string());
        self
    }

    /// Set the prefix.
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// The last parameter, or `""` if there are none.
    pub fn trailing(&self) -> &str {
        self.params.last().map(String::as_str).unwrap_or_default()
    }

    /// The nickname (or server name) of the message source, if any.
    pub fn source_name(&self) -> Option<&str> {
        self.prefix
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = parser::split_line(s)?;

        let mut tags = BTreeMap::new();
        if let Some(raw_tags) = raw.tags {
            for entry in raw_tags.split(';').filter(|e| !e.is_empty()) {
                let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
                tags.insert(key.to_string(), unescape_tag_value(value));
            }
        }

        Ok(Message {
            tags,
            prefix: raw.prefix.map(Prefix::parse),
            command: raw.command.to_string(),
            params: raw.params.into_iter().map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::fmt::Write;

        if !self.tags.is_empty() {
            f.write_char('@')?;
            for (i, (key, value)) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_char(';')?;
                }
                f.write_str(key)?;
                if !value.is_empty() {
                    f.write_char('=')?;
                    escape_tag_value(f, value)?;
                }
            }
            f.write_char(' ')?;
        }

        if let Some(prefix) = &self.prefix {
            if !prefix.is_empty() {
                write!(f, ":{} ", prefix)?;
            }
        }

        f.write_str(&self.command)?;

        if let Some((last, rest)) = self.params.split_last() {
            for param in rest {
                write!(f, " {}", param)?;
            }
            // Trailing form whenever the plain form would not survive a
            // round trip.
            if last.is_empty() || last.starts_with(':') || last.contains(' ') {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }

        Ok(())
    }
}
