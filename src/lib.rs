//! # slirc-client
//!
//! The core of an async IRC client: a spec-correct message grammar with
//! full IRCv3 tag escaping, line-framed connection plumbing over any
//! `AsyncRead + AsyncWrite` byte stream, and a protocol driver that runs
//! the connection-lifetime state machine — registration, capability
//! negotiation, nick collision recovery, liveness pings, outbound pacing,
//! and dispatch to user handlers and state trackers.
//!
//! Transport establishment (TCP, TLS, SOCKS) is deliberately out of scope:
//! the client consumes an already-connected stream and never opens sockets.
//!
//! ## Parsing messages
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let msg: Message = raw.parse().expect("valid IRC message");
//!
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.trailing(), "Hello!");
//! assert_eq!(msg.tags["time"], "2023-01-01T12:00:00Z");
//! ```
//!
//! ## Building messages
//!
//! ```rust
//! use slirc_client::{Message, Prefix};
//!
//! let msg = Message::privmsg("#rust", "Hello, world!")
//!     .with_tag("msgid", Some("abc123"))
//!     .with_prefix(Prefix::parse("bot!bot@example.com"));
//!
//! let wire = msg.to_string();
//! assert_eq!(wire.parse::<Message>().unwrap(), msg);
//! ```
//!
//! ## Running a client
//!
//! ```no_run
//! use std::time::Duration;
//! use slirc_client::{Client, ClientConfig};
//!
//! # async fn example(stream: tokio::net::TcpStream) -> slirc_client::Result<()> {
//! let mut config = ClientConfig::new("mybot", "mybot", "An example bot");
//! config.ping_frequency = Duration::from_secs(60);
//! config.ping_timeout = Duration::from_secs(10);
//! config.enable_tracker = true;
//!
//! let client = Client::new(stream, config);
//! client.cap_request("multi-prefix", false);
//! client.run().await
//! # }
//! ```

#![deny(clippy::all)]

pub mod client;
pub mod conn;
pub mod error;
pub mod handler;
pub mod isupport;
pub mod mask;
pub mod message;
pub mod prefix;
pub mod tracker;

pub use self::client::{Client, ClientConfig, SendLimiter};
pub use self::conn::{Conn, DebugCallback, Reader, Writer};
pub use self::error::{ClientError, MessageParseError, Result, TrackerError};
pub use self::handler::{FilterFn, Handler, HandlerFn, OutboundFilter};
pub use self::isupport::IsupportTracker;
pub use self::mask::mask_to_regex;
pub use self::message::Message;
pub use self::prefix::Prefix;
pub use self::tracker::{ChannelState, Tracker};
