//! Channel membership tracking.
//!
//! [`Tracker`] watches the incoming message stream and maintains the set of
//! channels the client is in, their topics, and their user sets. It consumes
//! `001`, `332`, `353`, `JOIN`, `TOPIC`, `PART`, `KICK`, `QUIT`, and `NICK`;
//! everything else is ignored.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::TrackerError;
use crate::isupport::IsupportTracker;
use crate::message::Message;

/// The observed state of one channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Channel name, including its sigil.
    pub name: String,
    /// Current topic, empty until a 332 or TOPIC arrives.
    pub topic: String,
    /// Nicknames present in the channel. Never contains duplicates.
    pub users: HashSet<String>,
}

impl ChannelState {
    fn new(name: &str) -> Self {
        ChannelState {
            name: name.to_string(),
            ..ChannelState::default()
        }
    }
}

struct TrackerState {
    channels: HashMap<String, ChannelState>,
    current_nick: String,
}

/// Tracks joined channels, their topics, and their user sets.
///
/// State becomes eventually consistent with the server: a channel exists
/// from the client's own JOIN until its own PART or KICK. All mutations are
/// serialized under an internal lock; lookups return owned snapshots.
pub struct Tracker {
    isupport: Arc<IsupportTracker>,
    state: RwLock<TrackerState>,
}

impl Tracker {
    /// Create a tracker backed by the given ISUPPORT registry (used to strip
    /// prefix symbols from 353 name lists).
    pub fn new(isupport: Arc<IsupportTracker>) -> Self {
        Tracker {
            isupport,
            state: RwLock::new(TrackerState {
                channels: HashMap::new(),
                current_nick: String::new(),
            }),
        }
    }

    /// Names of all currently tracked channels.
    pub fn list_channels(&self) -> Vec<String> {
        self.state
            .read()
            .expect("tracker lock poisoned")
            .channels
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of a channel's state, or `None` if untracked.
    pub fn get_channel(&self, name: &str) -> Option<ChannelState> {
        self.state
            .read()
            .expect("tracker lock poisoned")
            .channels
            .get(name)
            .cloned()
    }

    /// Feed a message into the tracker.
    ///
    /// Errors are non-fatal: the caller may log and continue.
    pub fn handle(&self, msg: &Message) -> Result<(), TrackerError> {
        match msg.command.as_str() {
            "001" => self.handle_welcome(msg),
            "332" => self.handle_rpl_topic(msg),
            "353" => self.handle_rpl_namreply(msg),
            "JOIN" => self.handle_join(msg),
            "TOPIC" => self.handle_topic(msg),
            "PART" => self.handle_part(msg),
            "KICK" => self.handle_kick(msg),
            "QUIT" => self.handle_quit(msg),
            "NICK" => self.handle_nick(msg),
            _ => Ok(()),
        }
    }

    fn handle_welcome(&self, msg: &Message) -> Result<(), TrackerError> {
        let nick = msg
            .params
            .first()
            .ok_or(TrackerError::MalformedMessage("RPL_WELCOME"))?;

        let mut state = self.state.write().expect("tracker lock poisoned");
        state.current_nick = nick.clone();
        Ok(())
    }

    fn handle_join(&self, msg: &Message) -> Result<(), TrackerError> {
        // First param rather than trailing: extended-join carries account
        // and realname after the channel.
        let channel = msg
            .params
            .first()
            .ok_or(TrackerError::MalformedMessage("JOIN"))?;
        let user = msg
            .source_name()
            .ok_or(TrackerError::MalformedMessage("JOIN"))?;

        let mut state = self.state.write().expect("tracker lock poisoned");
        if !state.channels.contains_key(channel) {
            if user != state.current_nick {
                return Err(TrackerError::UnknownChannel(channel.clone()));
            }
            state
                .channels
                .insert(channel.clone(), ChannelState::new(channel));
        }

        state
            .channels
            .get_mut(channel)
            .expect("channel inserted above")
            .users
            .insert(user.to_string());
        Ok(())
    }

    fn handle_topic(&self, msg: &Message) -> Result<(), TrackerError> {
        if msg.params.len() != 2 {
            return Err(TrackerError::MalformedMessage("TOPIC"));
        }
        let channel = &msg.params[0];
        let topic = msg.trailing();

        let mut state = self.state.write().expect("tracker lock poisoned");
        match state.channels.get_mut(channel) {
            Some(ch) => {
                ch.topic = topic.to_string();
                Ok(())
            }
            None => Err(TrackerError::UnknownChannel(channel.clone())),
        }
    }

    fn handle_rpl_topic(&self, msg: &Message) -> Result<(), TrackerError> {
        if msg.params.len() != 3 {
            return Err(TrackerError::MalformedMessage("RPL_TOPIC"));
        }
        let channel = &msg.params[1];
        let topic = msg.trailing();

        let mut state = self.state.write().expect("tracker lock poisoned");
        match state.channels.get_mut(channel) {
            Some(ch) => {
                ch.topic = topic.to_string();
                Ok(())
            }
            None => Err(TrackerError::UnknownChannel(channel.clone())),
        }
    }

    fn handle_part(&self, msg: &Message) -> Result<(), TrackerError> {
        let channel = msg
            .params
            .first()
            .ok_or(TrackerError::MalformedMessage("PART"))?;
        let user = msg
            .source_name()
            .ok_or(TrackerError::MalformedMessage("PART"))?;

        let mut state = self.state.write().expect("tracker lock poisoned");
        if !state.channels.contains_key(channel) {
            return Err(TrackerError::UnknownChannel(channel.clone()));
        }

        // Our own PART drops the whole channel; anyone else just leaves it.
        if user == state.current_nick {
            state.channels.remove(channel);
        } else {
            state
                .channels
                .get_mut(channel)
                .expect("checked above")
                .users
                .remove(user);
        }
        Ok(())
    }

    fn handle_kick(&self, msg: &Message) -> Result<(), TrackerError> {
        if msg.params.len() < 2 {
            return Err(TrackerError::MalformedMessage("KICK"));
        }
        let channel = &msg.params[0];
        let victim = &msg.params[1];

        let mut state = self.state.write().expect("tracker lock poisoned");
        if !state.channels.contains_key(channel) {
            return Err(TrackerError::UnknownChannel(channel.clone()));
        }

        if *victim == state.current_nick {
            state.channels.remove(channel);
        } else {
            state
                .channels
                .get_mut(channel)
                .expect("checked above")
                .users
                .remove(victim);
        }
        Ok(())
    }

    fn handle_quit(&self, msg: &Message) -> Result<(), TrackerError> {
        let user = msg
            .source_name()
            .ok_or(TrackerError::MalformedMessage("QUIT"))?;

        let mut state = self.state.write().expect("tracker lock poisoned");
        for channel in state.channels.values_mut() {
            channel.users.remove(user);
        }
        Ok(())
    }

    fn handle_nick(&self, msg: &Message) -> Result<(), TrackerError> {
        let new_nick = msg
            .params
            .first()
            .ok_or(TrackerError::MalformedMessage("NICK"))?
            .clone();
        let old_nick = msg
            .source_name()
            .ok_or(TrackerError::MalformedMessage("NICK"))?
            .to_string();

        let mut state = self.state.write().expect("tracker lock poisoned");
        if state.current_nick == old_nick {
            state.current_nick = new_nick.clone();
        }

        for channel in state.channels.values_mut() {
            if channel.users.remove(&old_nick) {
                channel.users.insert(new_nick.clone());
            }
        }
        Ok(())
    }

    fn handle_rpl_namreply(&self, msg: &Message) -> Result<(), TrackerError> {
        if msg.params.len() != 4 {
            return Err(TrackerError::MalformedMessage("RPL_NAMREPLY"));
        }
        let channel = &msg.params[2];
        let names = msg.trailing();

        let prefixes = self
            .isupport
            .get_prefix_map()
            .ok_or(TrackerError::InvalidPrefixFormat)?;

        let mut state = self.state.write().expect("tracker lock poisoned");
        if !state.channels.contains_key(channel) {
            return Err(TrackerError::UnknownChannel(channel.clone()));
        }

        for name in names.split_whitespace() {
            let stripped = name.trim_start_matches(|c| prefixes.contains_key(&c));
            if stripped.is_empty() {
                continue;
            }
            // Our own nick is added via JOIN.
            if stripped == state.current_nick {
                continue;
            }
            state
                .channels
                .get_mut(channel)
                .expect("checked above")
                .users
                .insert(stripped.to_string());
        }
        Ok(())
    }
}
