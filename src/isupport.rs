//! RPL_ISUPPORT (numeric 005) tracking.
//!
//! Servers advertise their capabilities and limits through 005 tokens of
//! the form `KEY` or `KEY=value`. [`IsupportTracker`] accumulates them over
//! the connection lifetime and answers typed queries.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::TrackerError;
use crate::message::Message;

/// Accumulates ISUPPORT advertisements and answers typed queries.
///
/// All accessors may be called concurrently with the handle path; reads
/// share the lock, writes serialize.
pub struct IsupportTracker {
    data: RwLock<HashMap<String, String>>,
}

impl Default for IsupportTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IsupportTracker {
    /// Create a tracker seeded with `PREFIX=(ov)@+` so prefix-dependent
    /// consumers work before the first 005 arrives.
    pub fn new() -> Self {
        let mut data = HashMap::new();
        data.insert("PREFIX".to_string(), "(ov)@+".to_string());
        IsupportTracker {
            data: RwLock::new(data),
        }
    }

    /// Feed a message into the tracker. Anything that is not an 005 is
    /// ignored.
    ///
    /// An 005 carries `<target> <token>... :<human-readable suffix>`; the
    /// middle tokens are stored, replacing any prior value for the same key.
    pub fn handle(&self, msg: &Message) -> Result<(), TrackerError> {
        if msg.command != "005" {
            return Ok(());
        }

        if msg.params.len() < 2 {
            return Err(TrackerError::MalformedIsupport);
        }

        let mut data = self.data.write().expect("isupport lock poisoned");
        for param in &msg.params[1..msg.params.len() - 1] {
            let (key, value) = param.split_once('=').unwrap_or((param.as_str(), ""));
            data.insert(key.to_ascii_uppercase(), value.to_string());
        }

        Ok(())
    }

    /// Check a boolean ISUPPORT value. For ISUPPORT, true simply means the
    /// key exists.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.data
            .read()
            .expect("isupport lock poisoned")
            .contains_key(&key.to_ascii_uppercase())
    }

    /// Get a raw ISUPPORT value.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.data
            .read()
            .expect("isupport lock poisoned")
            .get(&key.to_ascii_uppercase())
            .cloned()
    }

    /// Get a list ISUPPORT value, split on `,`.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_raw(key)
            .map(|value| value.split(',').map(str::to_string).collect())
    }

    /// Get a map ISUPPORT value: `,`-separated entries of `subkey:subvalue`.
    ///
    /// Returns `None` if the key is absent or any entry lacks a `:`.
    pub fn get_map(&self, key: &str) -> Option<HashMap<String, String>> {
        let value = self.get_raw(key)?;

        let mut ret = HashMap::new();
        for entry in value.split(',') {
            let (subkey, subvalue) = entry.split_once(':')?;
            ret.insert(subkey.to_string(), subvalue.to_string());
        }

        Some(ret)
    }

    /// Get the PREFIX symbol-to-mode mapping.
    ///
    /// The value has the form `(modes)symbols`, e.g. `(qaohv)~&@%+`; the
    /// result maps each symbol to its mode. Requires a leading `(` and equal
    /// mode/symbol counts.
    pub fn get_prefix_map(&self) -> Option<HashMap<char, char>> {
        let prefix = self.get_raw("PREFIX")?;

        let rest = prefix.strip_prefix('(')?;
        let (modes, symbols) = rest.split_once(')')?;

        let modes: Vec<char> = modes.chars().collect();
        let symbols: Vec<char> = symbols.chars().collect();
        if modes.len() != symbols.len() {
            return None;
        }

        Some(symbols.into_iter().zip(modes).collect())
    }
}
