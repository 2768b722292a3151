//! Capability negotiation state.
//!
//! The client registers interest with `cap_request` before `run`; during
//! startup it sends `CAP LS` plus one `CAP REQ` per requested capability
//! and arms a response counter. Each `LS`/`ACK`/`NAK` response decrements
//! the counter; when it reaches zero, `CAP END` goes out and registration
//! proceeds. Responses after that point are informational.

use std::collections::BTreeMap;

use crate::error::ClientError;

/// Negotiation status of one capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CapStatus {
    pub requested: bool,
    pub required: bool,
    pub available: bool,
    pub enabled: bool,
}

/// What the dispatch loop must do after applying a CAP response.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CapOutcome {
    /// Keep going; nothing to send.
    Continue,
    /// Negotiation finished; send `CAP END`.
    End,
}

#[derive(Debug, Default)]
pub(crate) struct CapNegotiation {
    caps: BTreeMap<String, CapStatus>,
    remaining: usize,
    ended: bool,
}

impl CapNegotiation {
    /// Register interest in a capability before startup.
    pub fn request(&mut self, name: &str, required: bool) {
        let status = self.caps.entry(name.to_string()).or_default();
        status.requested = true;
        status.required |= required;
    }

    /// Names of all requested capabilities, in stable order.
    pub fn requested(&self) -> Vec<String> {
        self.caps
            .iter()
            .filter(|(_, status)| status.requested)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Arm the response counter: one per `CAP REQ` plus one for the `LS`.
    pub fn begin(&mut self, requests: usize) {
        self.remaining = requests + 1;
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.caps.get(name).map(|s| s.available).unwrap_or(false)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.caps.get(name).map(|s| s.enabled).unwrap_or(false)
    }

    /// Apply one CAP response.
    ///
    /// `caps` is the space-separated capability list; entries may carry
    /// `=value` suffixes, which are ignored. Unknown subcommands and
    /// anything arriving after `CAP END` are informational.
    pub fn apply(&mut self, subcommand: &str, caps: &str) -> Result<CapOutcome, ClientError> {
        if self.ended || self.remaining == 0 {
            return Ok(CapOutcome::Continue);
        }

        match subcommand.to_ascii_uppercase().as_str() {
            "LS" => {
                for name in caps.split_whitespace().map(base_name) {
                    self.caps.entry(name.to_string()).or_default().available = true;
                }
                self.finish_response()
            }
            "ACK" => {
                for name in caps.split_whitespace().map(base_name) {
                    self.caps.entry(name.to_string()).or_default().enabled = true;
                }
                self.finish_response()
            }
            "NAK" => {
                let mut rejected = None;
                for name in caps.split_whitespace().map(base_name) {
                    let status = self.caps.entry(name.to_string()).or_default();
                    status.enabled = false;
                    if status.required {
                        rejected.get_or_insert_with(|| name.to_string());
                    }
                }
                if let Some(name) = rejected {
                    return Err(ClientError::CapRejected(name));
                }
                self.finish_response()
            }
            _ => Ok(CapOutcome::Continue),
        }
    }

    fn finish_response(&mut self) -> Result<CapOutcome, ClientError> {
        self.remaining -= 1;
        if self.remaining > 0 {
            return Ok(CapOutcome::Continue);
        }

        // Anything required that never made it into an ACK is a startup
        // failure.
        for (name, status) in &self.caps {
            if status.requested && status.required && !status.enabled {
                return Err(ClientError::CapNotAccepted(name.clone()));
            }
        }

        self.ended = true;
        Ok(CapOutcome::End)
    }
}

/// Strip a `=value` suffix from a capability token.
fn base_name(token: &str) -> &str {
    token.split('=').next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_negotiation() {
        let mut caps = CapNegotiation::default();
        caps.request("multi-prefix", true);
        caps.begin(1);

        assert_eq!(
            caps.apply("LS", "multi-prefix sasl").unwrap(),
            CapOutcome::Continue
        );
        assert!(caps.is_available("multi-prefix"));
        assert!(caps.is_available("sasl"));

        assert_eq!(caps.apply("ACK", "multi-prefix").unwrap(), CapOutcome::End);
        assert!(caps.is_enabled("multi-prefix"));
        assert!(!caps.is_enabled("sasl"));
    }

    #[test]
    fn test_nak_of_required_cap() {
        let mut caps = CapNegotiation::default();
        caps.request("multi-prefix", true);
        caps.begin(1);

        caps.apply("LS", "sasl").unwrap();
        let err = caps.apply("NAK", "multi-prefix").unwrap_err();
        assert!(matches!(err, ClientError::CapRejected(name) if name == "multi-prefix"));
    }

    #[test]
    fn test_nak_of_optional_cap_completes() {
        let mut caps = CapNegotiation::default();
        caps.request("away-notify", false);
        caps.begin(1);

        caps.apply("LS", "away-notify").unwrap();
        assert_eq!(caps.apply("NAK", "away-notify").unwrap(), CapOutcome::End);
        assert!(!caps.is_enabled("away-notify"));
    }

    #[test]
    fn test_required_cap_never_mentioned() {
        let mut caps = CapNegotiation::default();
        caps.request("batch", true);
        caps.request("server-time", false);
        caps.begin(2);

        caps.apply("LS", "server-time").unwrap();
        caps.apply("ACK", "server-time").unwrap();
        // The final response settles the counter; `batch` was never ACKed.
        let err = caps.apply("NAK", "server-time").unwrap_err();
        assert!(matches!(err, ClientError::CapNotAccepted(name) if name == "batch"));
    }

    #[test]
    fn test_required_cap_missing_from_ack_set() {
        let mut caps = CapNegotiation::default();
        caps.request("batch", true);
        caps.begin(1);

        caps.apply("LS", "batch").unwrap();
        // The server answers the REQ with an unknown subcommand; the LS and
        // that response settle the counter with `batch` still not enabled.
        let err = caps.apply("ACK", "something-else").unwrap_err();
        assert!(matches!(err, ClientError::CapNotAccepted(name) if name == "batch"));
    }

    #[test]
    fn test_value_suffixes_are_ignored() {
        let mut caps = CapNegotiation::default();
        caps.request("sasl", false);
        caps.begin(1);

        caps.apply("LS", "sasl=PLAIN,EXTERNAL").unwrap();
        assert!(caps.is_available("sasl"));
    }

    #[test]
    fn test_responses_after_end_are_informational() {
        let mut caps = CapNegotiation::default();
        caps.request("batch", false);
        caps.begin(1);

        caps.apply("LS", "batch").unwrap();
        assert_eq!(caps.apply("ACK", "batch").unwrap(), CapOutcome::End);

        // A later NEW/DEL-style ACK must not reopen negotiation.
        assert_eq!(
            caps.apply("ACK", "away-notify").unwrap(),
            CapOutcome::Continue
        );
        assert!(!caps.is_enabled("away-notify"));
    }

    #[test]
    fn test_unknown_subcommand_does_not_decrement() {
        let mut caps = CapNegotiation::default();
        caps.request("batch", false);
        caps.begin(1);

        assert_eq!(caps.apply("NEW", "batch").unwrap(), CapOutcome::Continue);
        caps.apply("LS", "batch").unwrap();
        assert_eq!(caps.apply("ACK", "batch").unwrap(), CapOutcome::End);
    }
}
