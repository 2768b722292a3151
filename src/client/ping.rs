//! Connection liveness probing.
//!
//! At every tick the loop emits `PING :<token>` and starts a per-ping
//! deadline. The read loop routes matching `PONG` trailings back over a
//! bounded channel; a deadline that fires first is fatal.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ClientError;

use super::Sender;

/// Capacity of the PONG routing channel. Overflow drops the token — a
/// tolerated liveness loss, since the deadline timer still exists and a
/// later PONG can clear it.
pub(crate) const PONG_CHANNEL_CAPACITY: usize = 5;

/// Stand-in deadline while no ping is outstanding.
const IDLE_DEADLINE: Duration = Duration::from_secs(86_400);

pub(crate) struct PingLoop {
    pub sender: Sender,
    pub errors: mpsc::Sender<ClientError>,
    pub pongs: mpsc::Receiver<String>,
    pub frequency: Duration,
    pub timeout: Duration,
    pub shutdown: CancellationToken,
}

impl PingLoop {
    pub async fn run(mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.frequency, self.frequency);
        let mut outstanding: VecDeque<(String, Instant)> = VecDeque::new();

        loop {
            let deadline = outstanding
                .front()
                .map(|(_, deadline)| *deadline)
                .unwrap_or_else(|| Instant::now() + IDLE_DEADLINE);

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    let token = unix_timestamp_token();
                    if self.sender.write_line(&format!("PING :{}", token)).await.is_err() {
                        return;
                    }
                    outstanding.push_back((token, Instant::now() + self.timeout));
                }
                pong = self.pongs.recv() => {
                    match pong {
                        Some(token) => {
                            if let Some(i) = outstanding.iter().position(|(t, _)| *t == token) {
                                outstanding.remove(i);
                            } else {
                                trace!("PONG with unknown token {}", token);
                            }
                        }
                        // The client dropped its side; nothing left to match.
                        None => return,
                    }
                }
                _ = time::sleep_until(deadline) => {
                    debug!("no PONG within {:?}", self.timeout);
                    let _ = self.errors.try_send(ClientError::PingTimeout);
                    return;
                }
            }
        }
    }
}

/// Unix-seconds token. Monotonic at ping-loop granularity, which is all the
/// matching table needs.
fn unix_timestamp_token() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_decimal() {
        let token = unix_timestamp_token();
        assert!(!token.is_empty());
        assert!(token.bytes().all(|b| b.is_ascii_digit()));
    }
}
