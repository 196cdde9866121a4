//! Bounded retry for session opens.
//!
//! Instrument buses - USB especially - frequently fail a first open attempt
//! because a previous process still holds a stale claim. A short fixed
//! backoff between attempts is enough to recover from that; more than two
//! attempts yields diminishing returns. Opens are the only retried
//! operation; I/O failures surface immediately.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::backend::ResourceOpener;
use crate::session::SharedSession;

/// Retry parameters for one open sequence.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before the open fails fatally.
    pub max_attempts: u32,
    /// Sleep after each failed attempt.
    pub backoff: Duration,
    /// Sleep after a successful open, letting the device settle before the
    /// first command.
    pub settle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(1),
            settle: Duration::from_millis(500),
        }
    }
}

/// Open a session on `address` with bounded retry.
///
/// Each failed attempt sleeps `policy.backoff` before the next one (and
/// before the final failure is surfaced). On success any pending device
/// state is cleared when the handle supports it, then `policy.settle`
/// elapses before the handle is returned.
pub fn open_with_retry(
    opener: &dyn ResourceOpener,
    address: &str,
    policy: RetryPolicy,
) -> Result<SharedSession> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match opener.open_resource(address) {
            Ok(handle) => {
                if let Some(session) = handle.message_based() {
                    if let Err(err) = session.clear() {
                        debug!(resource = %address, error = %err, "device clear failed after open");
                    }
                }
                thread::sleep(policy.settle);
                return Ok(handle);
            }
            Err(err) => {
                debug!(resource = %address, attempt, error = %err, "open attempt failed");
                thread::sleep(policy.backoff);
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("no open attempt was made for {address}")))
}
