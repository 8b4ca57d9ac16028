//! Process-wide rate-limit deadline.
//!
//! A 429 response pushes the shared deadline forward; every request waits for
//! the deadline before it is sent, so all concurrent callers stall on the same
//! instant instead of computing independent waits.

use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Retry-After used when the header is missing or unparseable.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Upper bound for a single Retry-After value.
pub const MAX_RETRY_AFTER_SECS: u64 = 3600;

static GLOBAL_GATE: LazyLock<Arc<RateLimitGate>> =
    LazyLock::new(|| Arc::new(RateLimitGate::new()));

#[derive(Debug, Default)]
pub struct RateLimitGate {
    deadline: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate shared by every client in the process.
    pub fn global() -> Arc<RateLimitGate> {
        Arc::clone(&GLOBAL_GATE)
    }

    /// Extends the deadline to `now + wait`. An existing later deadline wins.
    pub fn block_for(&self, wait: Duration) {
        let candidate = Instant::now() + wait;
        let mut deadline = self.lock();
        match *deadline {
            Some(current) if current >= candidate => {}
            _ => *deadline = Some(candidate),
        }
    }

    /// Remaining time until the deadline, if one is active.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = (*self.lock())?;
        let now = Instant::now();
        (deadline > now).then(|| deadline - now)
    }

    /// Waits until no deadline is active. Re-checks after waking because
    /// another 429 may have pushed the deadline further meanwhile.
    pub async fn wait(&self) {
        loop {
            let deadline = {
                let mut guard = self.lock();
                match *guard {
                    Some(d) if d > Instant::now() => d,
                    Some(_) => {
                        *guard = None;
                        return;
                    }
                    None => return,
                }
            };
            debug!(
                wait_ms = (deadline - Instant::now()).as_millis() as u64,
                "waiting for rate-limit deadline"
            );
            tokio::time::sleep_until(deadline).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        // The guarded value is a plain instant, so a poisoned lock is still usable.
        self.deadline.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parses a Retry-After header value in seconds, applying the default and cap.
pub fn parse_retry_after(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
        .min(MAX_RETRY_AFTER_SECS)
}
