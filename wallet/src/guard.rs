//! # Pay Guard
//!
//! At most one outgoing transfer in flight, and a minimum gap between two
//! successful ones. SOL and USDC share the same clock.
//!
//! ```text
//! try_acquire ──lock──▶ cooldown check ──▶ PayPermit
//!                                              │ decrypt, build, sign, submit
//!                                              ▼
//!                               record_submission (success only)
//!                                              │
//!                                           unlock on drop
//! ```
//!
//! The lock is held by the [`PayPermit`] for the whole attempt, so a second
//! caller waits and then sees the updated timestamp. Dropping a permit
//! without recording leaves the cooldown exactly as it was.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::error::WalletError;

/// Shared cooldown state. One per process, owned by the composition root
/// and handed to whoever submits transfers.
#[derive(Debug, Default)]
pub struct PayGuard {
    last_submission: Mutex<Option<Instant>>,
}

impl PayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for any in-flight transfer to finish, then checks the
    /// cooldown. A zero `cooldown` always acquires.
    ///
    /// # Errors
    ///
    /// [`WalletError::CooldownActive`] with the time left to wait.
    pub async fn try_acquire(&self, cooldown: Duration) -> Result<PayPermit<'_>, WalletError> {
        let state = self.last_submission.lock().await;

        if !cooldown.is_zero() {
            if let Some(last) = *state {
                let elapsed = last.elapsed();
                if elapsed < cooldown {
                    let remaining = cooldown - elapsed;
                    debug!(remaining_secs = remaining.as_secs(), "pay cooldown active");
                    return Err(WalletError::CooldownActive { remaining });
                }
            }
        }

        Ok(PayPermit { state })
    }

    /// Time of the last recorded submission, if any.
    pub async fn last_submission(&self) -> Option<Instant> {
        *self.last_submission.lock().await
    }
}

/// Exclusive right to submit one transfer.
#[must_use = "dropping the permit releases the pay lock"]
#[derive(Debug)]
pub struct PayPermit<'a> {
    state: MutexGuard<'a, Option<Instant>>,
}

impl PayPermit<'_> {
    /// Starts the cooldown window. Call only after the chain accepted the
    /// transfer.
    pub fn record_submission(mut self) {
        *self.state = Some(Instant::now());
    }
}
