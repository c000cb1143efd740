// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use std::time::Duration;

/// ConflictRetryPolicy bounds how often one child write is re-read and re-submitted
/// after the store reports a conflict.
///
/// attempts count submissions of the same write: attempt 1 is the first submission,
/// so max_attempts = 1 disables retrying altogether.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ConflictRetryPolicy {
    fn default() -> ConflictRetryPolicy {
        ConflictRetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl ConflictRetryPolicy {
    /// A policy that retries without waiting.
    pub fn immediate(max_attempts: u32) -> ConflictRetryPolicy {
        ConflictRetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Whether another submission is allowed after `attempts` submissions conflicted.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// The wait before the submission following `attempts` conflicted submissions:
    /// initial_backoff, doubled per further conflict, capped at max_backoff.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
