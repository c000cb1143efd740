// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::exec::retry::ConflictRetryPolicy;
use clap::Args;
use std::time::Duration;

/// Knobs of the controller runtime and the conflict retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ControllerConfig {
    /// Seconds after a successful reconcile before the object is reconciled again
    #[arg(long, env = "APPSERVICE_RESYNC_SECS", default_value_t = 60)]
    pub resync_secs: u64,

    /// Seconds before a failed reconcile is retried
    #[arg(long, env = "APPSERVICE_ERROR_REQUEUE_SECS", default_value_t = 10)]
    pub error_requeue_secs: u64,

    /// Attempts per child write before a conflict is reported as a failure
    #[arg(long, env = "APPSERVICE_CONFLICT_ATTEMPTS", default_value_t = 5)]
    pub conflict_attempts: u32,

    /// Milliseconds to wait before the first conflict retry; doubled for every further retry
    #[arg(long, env = "APPSERVICE_CONFLICT_BACKOFF_MS", default_value_t = 100)]
    pub conflict_backoff_ms: u64,

    /// Upper bound of the conflict backoff in milliseconds
    #[arg(long, env = "APPSERVICE_MAX_CONFLICT_BACKOFF_MS", default_value_t = 2000)]
    pub max_conflict_backoff_ms: u64,

    /// Add random jitter to conflict backoff
    #[arg(long, env = "APPSERVICE_CONFLICT_JITTER", default_value_t = true, action = clap::ArgAction::Set)]
    pub conflict_jitter: bool,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig {
            resync_secs: 60,
            error_requeue_secs: 10,
            conflict_attempts: 5,
            conflict_backoff_ms: 100,
            max_conflict_backoff_ms: 2000,
            conflict_jitter: true,
        }
    }
}

impl ControllerConfig {
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    pub fn error_requeue_period(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn retry_policy(&self) -> ConflictRetryPolicy {
        ConflictRetryPolicy {
            max_attempts: self.conflict_attempts.max(1),
            initial_backoff: Duration::from_millis(self.conflict_backoff_ms),
            max_backoff: Duration::from_millis(self.max_conflict_backoff_ms),
        }
    }
}
