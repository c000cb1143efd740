// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// CrashPlan makes the controller crash right after its expected-th write request
/// (counting from 1 over the lifetime of the plan), to test that a reconcile
/// interrupted at that point converges when it runs again.
#[derive(Debug)]
pub struct CrashPlan {
    expected: u64,
    current: AtomicU64,
}

impl CrashPlan {
    pub fn new(expected: u64) -> CrashPlan {
        CrashPlan {
            expected,
            current: AtomicU64::new(0),
        }
    }

    /// Called by the shim layer after every create, update or delete request.
    /// The crash fires once: later writes keep counting past expected.
    pub fn crash_or_continue(&self, log_header: &str) -> Result<(), Error> {
        let current = self.current.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if current == self.expected {
            warn!("{} crash injected after write {}", log_header, current);
            return Err(Error::InjectedCrash(current));
        }
        Ok(())
    }
}
