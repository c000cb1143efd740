// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::exec::retry::ConflictRetryPolicy;
use std::time::Duration;

#[test]
pub fn test_backoff_doubles_up_to_the_cap() {
    println!("Testing ConflictRetryPolicy::backoff()...");
    let policy = ConflictRetryPolicy::default();
    let delays: Vec<u128> = (1..=7).map(|attempts| policy.backoff(attempts).as_millis()).collect();
    assert_eq!(delays, vec![100, 200, 400, 800, 1600, 2000, 2000]);
    assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(2));
}

#[test]
pub fn test_allows_retry() {
    let policy = ConflictRetryPolicy::default();
    assert!(policy.allows_retry(1));
    assert!(policy.allows_retry(4));
    assert!(!policy.allows_retry(5));
    assert!(!ConflictRetryPolicy::immediate(1).allows_retry(1));
}

#[test]
pub fn test_immediate() {
    let policy = ConflictRetryPolicy::immediate(3);
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.backoff(1), Duration::ZERO);
    assert_eq!(policy.backoff(3), Duration::ZERO);
}
