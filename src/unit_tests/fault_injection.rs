// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::shim_layer::fault_injection::CrashPlan;
use crate::Error;

#[test]
pub fn test_crash_fires_once() {
    println!("Testing CrashPlan::crash_or_continue()...");
    let plan = CrashPlan::new(2);
    assert!(plan.crash_or_continue("test").is_ok());
    assert!(matches!(plan.crash_or_continue("test"), Err(Error::InjectedCrash(2))));
    assert!(plan.crash_or_continue("test").is_ok());
    assert!(plan.crash_or_continue("test").is_ok());
}

#[test]
pub fn test_injected_crash_is_retryable() {
    assert!(Error::InjectedCrash(1).is_retryable());
}
