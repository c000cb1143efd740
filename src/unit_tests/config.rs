// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::ControllerConfig;
use clap::Parser;
use std::time::Duration;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    config: ControllerConfig,
}

#[test]
pub fn test_defaults() {
    println!("Testing ControllerConfig::default()...");
    let config = ControllerConfig::default();
    assert_eq!(config.resync_period(), Duration::from_secs(60));
    assert_eq!(config.error_requeue_period(), Duration::from_secs(10));
    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.initial_backoff, Duration::from_millis(100));
    assert_eq!(policy.max_backoff, Duration::from_secs(2));
    assert!(config.conflict_jitter);
}

#[test]
pub fn test_flags() {
    println!("Testing ControllerConfig flags...");
    let cli = TestCli::try_parse_from([
        "appservice-controller",
        "--resync-secs",
        "30",
        "--conflict-attempts",
        "0",
        "--conflict-backoff-ms",
        "50",
        "--conflict-jitter",
        "false",
    ])
    .unwrap();
    assert_eq!(cli.config.resync_period(), Duration::from_secs(30));
    assert_eq!(cli.config.error_requeue_period(), Duration::from_secs(10));
    assert!(!cli.config.conflict_jitter);
    // At least one submission is always made.
    assert_eq!(cli.config.retry_policy().max_attempts, 1);
    assert_eq!(cli.config.retry_policy().initial_backoff, Duration::from_millis(50));
}
