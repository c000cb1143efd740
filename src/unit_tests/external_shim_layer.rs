// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::external_shim_layer::*;
use std::time::Duration;

#[tokio::test]
pub async fn test_backoff_without_jitter() {
    let shim = BackoffShimLayer::new(false);
    let resp = shim
        .external_call(BackoffRequest {
            delay: Duration::from_millis(5),
        })
        .await;
    assert_eq!(resp.waited, Duration::from_millis(5));
}

#[tokio::test]
pub async fn test_backoff_jitter_is_bounded() {
    let shim = BackoffShimLayer::new(true);
    for _ in 0..5 {
        let resp = shim
            .external_call(BackoffRequest {
                delay: Duration::from_millis(4),
            })
            .await;
        assert!(resp.waited >= Duration::from_millis(4));
        assert!(resp.waited <= Duration::from_millis(6));
    }
}

#[tokio::test]
pub async fn test_zero_backoff_returns_at_once() {
    let shim = BackoffShimLayer::new(true);
    let resp = shim.external_call(BackoffRequest { delay: Duration::ZERO }).await;
    assert_eq!(resp.waited, Duration::ZERO);
}
