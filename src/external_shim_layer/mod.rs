// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

// A trait for the external api of a reconciler, whose core is a transition method, and the developer should wrap all
// possible operations they may need in the function.
// EReq is the input type of the external api and also the ? of Request<?> of the reconciler, i.e., it completes the
// request type of a reconciler.
// Similarly, EResp is the output type of the external api, which composes the Response<?> type of a reconciler.
pub trait ExternalShimLayer<EReq, EResp> {
    fn external_call(&self, req: EReq) -> impl Future<Output = EResp> + Send;
}

/// BackoffRequest asks the shim layer to wait before reconcile_core retries a conflicting write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffRequest {
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffResponse {
    pub waited: Duration,
}

/// BackoffShimLayer serves BackoffRequest with a tokio timer.
/// With jitter on, up to half of the requested delay is added at random,
/// so that writers that conflicted with each other don't retry in lockstep.
#[derive(Debug, Clone, Default)]
pub struct BackoffShimLayer {
    pub jitter: bool,
}

impl BackoffShimLayer {
    pub fn new(jitter: bool) -> BackoffShimLayer {
        BackoffShimLayer { jitter }
    }

    fn delay_for(&self, req: &BackoffRequest) -> Duration {
        let half_ms = u64::try_from(req.delay.as_millis() / 2).unwrap_or(u64::MAX);
        if !self.jitter || half_ms == 0 {
            return req.delay;
        }
        let extra_ms = rand::thread_rng().gen_range(0..=half_ms);
        req.delay.saturating_add(Duration::from_millis(extra_ms))
    }
}

impl ExternalShimLayer<BackoffRequest, BackoffResponse> for BackoffShimLayer {
    async fn external_call(&self, req: BackoffRequest) -> BackoffResponse {
        let waited = self.delay_for(&req);
        debug!(delay_ms = waited.as_millis() as u64, "backing off before retry");
        if !waited.is_zero() {
            tokio::time::sleep(waited).await;
        }
        BackoffResponse { waited }
    }
}
