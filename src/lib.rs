// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod appservice_controller;
pub mod config;
pub mod external_shim_layer;
pub mod kubernetes_api_objects;
pub mod reconciler;
pub mod shim_layer;
#[cfg(test)]
mod unit_tests;

use crate::reconciler::reconciler::ReconcileError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("ReconcileCoreError: {0}")]
    ReconcileCoreError(#[from] ReconcileError),
    #[error("InjectedCrash: crashed after write {0}")]
    InjectedCrash(u64),
}

impl Error {
    /// Whether requeueing the same object without any change can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::MissingObjectKey(_) | Error::ReconcileCoreError(ReconcileError::Invalid(_))
        )
    }
}
