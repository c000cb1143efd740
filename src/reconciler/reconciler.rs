// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::common::KubeObjectRef;
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::io::{Request, Response};
use thiserror::Error;

/// ReconcileError is the terminal outcome of a reconcile that ends in the error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The desired state or a child cannot be written as is; retrying without a change won't help.
    #[error("invalid: {0}")]
    Invalid(String),
    /// The store could not be reached or kept conflicting; retrying later may help.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// A store error that reconcile_core does not handle inline ends the reconcile.
/// Invalid keeps its class; everything else is worth retrying later.
impl From<APIError> for ReconcileError {
    fn from(err: APIError) -> ReconcileError {
        match err {
            APIError::Invalid(msg) => ReconcileError::Invalid(msg),
            APIError::Unavailable(msg) => ReconcileError::Unavailable(msg),
            other => ReconcileError::Unavailable(other.to_string()),
        }
    }
}

/// Reconciler is implemented by every controller that runs on top of the shim layer.
///
/// reconcile_core is a pure transition function: given the current state and the
/// response to the previous request, it returns the next state and the next request.
/// The shim layer performs the I/O and keeps calling reconcile_core until
/// reconcile_done or reconcile_error holds.
pub trait Reconciler {
    // S: type of the reconciler state
    type S;
    // K: type of the custom resource
    type K;
    // EReq/EResp: types of the external requests/responses
    type EReq;
    type EResp;

    fn reconcile_init_state(&self) -> Self::S;

    fn reconcile_core(
        &self,
        cr_key: &KubeObjectRef,
        resp_o: Option<Response<Self::EResp>>,
        state: Self::S,
    ) -> (Self::S, Option<Request<Self::EReq>>);

    fn reconcile_done(&self, state: &Self::S) -> bool;

    fn reconcile_error(&self, state: &Self::S) -> Option<ReconcileError>;
}
