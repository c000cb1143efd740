// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::{KubeAPIRequest, KubeAPIResponse};

/// Request is what reconcile_core asks the shim layer to do next.
/// Besides the Kubernetes API, a reconciler can also send requests to
/// an external shim layer (see external_shim_layer).
#[derive(Debug, Clone)]
pub enum Request<EReq> {
    KRequest(KubeAPIRequest),
    ExternalRequest(EReq),
}

/// Response is what the shim layer feeds back into the next reconcile_core call.
#[derive(Debug, Clone)]
pub enum Response<EResp> {
    KResponse(KubeAPIResponse),
    ExternalResponse(EResp),
}

impl<EResp> Response<EResp> {
    pub fn into_k_response(self) -> Option<KubeAPIResponse> {
        match self {
            Response::KResponse(resp) => Some(resp),
            Response::ExternalResponse(_) => None,
        }
    }

    pub fn is_external_response(&self) -> bool {
        matches!(self, Response::ExternalResponse(_))
    }
}
