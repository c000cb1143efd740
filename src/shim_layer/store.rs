// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams, Preconditions};
use kube::Client;
use kube_core::ErrorResponse;
use std::future::Future;

/// ResourceStore is the storage the shim layer sends reconcile_core's requests to.
///
/// Updates are optimistic: an update whose object carries a stale resource version
/// fails with APIError::Conflict.
pub trait ResourceStore: Send + Sync {
    fn get(&self, req: KubeGetRequest) -> impl Future<Output = Result<DynamicObject, APIError>> + Send;

    fn create(&self, req: KubeCreateRequest) -> impl Future<Output = Result<DynamicObject, APIError>> + Send;

    fn update(&self, req: KubeUpdateRequest) -> impl Future<Output = Result<DynamicObject, APIError>> + Send;

    fn delete(&self, req: KubeDeleteRequest) -> impl Future<Output = Result<(), APIError>> + Send;
}

/// KubeStore sends the requests to the Kubernetes API through kube-rs.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> KubeStore {
        KubeStore { client }
    }

    fn api(&self, namespace: &str, api_resource: &kube::api::ApiResource) -> Api<DynamicObject> {
        Api::<DynamicObject>::namespaced_with(self.client.clone(), namespace, api_resource)
    }
}

impl ResourceStore for KubeStore {
    async fn get(&self, req: KubeGetRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .get(&req.name)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn create(&self, req: KubeCreateRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .create(&PostParams::default(), &req.obj)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn update(&self, req: KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .replace(&req.name, &PostParams::default(), &req.obj)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn delete(&self, req: KubeDeleteRequest) -> Result<(), APIError> {
        let dp = DeleteParams {
            preconditions: req.uid.map(|uid| Preconditions {
                uid: Some(uid),
                resource_version: None,
            }),
            ..DeleteParams::default()
        };
        self.api(&req.namespace, &req.api_resource)
            .delete(&req.name, &dp)
            .await
            .map(|_| ())
            .map_err(|err| kube_error_to_api_error(&err))
    }
}

/// kube_error_to_api_error translates the error from kube-rs APIs
/// to the form that can be processed by reconcile_core.
pub fn kube_error_to_api_error(error: &kube::Error) -> APIError {
    match error {
        kube::Error::Api(ErrorResponse { reason, code, message, .. }) => match (*code, reason.as_str()) {
            (404, _) => APIError::ObjectNotFound,
            (409, "AlreadyExists") => APIError::ObjectAlreadyExists,
            (409, _) => APIError::Conflict(message.clone()),
            (400 | 401 | 403 | 422, _) => APIError::Invalid(format!("{reason}: {message}")),
            _ => APIError::Unavailable(format!("{reason}: {message}")),
        },
        other => APIError::Unavailable(other.to_string()),
    }
}
