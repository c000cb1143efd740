// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use kube::api::{ApiResource, DynamicObject};

// KubeAPIRequest represents API requests issued by reconcile_core.
//
// kube-rs uses a generic type kube::api::Api as an api handle to send
// requests to the Kubernetes API.
// So KubeAPIRequest wraps around the variables used to instantiate kube::api::Api
// and to call its methods.
//
// Each request carries the ApiResource of the target kind, so that the shim layer
// can send it through Api<DynamicObject> without knowing the concrete type.

#[derive(Debug, Clone)]
pub enum KubeAPIRequest {
    GetRequest(KubeGetRequest),
    CreateRequest(KubeCreateRequest),
    UpdateRequest(KubeUpdateRequest),
    DeleteRequest(KubeDeleteRequest),
}

impl KubeAPIRequest {
    pub fn key(&self) -> String {
        match self {
            KubeAPIRequest::GetRequest(req) => req.key(),
            KubeAPIRequest::CreateRequest(req) => req.key(),
            KubeAPIRequest::UpdateRequest(req) => req.key(),
            KubeAPIRequest::DeleteRequest(req) => req.key(),
        }
    }

    /// Whether the request mutates the store.
    pub fn is_write(&self) -> bool {
        !matches!(self, KubeAPIRequest::GetRequest(_))
    }
}

// KubeGetRequest has the name as the parameter of Api.get(), and namespace to instantiate an Api.

#[derive(Debug, Clone)]
pub struct KubeGetRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
}

impl KubeGetRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeCreateRequest has the obj as the parameter of Api.create().

#[derive(Debug, Clone)]
pub struct KubeCreateRequest {
    pub api_resource: ApiResource,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeCreateRequest {
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_resource.kind,
            self.namespace,
            self.obj.metadata.name.as_deref().unwrap_or("")
        )
    }
}

// KubeUpdateRequest has the obj as the parameter of Api.replace().
// The obj carries the resource version it was derived from, which makes the store
// reject the update with a conflict if anyone else wrote the object in between.

#[derive(Debug, Clone)]
pub struct KubeUpdateRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeDeleteRequest has the name as the parameter of Api.delete(), and namespace to instantiate an Api.
// If uid is set, the delete only succeeds when the stored object still has that uid.

#[derive(Debug, Clone)]
pub struct KubeDeleteRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
}

impl KubeDeleteRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeAPIResponse represents API results fed back to reconcile_core.

#[derive(Debug, Clone)]
pub enum KubeAPIResponse {
    GetResponse(KubeGetResponse),
    CreateResponse(KubeCreateResponse),
    UpdateResponse(KubeUpdateResponse),
    DeleteResponse(KubeDeleteResponse),
}

#[derive(Debug, Clone)]
pub struct KubeGetResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeCreateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeUpdateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeDeleteResponse {
    pub res: Result<(), APIError>,
}

impl KubeAPIResponse {
    /// Returns the result of a write (create, update or delete) response.
    /// Delete carries no object, so it yields None on success.
    pub fn into_write_result(self) -> Option<Result<Option<DynamicObject>, APIError>> {
        match self {
            KubeAPIResponse::CreateResponse(resp) => Some(resp.res.map(Some)),
            KubeAPIResponse::UpdateResponse(resp) => Some(resp.res.map(Some)),
            KubeAPIResponse::DeleteResponse(resp) => Some(resp.res.map(|()| None)),
            KubeAPIResponse::GetResponse(_) => None,
        }
    }

    pub fn into_get_result(self) -> Option<Result<DynamicObject, APIError>> {
        match self {
            KubeAPIResponse::GetResponse(resp) => Some(resp.res),
            _ => None,
        }
    }
}
