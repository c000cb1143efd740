// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::UnmarshalError;
use kube::api::{ApiResource, DynamicObject};
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

// DynamicObject is mainly used to pass requests/response between reconcile_core and the shim layer.
// We use DynamicObject in KubeAPIRequest and KubeAPIResponse so that they can carry the requests and responses
// for all kinds of Kubernetes resource objects without exhaustive pattern matching.

/// KubeObject is implemented by every typed object that can travel through the shim layer.
pub trait KubeObject: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned {
    fn api_resource() -> ApiResource {
        ApiResource::erase::<Self>(&())
    }

    fn marshal(&self) -> Result<DynamicObject, UnmarshalError> {
        serde_json::to_value(self)
            .and_then(serde_json::from_value::<DynamicObject>)
            .map_err(|err| UnmarshalError {
                kind: Self::kind(&()).to_string(),
                reason: err.to_string(),
            })
    }

    fn unmarshal(obj: DynamicObject) -> Result<Self, UnmarshalError> {
        obj.try_parse::<Self>().map_err(|err| UnmarshalError {
            kind: Self::kind(&()).to_string(),
            reason: err.to_string(),
        })
    }
}

impl<K> KubeObject for K where K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned {}
