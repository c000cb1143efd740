// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::KubeGetRequest;
use crate::reconciler::reconciler::ReconcileError;
use kube::api::DynamicObject;

/// ResourceBuilder describes how one kind of child object is derived from the custom resource K.
///
/// All methods are pure. make is used on the create path, update on the update path:
/// it takes the object observed in the store and returns it with every derived field
/// overwritten, keeping whatever the store owns (resource version, allocated fields).
pub trait ResourceBuilder<K> {
    fn get_request(cr: &K) -> KubeGetRequest;

    fn make(cr: &K) -> Result<DynamicObject, ReconcileError>;

    fn update(cr: &K, obj: DynamicObject) -> Result<DynamicObject, ReconcileError>;

    /// Whether the observed object already equals what update would produce.
    fn matches(cr: &K, obj: &DynamicObject) -> Result<bool, ReconcileError>;

    /// Whether the child should exist at all for the current desired state.
    fn required(_cr: &K) -> bool {
        true
    }
}
