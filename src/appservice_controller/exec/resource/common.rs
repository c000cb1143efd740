// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::trusted::spec_types::AppService;
use crate::kubernetes_api_objects::api_method::KubeGetRequest;
use crate::kubernetes_api_objects::dynamic::KubeObject;
use crate::reconciler::reconciler::ReconcileError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use kube::Resource;
use std::collections::BTreeMap;

pub const APP_LABEL_KEY: &str = "app";

pub fn app_name(app: &AppService) -> String {
    app.metadata.name.clone().unwrap_or_default()
}

pub fn app_namespace(app: &AppService) -> String {
    app.metadata.namespace.clone().unwrap_or_default()
}

/// The labels selecting the pods of an AppService. Derived from the name alone,
/// so the Deployment selector and the Service selector always agree.
pub fn make_base_labels(app: &AppService) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL_KEY.to_string(), app_name(app))])
}

pub fn make_owner_reference(app: &AppService) -> Result<OwnerReference, ReconcileError> {
    app.controller_owner_ref(&())
        .ok_or_else(|| ReconcileError::Invalid("AppService misses .metadata.uid".to_string()))
}

pub fn make_get_request<K: KubeObject>(app: &AppService) -> KubeGetRequest {
    KubeGetRequest {
        api_resource: K::api_resource(),
        name: app_name(app),
        namespace: app_namespace(app),
    }
}

/// make_metadata constructs the metadata shared by all children of the AppService.
pub fn make_metadata(app: &AppService) -> Result<ObjectMeta, ReconcileError> {
    Ok(ObjectMeta {
        name: Some(app_name(app)),
        namespace: Some(app_namespace(app)),
        labels: Some(make_base_labels(app)),
        owner_references: Some(vec![make_owner_reference(app)?]),
        ..ObjectMeta::default()
    })
}

/// update_metadata keeps everything the store or other actors put on the found object
/// and adds the labels and the owner reference of the AppService.
/// A stale reference to the same AppService is replaced, so the controller flag is restored.
pub fn update_metadata(app: &AppService, found: ObjectMeta) -> Result<ObjectMeta, ReconcileError> {
    let owner_reference = make_owner_reference(app)?;
    let mut metadata = found;
    let mut labels = metadata.labels.take().unwrap_or_default();
    labels.extend(make_base_labels(app));
    metadata.labels = Some(labels);
    let mut owner_references = metadata.owner_references.take().unwrap_or_default();
    owner_references.retain(|or| or.uid != owner_reference.uid);
    owner_references.push(owner_reference);
    metadata.owner_references = Some(owner_references);
    Ok(metadata)
}

/// check_controller fails if the found object is controlled by anything but this AppService.
/// Objects without a controller are adopted by the next update.
pub fn check_controller(app: &AppService, kind: &str, found: &ObjectMeta) -> Result<(), ReconcileError> {
    let uid = app.metadata.uid.as_deref().unwrap_or_default();
    let foreign = found
        .owner_references
        .iter()
        .flatten()
        .any(|or| or.controller == Some(true) && or.uid != uid);
    if foreign {
        return Err(ReconcileError::Invalid(format!(
            "{} {}/{} is controlled by another owner",
            kind,
            app_namespace(app),
            app_name(app)
        )));
    }
    Ok(())
}

/// Whether the found metadata already carries the labels and the owner reference update_metadata adds.
pub fn metadata_matches(app: &AppService, found: &ObjectMeta) -> bool {
    let uid = app.metadata.uid.as_deref().unwrap_or_default();
    let labels_match = make_base_labels(app)
        .iter()
        .all(|(k, v)| found.labels.as_ref().and_then(|labels| labels.get(k)) == Some(v));
    let owned = found
        .owner_references
        .iter()
        .flatten()
        .any(|or| or.uid == uid && or.controller == Some(true));
    labels_match && owned
}

pub fn marshal<K: KubeObject>(obj: &K) -> Result<DynamicObject, ReconcileError> {
    obj.marshal().map_err(|err| ReconcileError::Invalid(err.to_string()))
}

pub fn unmarshal<K: KubeObject>(obj: DynamicObject) -> Result<K, ReconcileError> {
    K::unmarshal(obj).map_err(|err| ReconcileError::Invalid(err.to_string()))
}
