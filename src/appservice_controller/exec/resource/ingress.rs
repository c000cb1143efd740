// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::common::*;
use crate::appservice_controller::exec::diff::{
    ingress_spec_matches, KUBECTL_LAST_APPLIED_ANNOTATION, LAST_APPLIED_SPEC_ANNOTATION,
};
use crate::appservice_controller::trusted::spec_types::AppService;
use crate::kubernetes_api_objects::api_method::KubeGetRequest;
use crate::reconciler::reconciler::ReconcileError;
use crate::reconciler::resource_builder::ResourceBuilder;
use k8s_openapi::api::networking::v1::{Ingress, IngressSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use std::collections::{BTreeMap, BTreeSet};

/// The annotation on the Ingress listing the keys copied from the AppService, comma separated.
/// On the next update these keys are dropped unless the AppService still has them.
pub const PASSED_ANNOTATIONS_ANNOTATION: &str = "anvil.dev/passed-annotations";

pub struct IngressBuilder {}

impl ResourceBuilder<AppService> for IngressBuilder {
    fn get_request(app: &AppService) -> KubeGetRequest {
        make_get_request::<Ingress>(app)
    }

    fn make(app: &AppService) -> Result<DynamicObject, ReconcileError> {
        marshal(&make_ingress(app)?)
    }

    fn update(app: &AppService, obj: DynamicObject) -> Result<DynamicObject, ReconcileError> {
        let found = unmarshal::<Ingress>(obj)?;
        check_controller(app, "Ingress", &found.metadata)?;
        marshal(&update_ingress(app, found)?)
    }

    fn matches(app: &AppService, obj: &DynamicObject) -> Result<bool, ReconcileError> {
        let found = unmarshal::<Ingress>(obj.clone())?;
        Ok(metadata_matches(app, &found.metadata)
            && annotations_match(app, &found.metadata)
            && ingress_spec_matches(&make_ingress_spec(app), found.spec.as_ref()))
    }

    /// The Ingress only exists while the AppService has routing rules.
    fn required(app: &AppService) -> bool {
        !app.spec.rules.is_empty()
    }
}

pub fn make_ingress(app: &AppService) -> Result<Ingress, ReconcileError> {
    let mut metadata = make_metadata(app)?;
    let annotations = with_passed_annotations(BTreeMap::new(), make_annotations(app));
    if !annotations.is_empty() {
        metadata.annotations = Some(annotations);
    }
    Ok(Ingress {
        metadata,
        spec: Some(make_ingress_spec(app)),
        ..Ingress::default()
    })
}

/// update_ingress overwrites the rules and keeps the ingress class, tls and default backend
/// the found Ingress has. Annotations copied by an earlier update are replaced by the
/// current ones; annotations set by anyone else are kept.
pub fn update_ingress(app: &AppService, found: Ingress) -> Result<Ingress, ReconcileError> {
    let mut metadata = update_metadata(app, found.metadata.clone())?;
    let mut annotations = metadata.annotations.take().unwrap_or_default();
    for key in passed_annotation_keys(&found.metadata) {
        annotations.remove(&key);
    }
    let annotations = with_passed_annotations(annotations, make_annotations(app));
    metadata.annotations = if annotations.is_empty() { None } else { Some(annotations) };
    let spec = IngressSpec {
        rules: make_ingress_spec(app).rules,
        ..found.spec.clone().unwrap_or_default()
    };
    Ok(Ingress {
        metadata,
        spec: Some(spec),
        ..found
    })
}

pub fn make_ingress_spec(app: &AppService) -> IngressSpec {
    IngressSpec {
        rules: Some(app.spec.rules.clone()),
        ..IngressSpec::default()
    }
}

/// The annotations of the AppService are passed on to the Ingress, where ingress controllers read them.
pub fn make_annotations(app: &AppService) -> BTreeMap<String, String> {
    app.metadata
        .annotations
        .iter()
        .flatten()
        .filter(|(k, _)| {
            ![
                LAST_APPLIED_SPEC_ANNOTATION,
                KUBECTL_LAST_APPLIED_ANNOTATION,
                PASSED_ANNOTATIONS_ANNOTATION,
            ]
            .contains(&k.as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// The keys a previous make or update copied onto the Ingress.
pub fn passed_annotation_keys(found: &ObjectMeta) -> BTreeSet<String> {
    found
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(PASSED_ANNOTATIONS_ANNOTATION))
        .map(|keys| keys.split(',').filter(|k| !k.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn with_passed_annotations(
    mut annotations: BTreeMap<String, String>,
    passed: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    annotations.remove(PASSED_ANNOTATIONS_ANNOTATION);
    if !passed.is_empty() {
        let keys = passed.keys().cloned().collect::<Vec<_>>().join(",");
        annotations.extend(passed);
        annotations.insert(PASSED_ANNOTATIONS_ANNOTATION.to_string(), keys);
    }
    annotations
}

fn annotations_match(app: &AppService, found: &ObjectMeta) -> bool {
    let passed = make_annotations(app);
    let present = passed
        .iter()
        .all(|(k, v)| found.annotations.as_ref().and_then(|annotations| annotations.get(k)) == Some(v));
    present && passed_annotation_keys(found) == passed.keys().cloned().collect::<BTreeSet<_>>()
}
