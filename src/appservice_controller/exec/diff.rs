// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::trusted::spec_types::{AppService, AppServiceSpec};
use crate::reconciler::reconciler::ReconcileError;
use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodTemplateSpec, ResourceClaim, ResourceRequirements, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::IngressSpec;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// The annotation on the AppService holding the spec of its last successful reconcile, as JSON.
pub const LAST_APPLIED_SPEC_ANNOTATION: &str = "anvil.dev/last-applied-spec";

/// The annotation kubectl apply writes; never copied onto children.
pub const KUBECTL_LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// The spec recorded by the last successful reconcile.
/// A missing or unparsable snapshot yields None, which callers treat as changed.
pub fn last_applied_spec(app: &AppService) -> Option<AppServiceSpec> {
    let raw = app.metadata.annotations.as_ref()?.get(LAST_APPLIED_SPEC_ANNOTATION)?;
    serde_json::from_str(raw).ok()
}

pub fn spec_changed(app: &AppService) -> bool {
    last_applied_spec(app).as_ref() != Some(&app.spec)
}

/// Returns the AppService with its current spec recorded as the last-applied snapshot.
/// Nothing but the annotation changes; in particular the resource version is kept,
/// so the update fails if the spec was changed in the meantime.
pub fn with_last_applied_spec(app: &AppService) -> Result<AppService, ReconcileError> {
    let snapshot = serde_json::to_string(&app.spec)
        .map_err(|err| ReconcileError::Invalid(format!("cannot serialize spec: {err}")))?;
    let mut app = app.clone();
    app.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(LAST_APPLIED_SPEC_ANNOTATION.to_string(), snapshot);
    Ok(app)
}

// The comparisons below only look at the fields the builders set, and they fill in
// the defaults the API server applies, so a child written by the builder matches the
// same child read back from the store.

pub fn deployment_spec_matches(desired: &DeploymentSpec, found: Option<&DeploymentSpec>) -> bool {
    let Some(found) = found else {
        return false;
    };
    desired.replicas == found.replicas
        && desired.selector == found.selector
        && pod_template_matches(&desired.template, &found.template)
}

fn pod_template_matches(desired: &PodTemplateSpec, found: &PodTemplateSpec) -> bool {
    let labels = |t: &PodTemplateSpec| t.metadata.as_ref().and_then(|m| m.labels.clone()).unwrap_or_default();
    let containers = |t: &PodTemplateSpec| t.spec.as_ref().map(|s| s.containers.clone()).unwrap_or_default();
    let desired_containers = containers(desired);
    let found_containers = containers(found);
    labels(desired) == labels(found)
        && desired_containers.len() == found_containers.len()
        && desired_containers
            .iter()
            .zip(found_containers.iter())
            .all(|(d, f)| container_matches(d, f))
}

fn container_matches(desired: &Container, found: &Container) -> bool {
    desired.name == found.name
        && desired.image == found.image
        && desired.image_pull_policy == found.image_pull_policy
        && normalize_resources(&desired.resources) == normalize_resources(&found.resources)
        && normalize_container_ports(&desired.ports) == normalize_container_ports(&found.ports)
        && normalize_env(&desired.env) == normalize_env(&found.env)
}

/// A quantity as an exact count of nano units, or its raw text if it does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityValue {
    Nanos(i128),
    Raw(String),
}

type NormalizedResources = (
    BTreeMap<String, QuantityValue>,
    BTreeMap<String, QuantityValue>,
    Vec<ResourceClaim>,
);

fn normalize_resources(resources: &Option<ResourceRequirements>) -> NormalizedResources {
    let resources = resources.clone().unwrap_or_default();
    let quantities = |q: Option<BTreeMap<String, Quantity>>| {
        q.unwrap_or_default()
            .into_iter()
            .map(|(name, quantity)| (name, quantity_value(&quantity)))
            .collect::<BTreeMap<_, _>>()
    };
    (
        quantities(resources.limits),
        quantities(resources.requests),
        resources.claims.unwrap_or_default(),
    )
}

/// quantity_value reads a quantity the way the API server does, so `0.5`, `500m` and `5e-1`
/// compare equal. Values finer than a nano unit are rounded up.
pub fn quantity_value(quantity: &Quantity) -> QuantityValue {
    parse_quantity(quantity.0.trim())
        .map(QuantityValue::Nanos)
        .unwrap_or_else(|| QuantityValue::Raw(quantity.0.clone()))
}

fn parse_quantity(text: &str) -> Option<i128> {
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let number_len = text
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(number_len);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let (binary_power, decimal_exponent) = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        _ => {
            let exponent = suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))?;
            (0, exponent.parse::<i32>().ok()?)
        }
    };

    let digits = format!("{}{}", whole, fraction);
    let mut value = digits.parse::<i128>().ok()?.checked_mul(1i128.checked_shl(binary_power)?)?;
    let fraction_len = i32::try_from(fraction.len()).ok()?;
    let exponent = decimal_exponent.checked_add(9)?.checked_sub(fraction_len)?;
    if exponent >= 0 {
        value = value.checked_mul(10i128.checked_pow(u32::try_from(exponent).ok()?)?)?;
    } else {
        let divisor = 10i128.checked_pow(u32::try_from(-exponent).ok()?)?;
        value = value / divisor + i128::from(value % divisor != 0);
    }
    Some(if negative { -value } else { value })
}

/// The env vars with the defaults the API server fills in, and with empty values dropped
/// the way they are dropped on serialization.
fn normalize_env(env: &Option<Vec<EnvVar>>) -> Vec<EnvVar> {
    env.iter()
        .flatten()
        .cloned()
        .map(|mut var| {
            if var.value.as_deref() == Some("") {
                var.value = None;
            }
            if let Some(field_ref) = var.value_from.as_mut().and_then(|from| from.field_ref.as_mut()) {
                field_ref.api_version.get_or_insert_with(|| "v1".to_string());
            }
            var
        })
        .collect()
}

fn normalize_container_ports(ports: &Option<Vec<ContainerPort>>) -> Vec<(i32, String, Option<String>)> {
    ports
        .iter()
        .flatten()
        .map(|p| {
            (
                p.container_port,
                p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                p.name.clone(),
            )
        })
        .collect()
}

pub fn service_spec_matches(desired: &ServiceSpec, found: Option<&ServiceSpec>) -> bool {
    let Some(found) = found else {
        return false;
    };
    let service_type = |s: &ServiceSpec| s.type_.clone().unwrap_or_else(|| "ClusterIP".to_string());
    service_type(desired) == service_type(found)
        && desired.selector.clone().unwrap_or_default() == found.selector.clone().unwrap_or_default()
        && normalize_service_ports(&desired.ports) == normalize_service_ports(&found.ports)
}

type NormalizedServicePort = (i32, String, Option<String>, IntOrString, Option<String>);

fn normalize_service_ports(ports: &Option<Vec<ServicePort>>) -> Vec<NormalizedServicePort> {
    ports
        .iter()
        .flatten()
        .map(|p| {
            (
                p.port,
                p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                p.name.clone(),
                p.target_port.clone().unwrap_or(IntOrString::Int(p.port)),
                p.app_protocol.clone(),
            )
        })
        .collect()
}

pub fn ingress_spec_matches(desired: &IngressSpec, found: Option<&IngressSpec>) -> bool {
    let Some(found) = found else {
        return false;
    };
    desired.rules.clone().unwrap_or_default() == found.rules.clone().unwrap_or_default()
}
