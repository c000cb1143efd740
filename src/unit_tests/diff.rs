// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::exec::diff::*;
use crate::appservice_controller::exec::resource::deployment::make_deployment_spec;
use crate::appservice_controller::exec::resource::service::make_service_spec;
use crate::unit_tests::fixtures::*;
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector, ServicePort};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

#[test]
pub fn test_missing_snapshot_counts_as_changed() {
    println!("Testing spec_changed()...");
    let app = stored_app_service("web", basic_spec());
    assert_eq!(last_applied_spec(&app), None);
    assert!(spec_changed(&app));
}

#[test]
pub fn test_unparsable_snapshot_counts_as_changed() {
    let mut app = stored_app_service("web", basic_spec());
    app.metadata.annotations = Some(BTreeMap::from([(
        LAST_APPLIED_SPEC_ANNOTATION.to_string(),
        "not json".to_string(),
    )]));
    assert_eq!(last_applied_spec(&app), None);
    assert!(spec_changed(&app));
}

#[test]
pub fn test_with_last_applied_spec() {
    println!("Testing with_last_applied_spec()...");
    let mut app = stored_app_service("web", basic_spec());
    app.metadata.annotations = Some(BTreeMap::from([("owner".to_string(), "team-a".to_string())]));
    let annotated = with_last_applied_spec(&app).unwrap();

    assert_eq!(annotated.spec, app.spec);
    assert_eq!(annotated.metadata.resource_version, app.metadata.resource_version);
    assert_eq!(last_applied_spec(&annotated), Some(app.spec.clone()));
    assert!(!spec_changed(&annotated));
    assert_eq!(
        annotated.metadata.annotations.unwrap().get("owner"),
        Some(&"team-a".to_string())
    );
}

#[test]
pub fn test_snapshot_detects_any_field_change() {
    let app = with_last_applied_spec(&stored_app_service("web", basic_spec())).unwrap();

    let mut changed = app.clone();
    changed.spec.replicas = 4;
    assert!(spec_changed(&changed));

    let mut changed = app.clone();
    changed.spec.envs.clear();
    assert!(spec_changed(&changed));

    let mut changed = app.clone();
    changed.spec.rules = routing_rules("web");
    assert!(spec_changed(&changed));
}

#[test]
pub fn test_service_spec_matches_normalizes_defaults() {
    println!("Testing service_spec_matches()...");
    let mut spec = basic_spec();
    spec.ports = vec![ServicePort {
        port: 80,
        ..ServicePort::default()
    }];
    let app = stored_app_service("web", spec);
    let desired = make_service_spec(&app);

    let mut found = desired.clone();
    found.cluster_ip = Some("10.96.0.1".to_string());
    found.ports = Some(vec![ServicePort {
        port: 80,
        protocol: Some("TCP".to_string()),
        target_port: Some(IntOrString::Int(80)),
        ..ServicePort::default()
    }]);
    assert!(service_spec_matches(&desired, Some(&found)));

    found.ports = Some(vec![ServicePort {
        port: 80,
        target_port: Some(IntOrString::Int(8080)),
        ..ServicePort::default()
    }]);
    assert!(!service_spec_matches(&desired, Some(&found)));
    assert!(!service_spec_matches(&desired, None));
}

#[test]
pub fn test_deployment_spec_matches() {
    println!("Testing deployment_spec_matches()...");
    let app = stored_app_service("web", basic_spec());
    let desired = make_deployment_spec(&app);
    assert!(deployment_spec_matches(&desired, Some(&desired.clone())));

    let mut found = desired.clone();
    found.revision_history_limit = Some(10);
    found.template.spec.as_mut().unwrap().containers[0]
        .ports
        .as_mut()
        .unwrap()[0]
        .protocol = Some("TCP".to_string());
    assert!(deployment_spec_matches(&desired, Some(&found)));

    found.template.spec.as_mut().unwrap().containers[0].env = None;
    assert!(!deployment_spec_matches(&desired, Some(&found)));
    assert!(!deployment_spec_matches(&desired, None));
}

fn nanos(text: &str) -> QuantityValue {
    quantity_value(&Quantity(text.to_string()))
}

#[test]
pub fn test_quantity_value() {
    println!("Testing quantity_value()...");
    assert_eq!(nanos("0.5"), QuantityValue::Nanos(500_000_000));
    assert_eq!(nanos("0.5"), nanos("500m"));
    assert_eq!(nanos("5e-1"), nanos("500m"));
    assert_eq!(nanos("1"), nanos("1000m"));
    assert_eq!(nanos("1k"), nanos("1e3"));
    assert_eq!(nanos("1Gi"), nanos("1073741824"));
    assert_eq!(nanos("1.5Gi"), nanos("1536Mi"));
    assert_eq!(nanos("-2"), QuantityValue::Nanos(-2_000_000_000));
    assert_eq!(nanos("1n"), QuantityValue::Nanos(1));
    assert_eq!(nanos("0.1n"), QuantityValue::Nanos(1));
    assert_ne!(nanos("1"), nanos("2"));
    assert_ne!(nanos("1Mi"), nanos("1M"));
    assert_eq!(nanos("lots"), QuantityValue::Raw("lots".to_string()));
    assert_eq!(nanos("1.2.3"), QuantityValue::Raw("1.2.3".to_string()));
}

#[test]
pub fn test_deployment_spec_matches_canonical_forms() {
    let mut spec = basic_spec();
    spec.resources.as_mut().unwrap().limits = Some(BTreeMap::from([
        ("cpu".to_string(), Quantity("0.5".to_string())),
        ("memory".to_string(), Quantity("1Gi".to_string())),
    ]));
    spec.envs.push(EnvVar {
        name: "POD_NAME".to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: "metadata.name".to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    });
    let app = stored_app_service("web", spec);
    let desired = make_deployment_spec(&app);

    // As the API server stores it.
    let mut found = desired.clone();
    let container = &mut found.template.spec.as_mut().unwrap().containers[0];
    container.resources.as_mut().unwrap().limits = Some(BTreeMap::from([
        ("cpu".to_string(), Quantity("500m".to_string())),
        ("memory".to_string(), Quantity("1073741824".to_string())),
    ]));
    let env = container.env.as_mut().unwrap();
    env[1].value_from.as_mut().unwrap().field_ref.as_mut().unwrap().api_version = Some("v1".to_string());
    assert!(deployment_spec_matches(&desired, Some(&found)));

    let container = &mut found.template.spec.as_mut().unwrap().containers[0];
    container.resources.as_mut().unwrap().limits = Some(BTreeMap::from([
        ("cpu".to_string(), Quantity("600m".to_string())),
        ("memory".to_string(), Quantity("1Gi".to_string())),
    ]));
    assert!(!deployment_spec_matches(&desired, Some(&found)));
}
