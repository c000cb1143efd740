// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::common::*;
use crate::appservice_controller::exec::diff::deployment_spec_matches;
use crate::appservice_controller::trusted::spec_types::AppService;
use crate::kubernetes_api_objects::api_method::KubeGetRequest;
use crate::reconciler::reconciler::ReconcileError;
use crate::reconciler::resource_builder::ResourceBuilder;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::DynamicObject;

pub struct DeploymentBuilder {}

impl ResourceBuilder<AppService> for DeploymentBuilder {
    fn get_request(app: &AppService) -> KubeGetRequest {
        make_get_request::<Deployment>(app)
    }

    fn make(app: &AppService) -> Result<DynamicObject, ReconcileError> {
        marshal(&make_deployment(app)?)
    }

    fn update(app: &AppService, obj: DynamicObject) -> Result<DynamicObject, ReconcileError> {
        let found = unmarshal::<Deployment>(obj)?;
        check_controller(app, "Deployment", &found.metadata)?;
        marshal(&update_deployment(app, found)?)
    }

    fn matches(app: &AppService, obj: &DynamicObject) -> Result<bool, ReconcileError> {
        let found = unmarshal::<Deployment>(obj.clone())?;
        Ok(metadata_matches(app, &found.metadata)
            && deployment_spec_matches(&make_deployment_spec(app), found.spec.as_ref()))
    }
}

pub fn make_deployment(app: &AppService) -> Result<Deployment, ReconcileError> {
    Ok(Deployment {
        metadata: make_metadata(app)?,
        spec: Some(make_deployment_spec(app)),
        ..Deployment::default()
    })
}

/// update_deployment overwrites replicas, selector and pod template of the found Deployment
/// and keeps the rest of its spec (strategy, revision history limit, ...) as the store has it.
pub fn update_deployment(app: &AppService, found: Deployment) -> Result<Deployment, ReconcileError> {
    let made = make_deployment_spec(app);
    let mut spec = found.spec.clone().unwrap_or_default();
    spec.replicas = made.replicas;
    spec.selector = made.selector;
    spec.template = made.template;
    Ok(Deployment {
        metadata: update_metadata(app, found.metadata.clone())?,
        spec: Some(spec),
        ..found
    })
}

pub fn make_deployment_spec(app: &AppService) -> DeploymentSpec {
    DeploymentSpec {
        replicas: Some(app.spec.replicas),
        selector: LabelSelector {
            match_labels: Some(make_base_labels(app)),
            ..LabelSelector::default()
        },
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(make_base_labels(app)),
                ..ObjectMeta::default()
            }),
            spec: Some(PodSpec {
                containers: vec![make_container(app)],
                ..PodSpec::default()
            }),
        },
        ..DeploymentSpec::default()
    }
}

pub fn make_container(app: &AppService) -> Container {
    let ports = make_container_ports(app);
    Container {
        name: app_name(app),
        image: Some(app.spec.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        resources: app.spec.resources.clone(),
        ports: if ports.is_empty() { None } else { Some(ports) },
        env: if app.spec.envs.is_empty() {
            None
        } else {
            Some(app.spec.envs.clone())
        },
        ..Container::default()
    }
}

/// One container port per service port. A numeric targetPort names the container port,
/// otherwise the container listens on the service port itself.
pub fn make_container_ports(app: &AppService) -> Vec<ContainerPort> {
    app.spec
        .ports
        .iter()
        .map(|port| ContainerPort {
            container_port: match &port.target_port {
                Some(IntOrString::Int(target)) => *target,
                _ => port.port,
            },
            protocol: port.protocol.clone(),
            ..ContainerPort::default()
        })
        .collect()
}
