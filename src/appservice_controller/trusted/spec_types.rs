// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, ServicePort};
use k8s_openapi::api::networking::v1::IngressRule;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// AppService describes how one application should run: its workload, the service in front
/// of it and, if any routing rules are given, an ingress.
/// The Deployment, Service and Ingress are derived from it and share its name.
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(group = "anvil.dev", version = "v1", kind = "AppService")]
#[kube(shortname = "app", namespaced)]
#[kube(derive = "PartialEq")]
pub struct AppServiceSpec {
    pub image: String,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,
}

impl AppServiceSpec {
    /// Rejects specs from which no valid children can be built.
    pub fn validate(&self) -> Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("spec.image must not be empty".to_string());
        }
        if self.replicas < 0 {
            return Err(format!("spec.replicas must not be negative, got {}", self.replicas));
        }
        let mut seen = BTreeSet::new();
        for port in &self.ports {
            if port.port <= 0 || port.port > 65535 {
                return Err(format!("spec.ports: {} is not a valid port number", port.port));
            }
            if !seen.insert(port.port) {
                return Err(format!("spec.ports: port {} is declared twice", port.port));
            }
        }
        Ok(())
    }
}

impl AppService {
    pub fn well_formed(&self) -> bool {
        self.metadata.name.is_some() && self.metadata.namespace.is_some() && self.metadata.uid.is_some()
    }
}
