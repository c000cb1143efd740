// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::common::*;
use crate::appservice_controller::exec::diff::service_spec_matches;
use crate::appservice_controller::trusted::spec_types::AppService;
use crate::kubernetes_api_objects::api_method::KubeGetRequest;
use crate::reconciler::reconciler::ReconcileError;
use crate::reconciler::resource_builder::ResourceBuilder;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use kube::api::DynamicObject;

pub struct ServiceBuilder {}

impl ResourceBuilder<AppService> for ServiceBuilder {
    fn get_request(app: &AppService) -> KubeGetRequest {
        make_get_request::<Service>(app)
    }

    fn make(app: &AppService) -> Result<DynamicObject, ReconcileError> {
        marshal(&make_service(app)?)
    }

    fn update(app: &AppService, obj: DynamicObject) -> Result<DynamicObject, ReconcileError> {
        let found = unmarshal::<Service>(obj)?;
        check_controller(app, "Service", &found.metadata)?;
        marshal(&update_service(app, found)?)
    }

    fn matches(app: &AppService, obj: &DynamicObject) -> Result<bool, ReconcileError> {
        let found = unmarshal::<Service>(obj.clone())?;
        Ok(metadata_matches(app, &found.metadata) && service_spec_matches(&make_service_spec(app), found.spec.as_ref()))
    }
}

pub fn make_service(app: &AppService) -> Result<Service, ReconcileError> {
    Ok(Service {
        metadata: make_metadata(app)?,
        spec: Some(make_service_spec(app)),
        ..Service::default()
    })
}

/// update_service overwrites type, ports and selector. Every other field of the found spec
/// is kept, including clusterIP and clusterIPs, which the API server allocates once and
/// rejects any change to.
pub fn update_service(app: &AppService, found: Service) -> Result<Service, ReconcileError> {
    let made = make_service_spec(app);
    let found_spec = found.spec.clone().unwrap_or_default();
    let spec = ServiceSpec {
        type_: made.type_,
        ports: made.ports,
        selector: made.selector,
        ..found_spec
    };
    Ok(Service {
        metadata: update_metadata(app, found.metadata.clone())?,
        spec: Some(spec),
        ..found
    })
}

pub fn make_service_spec(app: &AppService) -> ServiceSpec {
    ServiceSpec {
        type_: Some("ClusterIP".to_string()),
        ports: if app.spec.ports.is_empty() {
            None
        } else {
            Some(app.spec.ports.clone())
        },
        selector: Some(make_base_labels(app)),
        ..ServiceSpec::default()
    }
}
