// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::exec::diff::{spec_changed, with_last_applied_spec};
use crate::appservice_controller::exec::resource::*;
use crate::appservice_controller::exec::retry::ConflictRetryPolicy;
use crate::appservice_controller::trusted::spec_types::AppService;
use crate::appservice_controller::trusted::step::*;
use crate::external_shim_layer::{BackoffRequest, BackoffResponse};
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::common::KubeObjectRef;
use crate::kubernetes_api_objects::dynamic::KubeObject;
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::io::{Request, Response};
use crate::reconciler::reconciler::{ReconcileError, Reconciler};
use crate::reconciler::resource_builder::ResourceBuilder;
use kube::api::DynamicObject;
use tracing::info;

type AppServiceRequest = Request<BackoffRequest>;
type AppServiceResponse = Response<BackoffResponse>;

/// AppServiceReconciler drives the Deployment, Service and Ingress of an AppService.
///
/// One reconcile reads the AppService, then handles the children in the order
/// Deployment, Service, Ingress: each child is read, then created, updated, deleted
/// or left alone. Once all children are done, the spec is recorded in the
/// last-applied annotation of the AppService if it differs from the recorded one.
#[derive(Debug, Clone, Default)]
pub struct AppServiceReconciler {
    pub retry: ConflictRetryPolicy,
}

impl AppServiceReconciler {
    pub fn new(retry: ConflictRetryPolicy) -> AppServiceReconciler {
        AppServiceReconciler { retry }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppServiceReconcileState {
    pub reconcile_step: AppServiceReconcileStep,
    /// The AppService as read at the start of this reconcile.
    pub app: Option<AppService>,
    pub phase: AppServicePhase,
    /// Conflicts seen by the write in flight; reset after every successful write.
    pub conflict_attempts: u32,
    /// The writes that succeeded in this reconcile, in order.
    pub writes: Vec<(ActionKind, SubResource)>,
}

impl Reconciler for AppServiceReconciler {
    type S = AppServiceReconcileState;
    type K = AppService;
    type EReq = BackoffRequest;
    type EResp = BackoffResponse;

    fn reconcile_init_state(&self) -> AppServiceReconcileState {
        reconcile_init_state()
    }

    fn reconcile_core(
        &self,
        cr_key: &KubeObjectRef,
        resp_o: Option<AppServiceResponse>,
        state: AppServiceReconcileState,
    ) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
        reconcile_core(&self.retry, cr_key, resp_o, state)
    }

    fn reconcile_done(&self, state: &AppServiceReconcileState) -> bool {
        reconcile_done(state)
    }

    fn reconcile_error(&self, state: &AppServiceReconcileState) -> Option<ReconcileError> {
        reconcile_error(state)
    }
}

pub fn reconcile_init_state() -> AppServiceReconcileState {
    AppServiceReconcileState {
        reconcile_step: AppServiceReconcileStep::Init,
        app: None,
        phase: AppServicePhase::Synced,
        conflict_attempts: 0,
        writes: Vec::new(),
    }
}

pub fn reconcile_done(state: &AppServiceReconcileState) -> bool {
    matches!(state.reconcile_step, AppServiceReconcileStep::Done)
}

pub fn reconcile_error(state: &AppServiceReconcileState) -> Option<ReconcileError> {
    match &state.reconcile_step {
        AppServiceReconcileStep::Error(err) => Some(err.clone()),
        _ => None,
    }
}

pub fn reconcile_core(
    retry: &ConflictRetryPolicy,
    cr_key: &KubeObjectRef,
    resp_o: Option<AppServiceResponse>,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let step = state.reconcile_step.clone();
    match step {
        AppServiceReconcileStep::Init => {
            let req_o = KubeAPIRequest::GetRequest(get_app_service_request(cr_key));
            let state_prime = AppServiceReconcileState {
                reconcile_step: AppServiceReconcileStep::AfterGetAppService,
                ..state
            };
            (state_prime, Some(Request::KRequest(req_o)))
        }
        AppServiceReconcileStep::AfterGetAppService => {
            let Some(get_resp) = get_result(resp_o) else {
                return unexpected_response(state, "the AppService");
            };
            match get_resp {
                Ok(obj) => start_with_app_service(cr_key, obj, state),
                Err(err) if err.is_object_not_found() => {
                    info!("AppService {} not found, its children are left to the garbage collector", cr_key);
                    let state_prime = AppServiceReconcileState {
                        phase: AppServicePhase::Absent,
                        ..state
                    };
                    done_state(state_prime)
                }
                Err(err) => error_state(state, err.into()),
            }
        }
        AppServiceReconcileStep::AfterKRequestStep(_, SubResource::AppService) => {
            record_last_applied_spec(retry, cr_key, resp_o, state)
        }
        AppServiceReconcileStep::AfterKRequestStep(_, resource) => {
            let Some(app) = state.app.clone() else {
                return error_state(state, ReconcileError::Invalid("no AppService to reconcile".to_string()));
            };
            match resource {
                SubResource::Deployment => reconcile_helper::<DeploymentBuilder>(retry, &app, resp_o, state),
                SubResource::Service => reconcile_helper::<ServiceBuilder>(retry, &app, resp_o, state),
                SubResource::Ingress => reconcile_helper::<IngressBuilder>(retry, &app, resp_o, state),
                SubResource::AppService => unexpected_response(state, "the AppService"),
            }
        }
        AppServiceReconcileStep::AfterBackoff(resource) => {
            let Some(app) = state.app.clone() else {
                return error_state(state, ReconcileError::Invalid("no AppService to reconcile".to_string()));
            };
            if !resp_o.as_ref().is_some_and(Response::is_external_response) {
                return unexpected_response(state, "the backoff");
            }
            // Re-read the object so that the next attempt is derived from its latest version.
            let req_o = match resource {
                SubResource::Deployment => DeploymentBuilder::get_request(&app),
                SubResource::Service => ServiceBuilder::get_request(&app),
                SubResource::Ingress => IngressBuilder::get_request(&app),
                SubResource::AppService => get_app_service_request(cr_key),
            };
            let state_prime = AppServiceReconcileState {
                reconcile_step: AppServiceReconcileStep::AfterKRequestStep(ActionKind::Get, resource),
                ..state
            };
            (state_prime, Some(Request::KRequest(KubeAPIRequest::GetRequest(req_o))))
        }
        AppServiceReconcileStep::Done | AppServiceReconcileStep::Error(_) => (state, None),
    }
}

fn start_with_app_service(
    cr_key: &KubeObjectRef,
    obj: DynamicObject,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let app = match unmarshal::<AppService>(obj) {
        Ok(app) => app,
        Err(err) => return error_state(state, err),
    };
    if !app.well_formed() {
        return error_state(
            state,
            ReconcileError::Invalid(format!("AppService {} misses name, namespace or uid", cr_key)),
        );
    }
    if let Err(msg) = app.spec.validate() {
        return error_state(state, ReconcileError::Invalid(msg));
    }
    let phase = if spec_changed(&app) {
        AppServicePhase::Reconciling
    } else {
        AppServicePhase::Synced
    };
    let req_o = KubeAPIRequest::GetRequest(DeploymentBuilder::get_request(&app));
    let state_prime = AppServiceReconcileState {
        reconcile_step: AppServiceReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::Deployment),
        app: Some(app),
        phase,
        ..state
    };
    (state_prime, Some(Request::KRequest(req_o)))
}

/// reconcile_helper handles the response to a request on one child and decides the next request.
///
/// After a get it creates, updates or deletes the child, or moves on if the child already
/// matches. After a successful write it moves on to the next child. A write that conflicts
/// is retried from a fresh get after a backoff, at most retry.max_attempts times.
pub fn reconcile_helper<Builder: ResourceBuilder<AppService>>(
    retry: &ConflictRetryPolicy,
    app: &AppService,
    resp_o: Option<AppServiceResponse>,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let AppServiceReconcileStep::AfterKRequestStep(action, resource) = state.reconcile_step.clone() else {
        return error_state(state, ReconcileError::Invalid("reconcile_helper called out of order".to_string()));
    };
    match action {
        ActionKind::Get => {
            let Some(get_resp) = get_result(resp_o) else {
                return unexpected_response(state, &resource.to_string());
            };
            match get_resp {
                Ok(obj) => {
                    if let Err(err) = check_controller(app, &resource.to_string(), &obj.metadata) {
                        return error_state(state, err);
                    }
                    if !Builder::required(app) {
                        let req_o = KubeAPIRequest::DeleteRequest(KubeDeleteRequest {
                            api_resource: Builder::get_request(app).api_resource,
                            name: app_name(app),
                            namespace: app_namespace(app),
                            uid: obj.metadata.uid.clone(),
                        });
                        return write_request(state, ActionKind::Delete, resource, req_o);
                    }
                    match Builder::matches(app, &obj) {
                        Ok(true) => next_resource(app, resource, state),
                        Ok(false) => match Builder::update(app, obj) {
                            Ok(updated_obj) => {
                                let req_o = KubeAPIRequest::UpdateRequest(KubeUpdateRequest {
                                    api_resource: Builder::get_request(app).api_resource,
                                    name: app_name(app),
                                    namespace: app_namespace(app),
                                    obj: updated_obj,
                                });
                                write_request(state, ActionKind::Update, resource, req_o)
                            }
                            Err(err) => error_state(state, err),
                        },
                        Err(err) => error_state(state, err),
                    }
                }
                Err(err) if err.is_object_not_found() => {
                    if !Builder::required(app) {
                        return next_resource(app, resource, state);
                    }
                    let state = if resource == SubResource::Deployment {
                        AppServiceReconcileState {
                            phase: AppServicePhase::Creating,
                            ..state
                        }
                    } else {
                        state
                    };
                    match Builder::make(app) {
                        Ok(created_obj) => {
                            let req_o = KubeAPIRequest::CreateRequest(KubeCreateRequest {
                                api_resource: Builder::get_request(app).api_resource,
                                namespace: app_namespace(app),
                                obj: created_obj,
                            });
                            write_request(state, ActionKind::Create, resource, req_o)
                        }
                        Err(err) => error_state(state, err),
                    }
                }
                Err(err) => error_state(state, err.into()),
            }
        }
        ActionKind::Create | ActionKind::Update | ActionKind::Delete => {
            let Some(write_resp) = write_result(resp_o) else {
                return unexpected_response(state, &resource.to_string());
            };
            match write_resp {
                Ok(_) => {
                    let state_prime = after_successful_write(state, action, resource);
                    next_resource(app, resource, state_prime)
                }
                // The child is already gone, which is all the delete wanted.
                Err(err) if action == ActionKind::Delete && err.is_object_not_found() => {
                    next_resource(app, resource, state)
                }
                Err(err) if needs_refetch(action, &err) => back_off_and_refetch(retry, state, resource, err),
                Err(err) => error_state(state, err.into()),
            }
        }
    }
}

/// Whether a failed write lost a race and should be derived again from a fresh read:
/// a stale resource version, a concurrent creator, or a concurrent delete under an update.
fn needs_refetch(action: ActionKind, err: &APIError) -> bool {
    err.is_conflict()
        || (action == ActionKind::Create && err.is_object_already_exists())
        || (action == ActionKind::Update && err.is_object_not_found())
}

fn back_off_and_refetch(
    retry: &ConflictRetryPolicy,
    state: AppServiceReconcileState,
    resource: SubResource,
    err: APIError,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let attempts = state.conflict_attempts.saturating_add(1);
    if !retry.allows_retry(attempts) {
        return error_state(
            state,
            ReconcileError::Unavailable(format!(
                "writing {} still conflicts after {} attempts: {}",
                resource, attempts, err
            )),
        );
    }
    let req_o = BackoffRequest {
        delay: retry.backoff(attempts),
    };
    let state_prime = AppServiceReconcileState {
        reconcile_step: AppServiceReconcileStep::AfterBackoff(resource),
        conflict_attempts: attempts,
        ..state
    };
    (state_prime, Some(Request::ExternalRequest(req_o)))
}

fn after_successful_write(
    state: AppServiceReconcileState,
    action: ActionKind,
    resource: SubResource,
) -> AppServiceReconcileState {
    let mut writes = state.writes;
    writes.push((action, resource));
    // A drifted child turns a reconcile that found the spec unchanged into a reconciling one.
    let phase = match state.phase {
        AppServicePhase::Synced => AppServicePhase::Reconciling,
        phase => phase,
    };
    AppServiceReconcileState {
        conflict_attempts: 0,
        writes,
        phase,
        ..state
    }
}

fn next_resource(
    app: &AppService,
    resource: SubResource,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let next = match resource {
        SubResource::Deployment => Some((SubResource::Service, ServiceBuilder::get_request(app))),
        SubResource::Service => Some((SubResource::Ingress, IngressBuilder::get_request(app))),
        SubResource::Ingress | SubResource::AppService => None,
    };
    match next {
        Some((next_resource, get_req)) => {
            let state_prime = AppServiceReconcileState {
                reconcile_step: AppServiceReconcileStep::AfterKRequestStep(ActionKind::Get, next_resource),
                conflict_attempts: 0,
                ..state
            };
            (state_prime, Some(Request::KRequest(KubeAPIRequest::GetRequest(get_req))))
        }
        None => update_last_applied_spec(app, state),
    }
}

/// Records the spec in the last-applied annotation, unless it is already recorded.
fn update_last_applied_spec(
    app: &AppService,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    if !spec_changed(app) {
        return done_state(state);
    }
    let annotated = match with_last_applied_spec(app).and_then(|annotated| marshal(&annotated)) {
        Ok(annotated) => annotated,
        Err(err) => return error_state(state, err),
    };
    let req_o = KubeAPIRequest::UpdateRequest(KubeUpdateRequest {
        api_resource: AppService::api_resource(),
        name: app_name(app),
        namespace: app_namespace(app),
        obj: annotated,
    });
    write_request(state, ActionKind::Update, SubResource::AppService, req_o)
}

/// Handles the responses on the way to the last-applied annotation: the update itself,
/// and the re-read of the AppService after the update conflicted.
fn record_last_applied_spec(
    retry: &ConflictRetryPolicy,
    cr_key: &KubeObjectRef,
    resp_o: Option<AppServiceResponse>,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let AppServiceReconcileStep::AfterKRequestStep(action, _) = state.reconcile_step.clone() else {
        return error_state(state, ReconcileError::Invalid("record_last_applied_spec called out of order".to_string()));
    };
    let Some(resp) = resp_o.and_then(Response::into_k_response) else {
        return unexpected_response(state, "the AppService");
    };
    match action {
        ActionKind::Update => match resp.into_write_result() {
            Some(Ok(_)) => {
                let state_prime = after_successful_write(state, ActionKind::Update, SubResource::AppService);
                done_state(state_prime)
            }
            Some(Err(err)) if err.is_object_not_found() => deleted_mid_reconcile(cr_key, state),
            Some(Err(err)) if err.is_conflict() => {
                back_off_and_refetch(retry, state, SubResource::AppService, err)
            }
            Some(Err(err)) => error_state(state, err.into()),
            None => unexpected_response(state, "the AppService"),
        },
        ActionKind::Get => match resp.into_get_result() {
            Some(Ok(obj)) => {
                let fresh = match unmarshal::<AppService>(obj) {
                    Ok(fresh) => fresh,
                    Err(err) => return error_state(state, err),
                };
                // A newer spec has not been applied to the children yet and triggers its own reconcile.
                if state.app.as_ref().map(|app| &app.spec) != Some(&fresh.spec) {
                    info!("AppService {} changed during the reconcile, not recording its spec", cr_key);
                    return done_state(state);
                }
                let state_prime = AppServiceReconcileState {
                    app: Some(fresh.clone()),
                    ..state
                };
                update_last_applied_spec(&fresh, state_prime)
            }
            Some(Err(err)) if err.is_object_not_found() => deleted_mid_reconcile(cr_key, state),
            Some(Err(err)) => error_state(state, err.into()),
            None => unexpected_response(state, "the AppService"),
        },
        ActionKind::Create | ActionKind::Delete => unexpected_response(state, "the AppService"),
    }
}

fn deleted_mid_reconcile(
    cr_key: &KubeObjectRef,
    state: AppServiceReconcileState,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    info!("AppService {} was deleted during the reconcile", cr_key);
    let state_prime = AppServiceReconcileState {
        phase: AppServicePhase::Absent,
        ..state
    };
    done_state(state_prime)
}

fn get_app_service_request(cr_key: &KubeObjectRef) -> KubeGetRequest {
    KubeGetRequest {
        api_resource: AppService::api_resource(),
        name: cr_key.name.clone(),
        namespace: cr_key.namespace.clone(),
    }
}

fn get_result(resp_o: Option<AppServiceResponse>) -> Option<Result<DynamicObject, APIError>> {
    resp_o?.into_k_response()?.into_get_result()
}

fn write_result(resp_o: Option<AppServiceResponse>) -> Option<Result<Option<DynamicObject>, APIError>> {
    resp_o?.into_k_response()?.into_write_result()
}

fn write_request(
    state: AppServiceReconcileState,
    action: ActionKind,
    resource: SubResource,
    req_o: KubeAPIRequest,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let state_prime = AppServiceReconcileState {
        reconcile_step: AppServiceReconcileStep::AfterKRequestStep(action, resource),
        ..state
    };
    (state_prime, Some(Request::KRequest(req_o)))
}

fn unexpected_response(
    state: AppServiceReconcileState,
    what: &str,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    error_state(
        state,
        ReconcileError::Invalid(format!("unexpected response for {}", what)),
    )
}

pub fn done_state(state: AppServiceReconcileState) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    info!(phase = ?state.phase, writes = state.writes.len(), "AppService reconcile done");
    let state_prime = AppServiceReconcileState {
        reconcile_step: AppServiceReconcileStep::Done,
        ..state
    };
    (state_prime, None)
}

pub fn error_state(
    state: AppServiceReconcileState,
    err: ReconcileError,
) -> (AppServiceReconcileState, Option<AppServiceRequest>) {
    let state_prime = AppServiceReconcileState {
        reconcile_step: AppServiceReconcileStep::Error(err),
        phase: AppServicePhase::Error,
        ..state
    };
    (state_prime, None)
}
