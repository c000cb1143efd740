// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::ControllerConfig;
use crate::external_shim_layer::ExternalShimLayer;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::common::KubeObjectRef;
use crate::reconciler::io::{Request, Response};
use crate::reconciler::reconciler::Reconciler;
use crate::shim_layer::fault_injection::CrashPlan;
use crate::shim_layer::store::{KubeStore, ResourceStore};
use crate::Error;
use anyhow::Result;
use futures::StreamExt;
use kube::{
    api::Api,
    runtime::{
        controller::{Action, Controller},
        watcher,
    },
    Client, Resource,
};
use kube_core::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{error, info, warn};

// The shim layer connects reconcile_core to the kube-rs controller runtime.
// The key is to implement the reconcile function (impl FnMut(Arc<K>, Arc<Ctx>) -> ReconcilerFut),
// which is required by the kube-rs framework to build a controller,
// on top of reconcile_core, which is provided by the developer.

/// Data is passed to every reconcile and error_policy invocation.
pub struct Data<R, E> {
    pub store: KubeStore,
    pub reconciler: R,
    pub external: E,
    pub config: ControllerConfig,
    pub fault_injection: Option<CrashPlan>,
}

/// run_controller prepares and runs the controller. It requires:
/// K: the custom resource type
/// R: the reconciler type
/// E: the external shim layer serving R's external requests
///
/// watch_owned registers the child kinds whose changes should also trigger a reconcile
/// of their owner. The kube-rs controller runs at most one reconcile per object at a time.
pub async fn run_controller<K, R, E, F>(
    client: Client,
    reconciler: R,
    external: E,
    config: ControllerConfig,
    fault_injection: Option<CrashPlan>,
    watch_owned: F,
) -> Result<()>
where
    K: Clone + Resource<Scope = NamespaceResourceScope, DynamicType = ()> + DeserializeOwned + Debug + Send + Sync + 'static,
    R: Reconciler + Send + Sync + 'static,
    R::S: Send,
    R::EReq: Send,
    R::EResp: Send,
    E: ExternalShimLayer<R::EReq, R::EResp> + Send + Sync + 'static,
    F: FnOnce(Controller<K>) -> Controller<K>,
{
    let crs = Api::<K>::all(client.clone());
    let data = Arc::new(Data {
        store: KubeStore::new(client),
        reconciler,
        external,
        config,
        fault_injection,
    });

    info!("starting controller");
    watch_owned(Controller::new(crs, watcher::Config::default()))
        .shutdown_on_signal()
        .run(reconcile::<K, R, E>, error_policy::<K, R, E>, data)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => info!(object = %obj, ?action, "reconciled"),
                Err(err) => warn!(error = %err, "reconcile failed"),
            }
        })
        .await;
    info!("controller terminated");
    Ok(())
}

async fn reconcile<K, R, E>(cr: Arc<K>, ctx: Arc<Data<R, E>>) -> Result<Action, Error>
where
    K: Resource<DynamicType = ()>,
    R: Reconciler,
    E: ExternalShimLayer<R::EReq, R::EResp>,
{
    let cr_name = cr.meta().name.as_ref().ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let cr_namespace = cr
        .meta()
        .namespace
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let cr_key = KubeObjectRef::new(cr_namespace.clone(), cr_name.clone());
    let cr_kind = K::kind(&()).to_string();

    reconcile_with(
        &ctx.reconciler,
        &ctx.external,
        &ctx.store,
        &cr_kind,
        &cr_key,
        ctx.fault_injection.as_ref(),
    )
    .await?;
    Ok(Action::requeue(ctx.config.resync_period()))
}

/// error_policy defines the controller's behavior when the reconcile ends with an error.
/// Retryable errors are requeued after a delay; the others wait until the object
/// or one of its children changes.
fn error_policy<K, R, E>(cr: Arc<K>, error: &Error, ctx: Arc<Data<R, E>>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    error!(
        object = cr.meta().name.as_deref().unwrap_or(""),
        retryable = error.is_retryable(),
        error = %error,
        "reconcile failed"
    );
    if error.is_retryable() {
        Action::requeue(ctx.config.error_requeue_period())
    } else {
        Action::await_change()
    }
}

/// reconcile_with implements one reconcile by repeatedly invoking reconciler.reconcile_core.
/// It starts with reconciler.reconcile_init_state, and in each iteration it invokes reconcile_core
/// with the new state returned by the previous invocation and the response to its request.
/// Kubernetes requests go to the store, external requests to the external shim layer.
/// It ends the loop when the reconciler reports the reconcile is done (reconcile_done)
/// or encounters error (reconcile_error), and returns the final state.
pub async fn reconcile_with<R, E, St>(
    reconciler: &R,
    external: &E,
    store: &St,
    cr_kind: &str,
    cr_key: &KubeObjectRef,
    fault_injection: Option<&CrashPlan>,
) -> Result<R::S, Error>
where
    R: Reconciler,
    E: ExternalShimLayer<R::EReq, R::EResp>,
    St: ResourceStore,
{
    let log_header = format!("Reconciling {}/{}:", cr_kind, cr_key);
    let mut state = reconciler.reconcile_init_state();
    let mut resp_option: Option<Response<R::EResp>> = None;

    // Call reconcile_core in a loop
    loop {
        if reconciler.reconcile_done(&state) {
            info!("{} done", log_header);
            return Ok(state);
        }
        if let Some(err) = reconciler.reconcile_error(&state) {
            warn!("{} error: {}", log_header, err);
            return Err(Error::ReconcileCoreError(err));
        }
        let (state_prime, request_option) = reconciler.reconcile_core(cr_key, resp_option, state);
        state = state_prime;
        resp_option = match request_option {
            Some(Request::KRequest(req)) => {
                let is_write = req.is_write();
                let resp = execute_kube_request(store, req, &log_header).await;
                if is_write {
                    if let Some(plan) = fault_injection {
                        plan.crash_or_continue(&log_header)?;
                    }
                }
                Some(Response::KResponse(resp))
            }
            Some(Request::ExternalRequest(req)) => Some(Response::ExternalResponse(external.external_call(req).await)),
            None => None,
        };
    }
}

async fn execute_kube_request<St: ResourceStore>(store: &St, req: KubeAPIRequest, log_header: &str) -> KubeAPIResponse {
    let key = req.key();
    match req {
        KubeAPIRequest::GetRequest(get_req) => {
            let res = store.get(get_req).await;
            match &res {
                Ok(_) => info!("{} Get {} done", log_header, key),
                Err(err) if err.is_object_not_found() => info!("{} Get {} not found", log_header, key),
                Err(err) => warn!("{} Get {} failed with error: {}", log_header, key, err),
            }
            KubeAPIResponse::GetResponse(KubeGetResponse { res })
        }
        KubeAPIRequest::CreateRequest(create_req) => {
            let res = store.create(create_req).await;
            match &res {
                Ok(_) => info!("{} Create {} done", log_header, key),
                Err(err) => warn!("{} Create {} failed with error: {}", log_header, key, err),
            }
            KubeAPIResponse::CreateResponse(KubeCreateResponse { res })
        }
        KubeAPIRequest::UpdateRequest(update_req) => {
            let res = store.update(update_req).await;
            match &res {
                Ok(_) => info!("{} Update {} done", log_header, key),
                Err(err) => warn!("{} Update {} failed with error: {}", log_header, key, err),
            }
            KubeAPIResponse::UpdateResponse(KubeUpdateResponse { res })
        }
        KubeAPIRequest::DeleteRequest(delete_req) => {
            let res = store.delete(delete_req).await;
            match &res {
                Ok(()) => info!("{} Delete {} done", log_header, key),
                Err(err) => warn!("{} Delete {} failed with error: {}", log_header, key, err),
            }
            KubeAPIResponse::DeleteResponse(KubeDeleteResponse { res })
        }
    }
}
