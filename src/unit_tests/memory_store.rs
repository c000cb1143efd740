// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::appservice_controller::trusted::step::ActionKind;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::dynamic::KubeObject;
use crate::kubernetes_api_objects::error::APIError;
use crate::shim_layer::store::ResourceStore;
use kube::api::DynamicObject;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type ObjectKey = (String, String, String);
type Hook = Box<dyn FnOnce(&mut StoreState) + Send>;

/// StoreState holds the objects of a MemoryStore and assigns what the API server assigns:
/// uids, resource versions and service cluster IPs.
#[derive(Default)]
pub struct StoreState {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    version: u64,
    uids: u64,
    cluster_ips: u32,
}

impl StoreState {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    pub fn contains(&self, kind: &str, namespace: &str, name: &str) -> bool {
        self.objects
            .contains_key(&(kind.to_string(), namespace.to_string(), name.to_string()))
    }

    /// Stores obj as a new object, the way the API server handles a create.
    pub fn insert(&mut self, kind: &str, namespace: &str, obj: DynamicObject) -> Result<DynamicObject, APIError> {
        let mut obj = obj;
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| APIError::Invalid("metadata.name: Required value".to_string()))?;
        let key = (kind.to_string(), namespace.to_string(), name);
        if self.objects.contains_key(&key) {
            return Err(APIError::ObjectAlreadyExists);
        }
        self.uids += 1;
        obj.metadata.namespace = Some(namespace.to_string());
        obj.metadata.uid = Some(format!("uid-{}", self.uids));
        obj.metadata.resource_version = Some(self.next_version());
        if kind == "Service" && obj.data["spec"]["clusterIP"].is_null() {
            self.cluster_ips += 1;
            let ip = format!("10.96.0.{}", self.cluster_ips);
            obj.data["spec"]["clusterIP"] = json!(ip);
            obj.data["spec"]["clusterIPs"] = json!([ip]);
        }
        self.objects.insert(key, obj.clone());
        Ok(obj)
    }

    /// Applies f to a stored object and bumps its resource version, like a write by another actor.
    pub fn modify(&mut self, kind: &str, namespace: &str, name: &str, f: impl FnOnce(&mut DynamicObject)) {
        let version = self.next_version();
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        if let Some(obj) = self.objects.get_mut(&key) {
            f(obj);
            obj.metadata.resource_version = Some(version);
        }
    }

    fn get(&self, kind: &str, namespace: &str, name: &str) -> Result<DynamicObject, APIError> {
        self.objects
            .get(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or(APIError::ObjectNotFound)
    }

    fn update(&mut self, kind: &str, req: KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        let key = (kind.to_string(), req.namespace.clone(), req.name.clone());
        let stored = self.objects.get(&key).cloned().ok_or(APIError::ObjectNotFound)?;
        let mut obj = req.obj;
        if obj.metadata.resource_version.is_some() && obj.metadata.resource_version != stored.metadata.resource_version {
            return Err(APIError::Conflict(format!(
                "the object {}/{} has been modified; please apply your changes to the latest version",
                req.namespace, req.name
            )));
        }
        if kind == "Service" && obj.data["spec"]["clusterIP"] != stored.data["spec"]["clusterIP"] {
            return Err(APIError::Invalid("spec.clusterIP: Invalid value: field is immutable".to_string()));
        }
        obj.metadata.name = Some(req.name);
        obj.metadata.namespace = Some(req.namespace);
        obj.metadata.uid = stored.metadata.uid.clone();
        obj.metadata.resource_version = stored.metadata.resource_version.clone();
        // A write that changes nothing keeps the resource version.
        if serde_json::to_value(&obj).ok() == serde_json::to_value(&stored).ok() {
            return Ok(stored);
        }
        obj.metadata.resource_version = Some(self.next_version());
        self.objects.insert(key, obj.clone());
        Ok(obj)
    }

    fn delete(&mut self, kind: &str, req: KubeDeleteRequest) -> Result<(), APIError> {
        let key = (kind.to_string(), req.namespace, req.name);
        let stored = self.objects.get(&key).ok_or(APIError::ObjectNotFound)?;
        if req.uid.is_some() && req.uid != stored.metadata.uid {
            return Err(APIError::Conflict("uid precondition failed".to_string()));
        }
        let uid = stored.metadata.uid.clone();
        self.objects.remove(&key);
        // Owner cascade, as the garbage collector would do it.
        self.objects.retain(|_, obj| {
            !obj.metadata
                .owner_references
                .iter()
                .flatten()
                .any(|or| Some(&or.uid) == uid.as_ref())
        });
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    state: StoreState,
    writes: Vec<(ActionKind, String)>,
    failures: Vec<(ActionKind, String, APIError)>,
    hooks: Vec<(ActionKind, String, Hook)>,
}

impl Inner {
    /// Runs the hook and returns the failure registered for the next request of this verb and kind.
    fn intercept(&mut self, verb: ActionKind, kind: &str) -> Result<(), APIError> {
        if verb != ActionKind::Get {
            self.writes.push((verb, kind.to_string()));
        }
        if let Some(i) = self.hooks.iter().position(|(v, k, _)| *v == verb && k == kind) {
            let (_, _, hook) = self.hooks.remove(i);
            hook(&mut self.state);
        }
        if let Some(i) = self.failures.iter().position(|(v, k, _)| *v == verb && k == kind) {
            let (_, _, err) = self.failures.remove(i);
            return Err(err);
        }
        Ok(())
    }
}

/// MemoryStore is a ResourceStore with the optimistic concurrency of the API server,
/// for driving reconciles in tests. It records every write request it receives
/// and can fail or interfere with the next request of a given verb and kind.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Stores obj as if created by a user and returns it as stored.
    pub fn put<K: KubeObject>(&self, obj: &K) -> K {
        let namespace = obj.meta().namespace.clone().unwrap_or_else(|| "default".to_string());
        let stored = self
            .lock()
            .state
            .insert(&K::kind(&()), &namespace, obj.marshal().unwrap())
            .unwrap();
        K::unmarshal(stored).unwrap()
    }

    pub fn get_typed<K: KubeObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let obj = self.lock().state.get(&K::kind(&()), namespace, name).ok()?;
        Some(K::unmarshal(obj).unwrap())
    }

    pub fn get_dynamic<K: KubeObject>(&self, namespace: &str, name: &str) -> Option<DynamicObject> {
        self.lock().state.get(&K::kind(&()), namespace, name).ok()
    }

    /// Changes a stored object as another actor would, bumping its resource version.
    pub fn mutate<K: KubeObject>(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        mutate_in::<K>(&mut self.lock().state, namespace, name, f);
    }

    /// Removes a stored object without cascading, as a user deleting an orphan would.
    pub fn remove<K: KubeObject>(&self, namespace: &str, name: &str) {
        self.lock()
            .state
            .objects
            .remove(&(K::kind(&()).to_string(), namespace.to_string(), name.to_string()));
    }

    pub fn contains<K: KubeObject>(&self, namespace: &str, name: &str) -> bool {
        self.lock().state.contains(&K::kind(&()), namespace, name)
    }

    /// Every write request received so far, including the failed ones.
    pub fn writes(&self) -> Vec<(ActionKind, String)> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Fails the next request of this verb and kind with err.
    pub fn fail_next(&self, verb: ActionKind, kind: &str, err: APIError) {
        self.lock().failures.push((verb, kind.to_string(), err));
    }

    /// Runs hook right before the next request of this verb and kind is served.
    pub fn before_next(&self, verb: ActionKind, kind: &str, hook: impl FnOnce(&mut StoreState) + Send + 'static) {
        self.lock().hooks.push((verb, kind.to_string(), Box::new(hook)));
    }
}

pub fn mutate_in<K: KubeObject>(state: &mut StoreState, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
    state.modify(&K::kind(&()), namespace, name, |obj| {
        let mut typed = K::unmarshal(obj.clone()).unwrap();
        f(&mut typed);
        let mut changed = typed.marshal().unwrap();
        changed.metadata.resource_version = obj.metadata.resource_version.clone();
        *obj = changed;
    });
}

impl ResourceStore for MemoryStore {
    async fn get(&self, req: KubeGetRequest) -> Result<DynamicObject, APIError> {
        let mut inner = self.lock();
        inner.intercept(ActionKind::Get, &req.api_resource.kind)?;
        inner.state.get(&req.api_resource.kind, &req.namespace, &req.name)
    }

    async fn create(&self, req: KubeCreateRequest) -> Result<DynamicObject, APIError> {
        let mut inner = self.lock();
        inner.intercept(ActionKind::Create, &req.api_resource.kind)?;
        inner.state.insert(&req.api_resource.kind, &req.namespace, req.obj)
    }

    async fn update(&self, req: KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        let mut inner = self.lock();
        let kind = req.api_resource.kind.clone();
        inner.intercept(ActionKind::Update, &kind)?;
        inner.state.update(&kind, req)
    }

    async fn delete(&self, req: KubeDeleteRequest) -> Result<(), APIError> {
        let mut inner = self.lock();
        let kind = req.api_resource.kind.clone();
        inner.intercept(ActionKind::Delete, &kind)?;
        inner.state.delete(&kind, req)
    }
}
