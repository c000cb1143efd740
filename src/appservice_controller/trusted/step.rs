// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::reconciler::reconciler::ReconcileError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppServiceReconcileStep {
    Init,
    AfterGetAppService,
    AfterKRequestStep(ActionKind, SubResource),
    AfterBackoff(SubResource),
    Done,
    Error(ReconcileError),
}

/// The objects an AppService reconcile reads and writes, in the order they are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubResource {
    Deployment,
    Service,
    Ingress,
    AppService,
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubResource::Deployment => "Deployment",
            SubResource::Service => "Service",
            SubResource::Ingress => "Ingress",
            SubResource::AppService => "AppService",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Get,
    Create,
    Update,
    Delete,
}

/// AppServicePhase records which path a reconcile took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppServicePhase {
    /// The AppService was not found; its children are left to the garbage collector.
    Absent,
    /// No Deployment existed; the children are being created.
    Creating,
    /// Neither the spec nor any child needed a write.
    Synced,
    /// The spec changed or a child drifted; the children are being brought up to date.
    Reconciling,
    Error,
}
