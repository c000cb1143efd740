// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use std::fmt;

/// KubeObjectRef identifies the custom resource object a reconcile is running for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KubeObjectRef {
    pub name: String,
    pub namespace: String,
}

impl KubeObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> KubeObjectRef {
        KubeObjectRef {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for KubeObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
