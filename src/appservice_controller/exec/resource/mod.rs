// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod common;
pub mod deployment;
pub mod ingress;
pub mod service;

pub use common::*;
pub use deployment::DeploymentBuilder;
pub use ingress::IngressBuilder;
pub use service::ServiceBuilder;
