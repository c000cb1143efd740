// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod controller_runtime;
pub mod fault_injection;
pub mod store;

pub use controller_runtime::{reconcile_with, run_controller, Data};
pub use store::{KubeStore, ResourceStore};
