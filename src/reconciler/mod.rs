// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod io;
#[allow(clippy::module_inception)]
pub mod reconciler;
pub mod resource_builder;
