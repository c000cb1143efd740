// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod config;
pub mod diff;
pub mod external_shim_layer;
pub mod fault_injection;
pub mod memory_store;
pub mod retry;
