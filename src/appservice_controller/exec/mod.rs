// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod diff;
pub mod reconciler;
pub mod resource;
pub mod retry;
