// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// APIError is the error returned by the resource store to reconcile_core.
///
/// NotFound and Conflict are expected outcomes that reconcile_core handles inline;
/// Invalid and Unavailable end the current reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum APIError {
    #[error("object not found")]
    ObjectNotFound,
    #[error("object already exists")]
    ObjectAlreadyExists,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl APIError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, APIError::ObjectNotFound)
    }

    pub fn is_object_already_exists(&self) -> bool {
        matches!(self, APIError::ObjectAlreadyExists)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, APIError::Conflict(_))
    }
}

/// UnmarshalError is returned when a DynamicObject cannot be converted from or to a typed object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to unmarshal {kind}: {reason}")]
pub struct UnmarshalError {
    pub kind: String,
    pub reason: String,
}
