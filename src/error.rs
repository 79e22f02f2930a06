// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt;

use thiserror::Error;

use crate::provisioning::Phase;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid project request: {0}")]
    Invalid(String),

    #[error("Project name '{name}' is forbidden: {reason}")]
    ForbiddenName { name: String, reason: String },

    #[error("User '{user}' has reached the limit of {limit} projects")]
    RequestLimitExceeded { user: String, limit: usize },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Project '{0}' already exists")]
    AlreadyExists(String),

    #[error("Project '{0}' not found")]
    NotFound(String),

    #[error("Template does not contain a Project object")]
    NoProjectObject,

    #[error("Template contains more than one Project object")]
    MultipleProjectObjects,

    #[error("Invalid project template: {0}")]
    InvalidTemplate(String),

    #[error("Unable to resolve REST mapping for {0}")]
    MappingUnresolved(String),

    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("Project cache has not completed its initial sync")]
    NotReady,
}

impl ProjectError {
    /// HTTP-equivalent status code a caller should surface for this error.
    /// Store errors keep the code the API server returned.
    pub fn status_code(&self) -> u16 {
        match self {
            ProjectError::KubeError(kube::Error::Api(resp)) => match resp.code {
                403 | 404 | 409 => resp.code,
                _ => 500,
            },
            ProjectError::KubeError(_) => 500,
            ProjectError::Invalid(_) | ProjectError::InvalidSelector(_) => 422,
            ProjectError::ForbiddenName { .. }
            | ProjectError::RequestLimitExceeded { .. }
            | ProjectError::Forbidden(_) => 403,
            ProjectError::AlreadyExists(_) => 409,
            ProjectError::NotFound(_) => 404,
            ProjectError::NoProjectObject
            | ProjectError::MultipleProjectObjects
            | ProjectError::InvalidTemplate(_)
            | ProjectError::MappingUnresolved(_) => 500,
            ProjectError::NotReady => 503,
        }
    }

    /// True for a name conflict, whether detected by the pre-check or by the store.
    pub fn is_conflict(&self) -> bool {
        self.status_code() == 409
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}

/// Returns true if the error is an API server response with the given code.
pub fn is_api_error(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Outcome of a failed project creation.
///
/// `rollback` holds the error from the best-effort project delete, if one
/// was attempted and failed. It is never retried.
#[derive(Debug)]
pub struct CreateFailure {
    pub phase: Phase,
    pub error: ProjectError,
    pub rollback: Option<kube::Error>,
}

impl CreateFailure {
    pub fn new(phase: Phase, error: ProjectError) -> Self {
        Self {
            phase,
            error,
            rollback: None,
        }
    }

    pub fn with_rollback(mut self, rollback: Option<kube::Error>) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn status_code(&self) -> u16 {
        self.error.status_code()
    }
}

impl fmt::Display for CreateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (during {})", self.error, self.phase)?;
        if let Some(rollback) = &self.rollback {
            write!(f, "; rollback failed: {}", rollback)?;
        }
        Ok(())
    }
}

impl std::error::Error for CreateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
