//! Error taxonomy for the gateway.
//!
//! `BrokerError` is what the orchestrator and repositories return. The
//! classified variants surface to callers as-is; storage failures collapse
//! into a generic internal error at the API boundary.

use std::fmt;

use thiserror::Error;

use crate::core::store::StoreError;
use crate::domain::RequestStatus;

/// Entity kinds that can be looked up by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Provider,
    Request,
    Response,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Provider => "provider",
            Entity::Request => "request",
            Entity::Response => "response",
        };
        f.write_str(name)
    }
}

/// Errors returned by repositories and the orchestrator
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("provider with this ID already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("requestor provider not found: {0}")]
    RequestorNotFound(String),

    #[error("target provider not found: {0}")]
    TargetNotFound(String),

    #[error("fromProviderId {actual} does not match target provider {expected} of request {request_id}")]
    SenderMismatch {
        request_id: String,
        expected: String,
        actual: String,
    },

    #[error("request {request_id} already resolved with status {status}")]
    AlreadyResolved {
        request_id: String,
        status: RequestStatus,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Coarse classification used by outer surfaces (HTTP, CLI)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input was missing or inconsistent
    Invalid,
    /// Referenced entity does not exist
    NotFound,
    /// Conflicts with existing state
    Conflict,
    /// Anything the caller cannot fix
    Internal,
}

impl BrokerError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Classify the error for outer surfaces.
    ///
    /// `TargetNotFound` is `Invalid` here because it arises from request
    /// creation input; the polling endpoint maps it to not-found itself.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::RequestorNotFound(_)
            | Self::TargetNotFound(_)
            | Self::SenderMismatch { .. } => ErrorKind::Invalid,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists(_) | Self::AlreadyResolved { .. } => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = BrokerError> = std::result::Result<T, E>;
