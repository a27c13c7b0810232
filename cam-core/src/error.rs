//! Error types for CAM operations

use crate::access::Operation;
use crate::schema::EntityKind;
use crate::validation::FieldError;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("Insert failed for {entity}: {reason}")]
    InsertFailed { entity: EntityKind, reason: String },

    #[error("Update failed for {entity} with id {id}: {reason}")]
    UpdateFailed {
        entity: EntityKind,
        id: Uuid,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },
}

/// Master error type for all CAM errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CamError {
    #[error("Unknown entity: {name}")]
    UnknownEntity { name: String },

    #[error("Invalid filter field '{field}' for {entity}")]
    InvalidFilterField { entity: EntityKind, field: String },

    #[error("Invalid relation path '{path}' for {entity}")]
    InvalidRelationPath { entity: EntityKind, path: String },

    #[error("Forbidden: {operation} on {entity}")]
    Forbidden {
        entity: EntityKind,
        operation: Operation,
    },

    #[error("Validation failed for {entity}: {} invalid field(s)", .errors.len())]
    ValidationFailed {
        entity: EntityKind,
        errors: Vec<FieldError>,
    },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CamError {
    pub fn forbidden(entity: EntityKind, operation: Operation) -> Self {
        CamError::Forbidden { entity, operation }
    }

    pub fn invalid_field(entity: EntityKind, field: impl Into<String>) -> Self {
        CamError::InvalidFilterField {
            entity,
            field: field.into(),
        }
    }
}

/// Result type alias for CAM operations.
pub type CamResult<T> = Result<T, CamError>;
