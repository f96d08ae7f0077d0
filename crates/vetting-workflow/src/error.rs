//! Workflow Error Taxonomy
//!
//! Every engine failure is a typed result, never a silent drop. Bulk
//! operations aggregate per-item failures as [`ErrorKind`] discriminants
//! without raising for the batch call itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use vetting_types::{DeliveryStatus, ProcessStatus};

use crate::store::StoreError;

/// Main error type for workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The attempted action is illegal for the process's current state.
    /// Never retried automatically; surfaced to the admin as-is.
    #[error("cannot {action} a process that is {from}")]
    InvalidTransition {
        from: ProcessStatus,
        action: &'static str,
    },

    /// Another reviewer mutated the process since it was read. Recoverable
    /// by re-fetch-and-retry.
    #[error(
        "process {process_id} was already modified by another reviewer \
         (expected version {expected}, found {actual}); refresh and retry"
    )]
    VersionConflict {
        process_id: Uuid,
        expected: u64,
        actual: u64,
    },

    /// Malformed input; not retryable until corrected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resubmission missing required fields; surfaced with the outstanding list.
    #[error("resubmission is missing required fields: {}", .missing.join(", "))]
    IncompleteSubmission { missing: Vec<String> },

    /// Communication-log misuse; treated as a defect and logged, not shown
    /// to end users.
    #[error("delivery status cannot advance from {from} to {to}")]
    InvalidDeliveryTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("process {0} not found")]
    ProcessNotFound(Uuid),

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("risk assessment provider failed: {0}")]
    RiskProvider(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl WorkflowError {
    /// Lift a store failure, promoting the variants that have a first-class
    /// workflow meaning.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::ProcessNotFound(id) => Self::ProcessNotFound(id),
            StoreError::MessageNotFound(id) => Self::MessageNotFound(id),
            StoreError::VersionConflict {
                process_id,
                expected,
                actual,
            } => Self::VersionConflict {
                process_id,
                expected,
                actual,
            },
            other => Self::Store(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::IncompleteSubmission { .. } => ErrorKind::IncompleteSubmission,
            Self::InvalidDeliveryTransition { .. } => ErrorKind::InvalidDeliveryTransition,
            Self::ProcessNotFound(_) | Self::MessageNotFound(_) => ErrorKind::NotFound,
            Self::RiskProvider(_) => ErrorKind::Provider,
            Self::Store(_) => ErrorKind::Store,
        }
    }
}

/// Input validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("at least one required field must be named")]
    NoRequiredFields,

    #[error("message content must not be empty")]
    EmptyMessage,

    #[error("deadline {0} is not in the future")]
    DeadlineNotInFuture(chrono::DateTime<chrono::Utc>),

    #[error("unknown rejection reason code '{0}'")]
    UnknownReasonCode(String),
}

/// Stable, serialisable discriminant for per-item bulk outcomes and UI callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    VersionConflict,
    Validation,
    IncompleteSubmission,
    InvalidDeliveryTransition,
    NotFound,
    Provider,
    Store,
}

impl ErrorKind {
    /// Only a stale read is safe to retry automatically (once, after re-fetch).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict)
    }
}
