use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{CategoryId, CourseId, DetailId, HeaderId, HeaderStatus};
use super::repository::RepositoryError;

/// Why a write was refused even though its payload was well formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConflictReason {
    HeaderExpired {
        header_id: HeaderId,
    },
    StatusNotToggleable {
        header_id: HeaderId,
        status: HeaderStatus,
    },
    StaleVersion {
        header_id: HeaderId,
        expected: u64,
        actual: u64,
    },
    StaleRevision {
        expected: u64,
        actual: u64,
    },
    WriteContention,
    DetailInUse {
        detail_id: DetailId,
    },
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::HeaderExpired { header_id } => {
                write!(f, "header {header_id} has expired and no longer accepts changes")
            }
            ConflictReason::StatusNotToggleable { header_id, status } => write!(
                f,
                "header {header_id} is {} and cannot be toggled until its window opens",
                status.label()
            ),
            ConflictReason::StaleVersion {
                header_id,
                expected,
                actual,
            } => write!(
                f,
                "header {header_id} changed since version {expected} (now {actual}); reload and retry"
            ),
            ConflictReason::StaleRevision { expected, actual } => write!(
                f,
                "configuration moved from revision {expected} to {actual} during the write; reload and retry"
            ),
            ConflictReason::WriteContention => {
                write!(f, "another configuration write is in progress; retry shortly")
            }
            ConflictReason::DetailInUse { detail_id } => write!(
                f,
                "detail {detail_id} has settled transactions and cannot be deleted"
            ),
        }
    }
}

/// Error taxonomy shared by the configuration store and the resolution engine.
#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{0}")]
    Conflict(ConflictReason),
    #[error(
        "no applicable commission rule for course {course_id} in category {category_id} at {at}"
    )]
    NoApplicableRule {
        course_id: CourseId,
        category_id: CategoryId,
        at: DateTime<Utc>,
    },
    #[error("commission rules {detail_ids:?} tie on scope and priority {priority}")]
    AmbiguousRule {
        detail_ids: Vec<DetailId>,
        priority: i32,
    },
    #[error("header {0} not found")]
    HeaderNotFound(HeaderId),
    #[error("detail {0} not found")]
    DetailNotFound(DetailId),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl CommissionError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            CommissionError::Validation { .. } => "validation_error",
            CommissionError::Conflict(_) => "conflict",
            CommissionError::NoApplicableRule { .. } => "no_applicable_rule",
            CommissionError::AmbiguousRule { .. } => "ambiguous_rule",
            CommissionError::HeaderNotFound(_) | CommissionError::DetailNotFound(_) => {
                "not_found"
            }
            CommissionError::Repository(_) => "repository_unavailable",
        }
    }
}

impl From<RepositoryError> for CommissionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::StaleRevision { expected, actual } => {
                Self::Conflict(ConflictReason::StaleRevision { expected, actual })
            }
            RepositoryError::Contention => Self::Conflict(ConflictReason::WriteContention),
            RepositoryError::DetailInUse(detail_id) => {
                Self::Conflict(ConflictReason::DetailInUse { detail_id })
            }
            other => Self::Repository(other),
        }
    }
}
