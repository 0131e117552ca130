use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Money;
use crate::types::{LoanId, PeriodId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LendingError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("conflict: {message}")]
    Conflict {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error(
        "period limit exceeded for {period_id}: limit {limit}, current total {current_total}, requested {requested}"
    )]
    LimitExceeded {
        loan_id: LoanId,
        period_id: PeriodId,
        limit: Money,
        current_total: Money,
        requested: Money,
    },

    #[error("forbidden: {message}")]
    Forbidden {
        message: String,
    },

    #[error("salary oracle unavailable: {message}")]
    Oracle {
        message: String,
    },

    #[error("calculation error: {message}")]
    Calculation {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("store failure: {message}")]
    Store {
        message: String,
    },
}

impl LendingError {
    pub fn validation(message: impl Into<String>) -> Self {
        LendingError::Validation { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LendingError::Conflict { message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LendingError::NotFound { entity, id: id.to_string() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LendingError::Forbidden { message: message.into() }
    }

    pub fn overflow(context: &str) -> Self {
        LendingError::Calculation {
            message: format!("amount overflow while computing {}", context),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::Validation { .. }
            | LendingError::Calculation { .. }
            | LendingError::InvalidConfiguration { .. } => ErrorKind::Validation,
            LendingError::Conflict { .. } => ErrorKind::Conflict,
            LendingError::NotFound { .. } => ErrorKind::NotFound,
            LendingError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            LendingError::Forbidden { .. } => ErrorKind::Forbidden,
            LendingError::Oracle { .. } | LendingError::Store { .. } => ErrorKind::Unavailable,
        }
    }
}

/// coarse error classification for boundary mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    LimitExceeded,
    Forbidden,
    Unavailable,
}

/// structured failure returned at the boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureResponse {
    pub success: bool,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LendingError> for FailureResponse {
    fn from(err: &LendingError) -> Self {
        FailureResponse {
            success: false,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<LendingError> for FailureResponse {
    fn from(err: LendingError) -> Self {
        FailureResponse::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;
