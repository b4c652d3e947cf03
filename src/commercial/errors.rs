//! Error types for saving commercial records.
//!
//! Calculation has no error type: inputs are coerced, never rejected.

use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;

/// Message shown when the store gives no reason of its own.
pub const GENERIC_SAVE_FAILURE: &str = "Failed to save commercial data";

/// Problems caught before any persistence call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Select a booking before saving commercial data")]
    MissingBooking,

    #[error("{field} is required")]
    MissingAmount { field: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingBooking => "bookingId",
            ValidationError::MissingAmount { field } => *field,
        }
    }
}

/// A failed fetch, create, update or link call.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The store refused the payload.
    #[error("Commercial record rejected: {}", .reason.as_deref().unwrap_or(GENERIC_SAVE_FAILURE))]
    Rejected {
        reason: Option<String>,
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// Someone else saved the record since it was loaded.
    #[error("Commercial record {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { id: Uuid, expected: i32, actual: i32 },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PersistenceError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        PersistenceError::Rejected {
            reason: Some(reason.into()),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn rejected_field(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.to_string(), vec![message.into()]);
        PersistenceError::Rejected {
            reason: None,
            field_errors,
        }
    }

    /// The single message to show the user.
    ///
    /// Field messages win, then the store's reason, then a generic message.
    pub fn user_message(&self) -> String {
        match self {
            PersistenceError::Rejected {
                reason,
                field_errors,
            } => {
                let fields: Vec<String> = field_errors
                    .iter()
                    .flat_map(|(field, messages)| {
                        messages.iter().map(move |m| format!("{}: {}", field, m))
                    })
                    .collect();
                if !fields.is_empty() {
                    fields.join("; ")
                } else {
                    reason
                        .clone()
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| GENERIC_SAVE_FAILURE.to_string())
                }
            }
            PersistenceError::Conflict { .. } => {
                "This commercial record was changed by someone else. Reload it and try again."
                    .to_string()
            }
            PersistenceError::Timeout { .. } => {
                format!("{}: the server did not respond in time", GENERIC_SAVE_FAILURE)
            }
            PersistenceError::Database(_) => GENERIC_SAVE_FAILURE.to_string(),
        }
    }
}

/// Everything that can go wrong at the save boundary.
#[derive(Debug, thiserror::Error)]
pub enum CommercialError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A save for booking {0} is already in progress")]
    SaveInProgress(Uuid),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl CommercialError {
    pub fn user_message(&self) -> String {
        match self {
            CommercialError::Validation(e) => e.to_string(),
            CommercialError::SaveInProgress(_) => {
                "A save for this booking is already in progress".to_string()
            }
            CommercialError::Persistence(e) => e.user_message(),
        }
    }
}
