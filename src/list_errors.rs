//! # List Error Types Module
//!
//! This module defines the error types used by the shopping/inventory list engine.
//! Validation problems block a submit, conversion problems fall back to separate
//! line items, and persistence problems are surfaced without losing the draft.

use crate::draft::DraftError;
use crate::unit_conversion::ConversionError;

/// Errors raised by list operations
#[derive(Debug, Clone, PartialEq)]
pub enum ListError {
    /// Draft failed the mismatch validation or a required field is missing
    Validation(String),
    /// Unit conversion failed
    Conversion(String),
    /// The document store rejected or failed an operation
    Persistence(String),
    /// A referenced document or session step does not exist
    NotFound(String),
    /// A draft update was rejected
    Draft(String),
    /// The expiry prediction service failed
    Prediction(String),
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListError::Validation(msg) => write!(f, "Validation error: {msg}"),
            ListError::Conversion(msg) => write!(f, "Conversion error: {msg}"),
            ListError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            ListError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ListError::Draft(msg) => write!(f, "Draft error: {msg}"),
            ListError::Prediction(msg) => write!(f, "Prediction error: {msg}"),
        }
    }
}

impl std::error::Error for ListError {}

impl ListError {
    /// Whether the in-memory draft should be kept so the user can retry
    pub fn preserves_draft(&self) -> bool {
        !matches!(self, ListError::NotFound(_))
    }
}

impl From<anyhow::Error> for ListError {
    fn from(err: anyhow::Error) -> Self {
        ListError::Persistence(format!("{err:#}"))
    }
}

impl From<sqlx::Error> for ListError {
    fn from(err: sqlx::Error) -> Self {
        ListError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ListError {
    fn from(err: serde_json::Error) -> Self {
        ListError::Persistence(format!("malformed document: {err}"))
    }
}

impl From<ConversionError> for ListError {
    fn from(err: ConversionError) -> Self {
        ListError::Conversion(err.to_string())
    }
}

impl From<DraftError> for ListError {
    fn from(err: DraftError) -> Self {
        ListError::Draft(err.to_string())
    }
}

pub type ListResult<T> = Result<T, ListError>;
