//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidRecord`] thrown when an untyped record cannot become an
//!   [`Expense`] (missing/unparseable date or non-numeric amount).
//! - [`KeyNotFound`] thrown when an expense id is unknown.
//!
//!  [`InvalidRecord`]: EngineError::InvalidRecord
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Expense`]: super::Expense
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid expense specification: {0}")]
    InvalidRecord(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidRecord(a), Self::InvalidRecord(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidDate(a), Self::InvalidDate(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
