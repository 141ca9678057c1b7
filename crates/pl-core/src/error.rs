//! # AppError
//!
//! Centralized error handling for parley.
//! Every denial, caller mistake and backing-store failure ends up here.

use thiserror::Error;

/// The primary error type for all pl-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request may not act as the claimed client on the claimed domain.
    /// Carries no detail so callers cannot tell the sub-reasons apart.
    #[error("not authorized")]
    NotAuthorized,

    /// Caller error (empty comment field, empty count request, bad payload)
    #[error("validation error: {0}")]
    Validation(String),

    /// An addressed entity does not exist (admin operations only)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Infrastructure failure (e.g., DB down, query failure)
    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// A specialized Result type for parley logic.
pub type Result<T> = std::result::Result<T, AppError>;
