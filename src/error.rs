// SPDX-License-Identifier: Apache-2.0
//! Error types for the signup pipeline

use crate::store::StoreError;
use crate::validator::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Message shown for any server-side failure.
pub const GENERIC_FAILURE: &str = "An error occurred. Please try again later.";

/// Message shown when a source is rate limited.
pub const RATE_LIMITED: &str = "Too many requests. Please try again later.";

/// Errors a signup submission can end in
#[derive(Debug, Error)]
pub enum SignupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SignupError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SignupError::Validation(_) => 400,
            SignupError::RateLimited { .. } => 429,
            SignupError::Storage(_) => 500,
        }
    }

    /// Text safe to return to the caller. Storage detail is never included.
    pub fn public_message(&self) -> String {
        match self {
            SignupError::Validation(e) => e.to_string(),
            SignupError::RateLimited { .. } => RATE_LIMITED.to_string(),
            SignupError::Storage(_) => GENERIC_FAILURE.to_string(),
        }
    }

    /// Seconds for a `Retry-After` header, when applicable.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            SignupError::RateLimited { retry_after } => Some(retry_after.as_secs().max(1)),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SignupError>;
