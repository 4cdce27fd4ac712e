//! Identity Error Types
//!
//! Identity-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use std::time::Duration;

use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::crypto::EntropyError;
use platform::password::{PasswordHashError, PasswordPolicyError};
use thiserror::Error;

/// Identity-specific result type alias
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Identity-specific error variants
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Sliding-window limit reached for the key
    #[error("Too many requests")]
    RateLimitExceeded { retry_after: Duration },

    /// Resend attempted before the cooldown elapsed
    #[error("Please wait {seconds_until} seconds before requesting another code")]
    TooFrequent { seconds_until: u64 },

    /// Unknown handle, wrong code or already-consumed record. Deliberately
    /// indistinguishable.
    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Code or token has expired")]
    Expired,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("Reset token has already been used")]
    AlreadyUsed,

    #[error("{0}")]
    WeakPassword(#[from] PasswordPolicyError),

    /// Bearer token malformed, wrongly signed or of the wrong kind
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid role: {0}")]
    UnknownRole(String),

    #[error("{0}")]
    RoleAssignmentDenied(String),

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Entropy(#[from] EntropyError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::Validation(_) | IdentityError::UnknownRole(_) => ErrorKind::BadRequest,
            IdentityError::RateLimitExceeded { .. } | IdentityError::TooFrequent { .. } => {
                ErrorKind::TooManyRequests
            }
            IdentityError::InvalidCode
            | IdentityError::InvalidToken
            | IdentityError::TokenExpired => ErrorKind::Unauthorized,
            IdentityError::Expired | IdentityError::AlreadyUsed => ErrorKind::Gone,
            IdentityError::InvalidOrExpiredToken => ErrorKind::BadRequest,
            IdentityError::WeakPassword(_) => ErrorKind::UnprocessableEntity,
            IdentityError::RoleAssignmentDenied(_) => ErrorKind::Forbidden,
            IdentityError::UserNotFound => ErrorKind::NotFound,
            IdentityError::Entropy(_) | IdentityError::Database(_) | IdentityError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Server-side failures carry detail that must stay in the logs
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            IdentityError::Entropy(_) | IdentityError::Database(_) | IdentityError::Internal(_)
        )
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        match self {
            err if err.is_internal() => AppError::internal("An internal error occurred"),
            IdentityError::RateLimitExceeded { retry_after } => {
                AppError::new(self.kind(), self.to_string()).with_retry_after(*retry_after)
            }
            IdentityError::TooFrequent { seconds_until } => {
                AppError::new(self.kind(), self.to_string())
                    .with_retry_after(Duration::from_secs(*seconds_until))
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            IdentityError::Database(e) => {
                tracing::error!(error = %e, "Identity database error");
            }
            IdentityError::Entropy(e) => {
                tracing::error!(error = %e, "Secure random source failure");
            }
            IdentityError::Internal(msg) => {
                tracing::error!(message = %msg, "Identity internal error");
            }
            IdentityError::RateLimitExceeded { retry_after } => {
                tracing::warn!(retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            }
            IdentityError::TooFrequent { seconds_until } => {
                tracing::warn!(seconds_until, "Resend attempted during cooldown");
            }
            IdentityError::RoleAssignmentDenied(msg) => {
                tracing::warn!(reason = %msg, "Role assignment denied");
            }
            _ => {
                tracing::debug!(error = %self, "Identity error");
            }
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        err.log();
        let app_error = err.to_app_error();
        match err {
            IdentityError::Database(e) => app_error.with_source(e),
            _ => app_error,
        }
    }
}

impl From<PasswordHashError> for IdentityError {
    fn from(err: PasswordHashError) -> Self {
        IdentityError::Internal(err.to_string())
    }
}

impl From<AppError> for IdentityError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest => IdentityError::Validation(err.message().to_string()),
            _ => IdentityError::Internal(err.to_string()),
        }
    }
}
