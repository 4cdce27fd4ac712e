//! Error conversions - From implementations for common error types
//!
//! Provides automatic conversion from common error types to [`AppError`].
//! Messages produced here are caller-safe; the original error is kept as
//! `source` for server-side logs.

use super::app_error::AppError;
use crate::env::EnvError;

// ============================================================================
// Configuration conversions
// ============================================================================

impl From<EnvError> for AppError {
    fn from(err: EnvError) -> Self {
        AppError::internal(format!("Configuration error: {}", err)).with_source(err)
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(err: std::num::ParseIntError) -> Self {
        AppError::bad_request("Invalid integer format").with_source(err)
    }
}

// ============================================================================
// serde_json conversions
// ============================================================================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() {
            AppError::bad_request("Malformed JSON payload").with_source(err)
        } else {
            AppError::internal("JSON serialization error").with_source(err)
        }
    }
}

// ============================================================================
// SQLx conversions (feature-gated)
// ============================================================================

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::not_found("Record not found").with_source(err),
            sqlx::Error::PoolTimedOut => {
                AppError::service_unavailable("Database connection pool exhausted").with_source(err)
            }
            sqlx::Error::Database(db_err) => {
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                let app_err = match db_err.code().as_deref() {
                    // Class 23: Integrity Constraint Violation
                    Some("23505") => AppError::conflict("Duplicate key value"),
                    Some("23503") => AppError::conflict("Foreign key violation"),
                    Some("23502") => AppError::internal("Required field is null"),
                    // Class 40: Transaction Rollback
                    Some("40001") | Some("40P01") => {
                        AppError::service_unavailable("Concurrent update, please retry")
                    }
                    // Class 53: Insufficient Resources
                    Some("53000") | Some("53100") | Some("53200") | Some("53300") => {
                        AppError::service_unavailable("Database resource exhausted")
                    }
                    // Class 57: Operator Intervention
                    Some("57000") | Some("57014") | Some("57P01") | Some("57P02")
                    | Some("57P03") => AppError::service_unavailable("Database unavailable"),
                    _ => AppError::internal("Database error"),
                };
                app_err.with_source(err)
            }
            sqlx::Error::Io(_) => {
                AppError::service_unavailable("Database connection error").with_source(err)
            }
            _ => AppError::internal("Database error").with_source(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind::ErrorKind;

    #[test]
    fn test_env_error_conversion() {
        let app_err: AppError = EnvError::Missing("JWT_SECRET".to_string()).into();
        assert_eq!(app_err.kind(), ErrorKind::InternalServerError);
        assert!(app_err.message().contains("JWT_SECRET"));
    }

    #[test]
    fn test_parse_int_error_conversion() {
        let parse_err: Result<i32, _> = "abc".parse();
        let app_err: AppError = parse_err.unwrap_err().into();
        assert_eq!(app_err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), ErrorKind::BadRequest);
        assert!(!app_err.message().contains("line"));
    }
}
