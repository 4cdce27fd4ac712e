//! Identity Security Core
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, role hierarchy, repository traits
//! - `application/` - Configuration and use cases
//! - `infra/` - In-memory and PostgreSQL repositories
//!
//! ## Features
//! - One-time passcodes with per-subject rate limit and resend cooldown
//! - Single-use password reset tokens, enumeration-resistant requests
//! - Ranked roles with strict assignment rules and per-role user codes
//! - HS256 bearer tokens: access, refresh and frontend-gateway
//!
//! ## Security Model
//! - Only digests of codes and reset tokens are stored
//! - Digest comparisons are constant-time
//! - Passwords hashed with Argon2id, optional pepper
//! - Throttle state is per process; multi-process deployments need a shared
//!   store or must accept best-effort throttling

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::IdentityConfig;
pub use application::otp::OtpService;
pub use application::password_reset::PasswordResetService;
pub use application::token::TokenIssuer;
pub use application::update_roles::UpdateRolesUseCase;
pub use error::{IdentityError, IdentityResult};
pub use infra::{InMemoryIdentityStore, PgIdentityRepository};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
