//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod maintenance;
pub mod otp;
pub mod password_reset;
pub mod token;
pub mod update_roles;

// Re-exports
pub use config::IdentityConfig;
pub use maintenance::throttle_sweeper;
pub use otp::{OtpService, SendOtpOutput, VerifyOtpOutput};
pub use password_reset::{ConfirmResetOutput, PasswordResetService, RequestResetOutput};
pub use token::{AccessClaims, FrontendClaims, RefreshClaims, TokenIssuer, strip_bearer};
pub use update_roles::{UpdateRolesInput, UpdateRolesOutput, UpdateRolesUseCase};
