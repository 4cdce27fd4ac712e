//! Entity Module

pub mod otp_record;
pub mod password_reset;
pub mod user;

pub use otp_record::{OtpRecord, OtpStatus};
pub use password_reset::{PasswordReset, ResetStatus};
pub use user::User;
