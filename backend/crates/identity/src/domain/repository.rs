//! Repository Traits
//!
//! Interfaces for the persistence and identity-store collaborators.
//! Implementations live in the infrastructure layer.
//!
//! Methods that must be atomic say so; an implementation that cannot provide
//! the guarantee must not implement the trait.

use chrono::{DateTime, Utc};
use kernel::id::{OtpRecordId, PasswordResetId, UserId};
use platform::password::HashedPassword;
use uuid::Uuid;

use crate::domain::entity::{OtpRecord, PasswordReset, User};
use crate::domain::value_object::{Email, Role, UserCode};
use crate::error::IdentityResult;

/// OTP record repository trait
#[trait_variant::make(OtpRepository: Send)]
pub trait LocalOtpRepository {
    /// Atomically expire every `active` record for `record.subject` and insert
    /// `record`. Returns how many records were superseded.
    async fn supersede_and_create(&self, record: &OtpRecord) -> IdentityResult<u64>;

    /// Find a record by its verification handle, whatever its status
    async fn find_by_handle(&self, handle: Uuid) -> IdentityResult<Option<OtpRecord>>;

    /// Transition `active -> verified`. Returns `false` when the record was
    /// no longer active, so exactly one concurrent verifier wins.
    async fn mark_verified(&self, id: &OtpRecordId, at: DateTime<Utc>) -> IdentityResult<bool>;
}

/// Password reset repository trait
#[trait_variant::make(PasswordResetRepository: Send)]
pub trait LocalPasswordResetRepository {
    /// Persist a new reset record
    async fn create(&self, reset: &PasswordReset) -> IdentityResult<()>;

    /// Find a record by token digest, whatever its status
    async fn find_by_token_hash(&self, token_hash: &str) -> IdentityResult<Option<PasswordReset>>;

    /// Transition `active -> expired`. Returns `false` if it was not active.
    async fn mark_expired(&self, id: &PasswordResetId) -> IdentityResult<bool>;

    /// In one transaction: replace the user's credential and transition the
    /// token `active -> used`. Returns `false` and changes nothing when the
    /// token was no longer active.
    async fn complete_reset(
        &self,
        id: &PasswordResetId,
        user_id: &UserId,
        password_hash: &HashedPassword,
        used_at: DateTime<Utc>,
    ) -> IdentityResult<bool>;
}

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create a new user
    async fn create(&self, user: &User) -> IdentityResult<()>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>>;

    /// Find user by (normalized) email
    async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>>;

    /// Replace the role set and user code. Returns `false` if the user does
    /// not exist.
    async fn update_roles(
        &self,
        user_id: &UserId,
        roles: &[Role],
        user_code: &UserCode,
    ) -> IdentityResult<bool>;

    /// Next number in the `(prefix, country)` sequence, starting at 1.
    /// Must be atomic: concurrent callers never receive the same number.
    async fn next_user_code_number(&self, prefix: &str, country: &str) -> IdentityResult<u32>;
}
