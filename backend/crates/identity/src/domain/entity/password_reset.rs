//! Password Reset Entity
//!
//! Single-use reset token. The token itself goes back to the caller once;
//! only its SHA-256 digest is stored.

use chrono::{DateTime, Utc};
use kernel::id::{PasswordResetId, UserId};

use crate::domain::value_object::Email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStatus {
    Active,
    Used,
    Expired,
}

impl ResetStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            ResetStatus::Active => "active",
            ResetStatus::Used => "used",
            ResetStatus::Expired => "expired",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(ResetStatus::Active),
            "used" => Some(ResetStatus::Used),
            "expired" => Some(ResetStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub id: PasswordResetId,
    pub user_id: UserId,
    pub email: Email,
    pub token_hash: String,
    pub status: ResetStatus,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn issue(
        user_id: UserId,
        email: Email,
        token_hash: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PasswordResetId::new(),
            user_id,
            email,
            token_hash,
            status: ResetStatus::Active,
            expires_at,
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ResetStatus::Active
    }

    /// Independent of status: an `active` record can still be past expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reset(now: DateTime<Utc>) -> PasswordReset {
        PasswordReset::issue(
            UserId::new(),
            Email::new("owner@example.com").unwrap(),
            "cd".repeat(32),
            now + Duration::hours(2),
            now,
        )
    }

    #[test]
    fn test_usable_until_expiry() {
        let now = Utc::now();
        let record = reset(now);
        assert!(record.is_usable_at(now));
        assert!(record.is_usable_at(now + Duration::hours(2)));
        assert!(!record.is_usable_at(now + Duration::hours(2) + Duration::seconds(1)));
    }

    #[test]
    fn test_used_is_not_usable() {
        let now = Utc::now();
        let mut record = reset(now);
        record.status = ResetStatus::Used;
        record.used_at = Some(now);
        assert!(!record.is_usable_at(now));
        assert!(!record.is_expired_at(now));
    }
}
