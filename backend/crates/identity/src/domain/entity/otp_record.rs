//! OTP Record Entity
//!
//! One issued one-time code. Only the digest of the code is kept.
//! Lifecycle: `active -> verified` on a correct code, `active -> expired`
//! when superseded by a newer code for the same subject.

use chrono::{DateTime, Utc};
use kernel::id::OtpRecordId;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpStatus {
    Active,
    Verified,
    Expired,
}

impl OtpStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            OtpStatus::Active => "active",
            OtpStatus::Verified => "verified",
            OtpStatus::Expired => "expired",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(OtpStatus::Active),
            "verified" => Some(OtpStatus::Verified),
            "expired" => Some(OtpStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: OtpRecordId,
    /// Phone number or email the code was sent to
    pub subject: String,
    pub code_hash: String,
    /// Public lookup key handed to the caller; unique across all records
    pub verification_handle: Uuid,
    pub status: OtpStatus,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn issue(
        subject: impl Into<String>,
        code_hash: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OtpRecordId::new(),
            subject: subject.into(),
            code_hash,
            verification_handle: Uuid::new_v4(),
            status: OtpStatus::Active,
            expires_at,
            verified_at: None,
            created_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OtpStatus::Active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
