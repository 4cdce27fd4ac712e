//! In-Memory Repository Implementations
//!
//! One mutex over every table, so each trait method is a single critical
//! section. The guard never lives across an `.await`.
//!
//! Suitable for tests and single-process development only; nothing survives
//! a restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use kernel::id::{OtpRecordId, PasswordResetId, UserId};
use platform::password::HashedPassword;
use uuid::Uuid;

use crate::domain::entity::{OtpRecord, OtpStatus, PasswordReset, ResetStatus, User};
use crate::domain::repository::{OtpRepository, PasswordResetRepository, UserRepository};
use crate::domain::value_object::{Email, Role, UserCode};
use crate::error::{IdentityError, IdentityResult};

#[derive(Default)]
struct Tables {
    otps: HashMap<Uuid, OtpRecord>,
    resets: HashMap<Uuid, PasswordReset>,
    users: HashMap<Uuid, User>,
    /// `(prefix, country) -> last issued number`
    user_code_counters: HashMap<(String, String), u32>,
}

/// In-memory identity store
#[derive(Default)]
pub struct InMemoryIdentityStore {
    tables: Mutex<Tables>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored OTP records, any status
    pub fn otp_count(&self) -> usize {
        self.lock().otps.len()
    }

    /// Current state of the reset record with `id`
    pub fn reset_by_id(&self, id: &PasswordResetId) -> Option<PasswordReset> {
        self.lock().resets.get(id.as_uuid()).cloned()
    }
}

// ============================================================================
// OTP Repository Implementation
// ============================================================================

impl OtpRepository for InMemoryIdentityStore {
    async fn supersede_and_create(&self, record: &OtpRecord) -> IdentityResult<u64> {
        let mut tables = self.lock();

        if tables
            .otps
            .values()
            .any(|r| r.verification_handle == record.verification_handle)
        {
            return Err(IdentityError::Internal(
                "Duplicate verification handle".to_string(),
            ));
        }

        let mut superseded = 0;
        for existing in tables.otps.values_mut() {
            if existing.subject == record.subject && existing.status == OtpStatus::Active {
                existing.status = OtpStatus::Expired;
                superseded += 1;
            }
        }

        tables.otps.insert(*record.id.as_uuid(), record.clone());
        Ok(superseded)
    }

    async fn find_by_handle(&self, handle: Uuid) -> IdentityResult<Option<OtpRecord>> {
        Ok(self
            .lock()
            .otps
            .values()
            .find(|r| r.verification_handle == handle)
            .cloned())
    }

    async fn mark_verified(&self, id: &OtpRecordId, at: DateTime<Utc>) -> IdentityResult<bool> {
        let mut tables = self.lock();
        match tables.otps.get_mut(id.as_uuid()) {
            Some(record) if record.status == OtpStatus::Active => {
                record.status = OtpStatus::Verified;
                record.verified_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Password Reset Repository Implementation
// ============================================================================

impl PasswordResetRepository for InMemoryIdentityStore {
    async fn create(&self, reset: &PasswordReset) -> IdentityResult<()> {
        let mut tables = self.lock();
        if tables
            .resets
            .values()
            .any(|r| r.token_hash == reset.token_hash)
        {
            return Err(IdentityError::Internal("Duplicate token hash".to_string()));
        }
        tables.resets.insert(*reset.id.as_uuid(), reset.clone());
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> IdentityResult<Option<PasswordReset>> {
        Ok(self
            .lock()
            .resets
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn mark_expired(&self, id: &PasswordResetId) -> IdentityResult<bool> {
        let mut tables = self.lock();
        match tables.resets.get_mut(id.as_uuid()) {
            Some(reset) if reset.status == ResetStatus::Active => {
                reset.status = ResetStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_reset(
        &self,
        id: &PasswordResetId,
        user_id: &UserId,
        password_hash: &HashedPassword,
        used_at: DateTime<Utc>,
    ) -> IdentityResult<bool> {
        let mut tables = self.lock();

        let active = tables
            .resets
            .get(id.as_uuid())
            .is_some_and(|r| r.status == ResetStatus::Active);
        if !active || !tables.users.contains_key(user_id.as_uuid()) {
            return Ok(false);
        }

        if let Some(user) = tables.users.get_mut(user_id.as_uuid()) {
            user.password_hash = password_hash.clone();
            user.updated_at = used_at;
        }
        if let Some(reset) = tables.resets.get_mut(id.as_uuid()) {
            reset.status = ResetStatus::Used;
            reset.used_at = Some(used_at);
        }
        Ok(true)
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for InMemoryIdentityStore {
    async fn create(&self, user: &User) -> IdentityResult<()> {
        let mut tables = self.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(IdentityError::Validation(
                "Email is already registered".to_string(),
            ));
        }
        tables.users.insert(*user.user_id.as_uuid(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>> {
        Ok(self.lock().users.get(user_id.as_uuid()).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email == *email)
            .cloned())
    }

    async fn update_roles(
        &self,
        user_id: &UserId,
        roles: &[Role],
        user_code: &UserCode,
    ) -> IdentityResult<bool> {
        let mut tables = self.lock();
        let Some(user) = tables.users.get_mut(user_id.as_uuid()) else {
            return Ok(false);
        };
        user.roles = roles.to_vec();
        user.user_code = Some(user_code.clone());
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn next_user_code_number(&self, prefix: &str, country: &str) -> IdentityResult<u32> {
        let mut tables = self.lock();
        let counter = tables
            .user_code_counters
            .entry((prefix.to_string(), country.to_string()))
            .or_insert(0);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| IdentityError::Internal("User code sequence exhausted".to_string()))?;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn otp(subject: &str) -> OtpRecord {
        let now = Utc::now();
        OtpRecord::issue(subject, "hash".to_string(), now + Duration::minutes(10), now)
    }

    #[tokio::test]
    async fn test_supersede_only_same_subject() {
        let store = InMemoryIdentityStore::new();
        let first = otp("+250788000001");
        let other = otp("+250788000002");

        assert_eq!(store.supersede_and_create(&first).await.unwrap(), 0);
        assert_eq!(store.supersede_and_create(&other).await.unwrap(), 0);
        assert_eq!(store.supersede_and_create(&otp("+250788000001")).await.unwrap(), 1);

        let first = store.find_by_handle(first.verification_handle).await.unwrap().unwrap();
        let other = store.find_by_handle(other.verification_handle).await.unwrap().unwrap();
        assert_eq!(first.status, OtpStatus::Expired);
        assert_eq!(other.status, OtpStatus::Active);
        assert_eq!(store.otp_count(), 3);
    }

    #[tokio::test]
    async fn test_mark_verified_once() {
        let store = InMemoryIdentityStore::new();
        let record = otp("user@example.com");
        store.supersede_and_create(&record).await.unwrap();

        assert!(store.mark_verified(&record.id, Utc::now()).await.unwrap());
        assert!(!store.mark_verified(&record.id, Utc::now()).await.unwrap());
        assert!(!store.mark_verified(&OtpRecordId::new(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_code_sequence_is_serialized() {
        let store = Arc::new(InMemoryIdentityStore::new());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.next_user_code_number("AGT", "RW").await })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=20).collect::<Vec<u32>>());

        assert_eq!(store.next_user_code_number("AGT", "KE").await.unwrap(), 1);
        assert_eq!(store.next_user_code_number("BUY", "RW").await.unwrap(), 1);
    }
}
