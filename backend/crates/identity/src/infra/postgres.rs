//! PostgreSQL Repository Implementations
//!
//! Expected tables (migrations are managed outside this crate):
//!
//! ```sql
//! CREATE TABLE identity_users (
//!     user_id        UUID PRIMARY KEY,
//!     email          TEXT NOT NULL UNIQUE,
//!     password_hash  TEXT NOT NULL,
//!     roles          TEXT[] NOT NULL DEFAULT '{}',
//!     user_code      TEXT UNIQUE,
//!     country        TEXT NOT NULL DEFAULT '',
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     updated_at     TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE otp_records (
//!     id                   UUID PRIMARY KEY,
//!     subject              TEXT NOT NULL,
//!     code_hash            TEXT NOT NULL,
//!     verification_handle  UUID NOT NULL UNIQUE,
//!     status               TEXT NOT NULL,
//!     expires_at           TIMESTAMPTZ NOT NULL,
//!     verified_at          TIMESTAMPTZ,
//!     created_at           TIMESTAMPTZ NOT NULL
//! );
//! CREATE UNIQUE INDEX otp_records_subject_active
//!     ON otp_records (subject) WHERE status = 'active';
//!
//! CREATE TABLE password_resets (
//!     id          UUID PRIMARY KEY,
//!     user_id     UUID NOT NULL REFERENCES identity_users (user_id),
//!     email       TEXT NOT NULL,
//!     token_hash  TEXT NOT NULL UNIQUE,
//!     status      TEXT NOT NULL,
//!     expires_at  TIMESTAMPTZ NOT NULL,
//!     used_at     TIMESTAMPTZ,
//!     created_at  TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE user_code_sequences (
//!     prefix       TEXT NOT NULL,
//!     country      TEXT NOT NULL,
//!     last_number  INTEGER NOT NULL,
//!     PRIMARY KEY (prefix, country)
//! );
//! ```

use chrono::{DateTime, Utc};
use kernel::id::{OtpRecordId, PasswordResetId, UserId};
use platform::password::HashedPassword;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{OtpRecord, OtpStatus, PasswordReset, ResetStatus, User};
use crate::domain::repository::{OtpRepository, PasswordResetRepository, UserRepository};
use crate::domain::value_object::{Email, Role, UserCode};
use crate::error::{IdentityError, IdentityResult};

/// PostgreSQL-backed identity repository
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn role_codes(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.code().to_string()).collect()
}

// ============================================================================
// OTP Repository Implementation
// ============================================================================

impl OtpRepository for PgIdentityRepository {
    async fn supersede_and_create(&self, record: &OtpRecord) -> IdentityResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Serializes issuers per subject until commit. Without it two READ
        // COMMITTED transactions each see no active row and both insert.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&record.subject)
            .execute(&mut *tx)
            .await?;

        let superseded = sqlx::query(
            "UPDATE otp_records SET status = 'expired' WHERE subject = $1 AND status = 'active'",
        )
        .bind(&record.subject)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO otp_records (
                id,
                subject,
                code_hash,
                verification_handle,
                status,
                expires_at,
                verified_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.subject)
        .bind(&record.code_hash)
        .bind(record.verification_handle)
        .bind(record.status.code())
        .bind(record.expires_at)
        .bind(record.verified_at)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(superseded)
    }

    async fn find_by_handle(&self, handle: Uuid) -> IdentityResult<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT
                id,
                subject,
                code_hash,
                verification_handle,
                status,
                expires_at,
                verified_at,
                created_at
            FROM otp_records
            WHERE verification_handle = $1
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_record()).transpose()
    }

    async fn mark_verified(&self, id: &OtpRecordId, at: DateTime<Utc>) -> IdentityResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE otp_records SET
                status = 'verified',
                verified_at = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }
}

// ============================================================================
// Password Reset Repository Implementation
// ============================================================================

impl PasswordResetRepository for PgIdentityRepository {
    async fn create(&self, reset: &PasswordReset) -> IdentityResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (
                id,
                user_id,
                email,
                token_hash,
                status,
                expires_at,
                used_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reset.id.as_uuid())
        .bind(reset.user_id.as_uuid())
        .bind(reset.email.as_str())
        .bind(&reset.token_hash)
        .bind(reset.status.code())
        .bind(reset.expires_at)
        .bind(reset.used_at)
        .bind(reset.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> IdentityResult<Option<PasswordReset>> {
        let row = sqlx::query_as::<_, ResetRow>(
            r#"
            SELECT
                id,
                user_id,
                email,
                token_hash,
                status,
                expires_at,
                used_at,
                created_at
            FROM password_resets
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_reset()).transpose()
    }

    async fn mark_expired(&self, id: &PasswordResetId) -> IdentityResult<bool> {
        let updated = sqlx::query(
            "UPDATE password_resets SET status = 'expired' WHERE id = $1 AND status = 'active'",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn complete_reset(
        &self,
        id: &PasswordResetId,
        user_id: &UserId,
        password_hash: &HashedPassword,
        used_at: DateTime<Utc>,
    ) -> IdentityResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Claim the token first; the row lock serializes concurrent confirmations
        let claimed = sqlx::query(
            r#"
            UPDATE password_resets SET
                status = 'used',
                used_at = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id.as_uuid())
        .bind(used_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        let updated = sqlx::query(
            "UPDATE identity_users SET password_hash = $2, updated_at = $3 WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .bind(password_hash.as_phc_string())
        .bind(used_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        Ok(true)
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgIdentityRepository {
    async fn create(&self, user: &User) -> IdentityResult<()> {
        sqlx::query(
            r#"
            INSERT INTO identity_users (
                user_id,
                email,
                password_hash,
                roles,
                user_code,
                country,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_phc_string())
        .bind(role_codes(&user.roles))
        .bind(user.user_code.as_ref().map(|c| c.as_str()))
        .bind(&user.country)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                password_hash,
                roles,
                user_code,
                country,
                created_at,
                updated_at
            FROM identity_users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> IdentityResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                password_hash,
                roles,
                user_code,
                country,
                created_at,
                updated_at
            FROM identity_users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn update_roles(
        &self,
        user_id: &UserId,
        roles: &[Role],
        user_code: &UserCode,
    ) -> IdentityResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE identity_users SET
                roles = $2,
                user_code = $3,
                updated_at = $4
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_codes(roles))
        .bind(user_code.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn next_user_code_number(&self, prefix: &str, country: &str) -> IdentityResult<u32> {
        let number = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO user_code_sequences (prefix, country, last_number)
            VALUES ($1, $2, 1)
            ON CONFLICT (prefix, country)
            DO UPDATE SET last_number = user_code_sequences.last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(prefix)
        .bind(country)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(number)
            .map_err(|_| IdentityError::Internal(format!("Invalid user code number: {}", number)))
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: Uuid,
    subject: String,
    code_hash: String,
    verification_handle: Uuid,
    status: String,
    expires_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl OtpRow {
    fn into_record(self) -> IdentityResult<OtpRecord> {
        let status = OtpStatus::from_code(&self.status)
            .ok_or_else(|| IdentityError::Internal(format!("Invalid OTP status: {}", self.status)))?;

        Ok(OtpRecord {
            id: OtpRecordId::from_uuid(self.id),
            subject: self.subject,
            code_hash: self.code_hash,
            verification_handle: self.verification_handle,
            status,
            expires_at: self.expires_at,
            verified_at: self.verified_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ResetRow {
    id: Uuid,
    user_id: Uuid,
    email: String,
    token_hash: String,
    status: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ResetRow {
    fn into_reset(self) -> IdentityResult<PasswordReset> {
        let status = ResetStatus::from_code(&self.status).ok_or_else(|| {
            IdentityError::Internal(format!("Invalid reset status: {}", self.status))
        })?;

        Ok(PasswordReset {
            id: PasswordResetId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            token_hash: self.token_hash,
            status,
            expires_at: self.expires_at,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    user_code: Option<String>,
    country: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> IdentityResult<User> {
        let password_hash = HashedPassword::from_phc_string(self.password_hash)
            .map_err(|e| IdentityError::Internal(format!("Invalid password hash: {}", e)))?;

        // Unknown codes are dropped rather than failing the whole lookup
        let roles = self
            .roles
            .iter()
            .filter_map(|code| {
                let role = Role::from_code(code);
                if role.is_none() {
                    tracing::warn!(user_id = %self.user_id, role = %code, "Ignoring unknown stored role");
                }
                role
            })
            .collect();

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            password_hash,
            roles,
            user_code: self.user_code.map(UserCode::from_db),
            country: self.country,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
