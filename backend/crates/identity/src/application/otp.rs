//! OTP Lifecycle Use Case
//!
//! Issues one-time codes for a subject (phone number or email) and verifies
//! them. Per subject the lifecycle is `(none) -> active -> verified | expired`
//! with at most one active record at a time.
//!
//! Sending is gated twice: a sliding-window count and a resend cooldown.
//! Both are reset after a successful verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::cooldown::CooldownGate;
use platform::digest::DigestProvider;
use platform::rate_limit::SlidingWindowLimiter;
use platform::secret::{SecretGenerator, SecretString};
use uuid::Uuid;

use crate::application::config::{IdentityConfig, expiry_after};
use crate::domain::entity::{OtpRecord, OtpStatus};
use crate::domain::repository::OtpRepository;
use crate::error::{IdentityError, IdentityResult};

/// Send OTP output
#[derive(Debug)]
pub struct SendOtpOutput {
    /// Handle the caller passes back to verify
    pub verification_handle: Uuid,
    pub expiry_minutes: u64,
    pub expires_at: DateTime<Utc>,
    /// Plaintext code for the delivery channel. Never persisted.
    pub code: SecretString,
}

/// Verify OTP output
#[derive(Debug, Clone)]
pub struct VerifyOtpOutput {
    pub success: bool,
    pub subject: String,
}

/// OTP lifecycle service
pub struct OtpService<R>
where
    R: OtpRepository,
{
    repo: Arc<R>,
    limiter: Arc<SlidingWindowLimiter>,
    cooldown: Arc<CooldownGate>,
    secrets: SecretGenerator,
    digest: DigestProvider,
    config: Arc<IdentityConfig>,
}

impl<R> OtpService<R>
where
    R: OtpRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<IdentityConfig>) -> Self {
        Self {
            repo,
            limiter: Arc::new(SlidingWindowLimiter::new(config.otp_rate_limit.clone())),
            cooldown: Arc::new(CooldownGate::new(config.otp_resend_cooldown)),
            secrets: SecretGenerator::new(),
            digest: DigestProvider::new(config.digest_secret.clone()),
            config,
        }
    }

    /// Limiter shared with the background sweep
    pub fn limiter(&self) -> Arc<SlidingWindowLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Cooldown gate shared with the background sweep
    pub fn cooldown(&self) -> Arc<CooldownGate> {
        Arc::clone(&self.cooldown)
    }

    pub async fn send_otp(&self, subject: &str) -> IdentityResult<SendOtpOutput> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(IdentityError::Validation(
                "Phone number or email is required".to_string(),
            ));
        }

        let limit = self.limiter.is_allowed(subject);
        if !limit.allowed {
            tracing::warn!(retry_after_secs = limit.retry_after.as_secs(), "OTP send rate limited");
            return Err(IdentityError::RateLimitExceeded {
                retry_after: limit.retry_after,
            });
        }

        // Checked and recorded together; concurrent sends get one winner
        let cooldown = self.cooldown.try_acquire(subject);
        if !cooldown.allowed {
            tracing::debug!(seconds_until = cooldown.seconds_until, "OTP resend within cooldown");
            return Err(IdentityError::TooFrequent {
                seconds_until: cooldown.seconds_until,
            });
        }

        let (record, code, superseded) = match self.issue(subject).await {
            Ok(issued) => issued,
            Err(err) => {
                // Nothing was sent, so the subject may retry immediately
                self.cooldown.reset(subject);
                return Err(err);
            }
        };

        tracing::info!(
            verification_handle = %record.verification_handle,
            superseded,
            "OTP issued"
        );

        Ok(SendOtpOutput {
            verification_handle: record.verification_handle,
            expiry_minutes: self.config.otp_ttl_minutes(),
            expires_at: record.expires_at,
            code,
        })
    }

    async fn issue(&self, subject: &str) -> IdentityResult<(OtpRecord, SecretString, u64)> {
        let code = SecretString::new(self.secrets.generate_code(self.config.otp_code_length)?);
        let code_hash = self
            .digest
            .secret_digest(code.expose())
            .map_err(|e| IdentityError::Internal(e.to_string()))?;

        let now = Utc::now();
        let record = OtpRecord::issue(
            subject,
            code_hash,
            expiry_after(now, self.config.otp_ttl)?,
            now,
        );

        // Supersede and insert in one unit so a subject never has two active codes
        let superseded = self.repo.supersede_and_create(&record).await?;

        Ok((record, code, superseded))
    }

    pub async fn verify_otp(
        &self,
        verification_handle: &str,
        code: &str,
    ) -> IdentityResult<VerifyOtpOutput> {
        self.verify_otp_at(verification_handle, code, Utc::now()).await
    }

    /// Verify against an explicit clock.
    ///
    /// Unknown handles, wrong codes and already-verified records all yield
    /// [`IdentityError::InvalidCode`].
    pub async fn verify_otp_at(
        &self,
        verification_handle: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> IdentityResult<VerifyOtpOutput> {
        let handle =
            Uuid::parse_str(verification_handle.trim()).map_err(|_| IdentityError::InvalidCode)?;

        let record = self
            .repo
            .find_by_handle(handle)
            .await?
            .ok_or(IdentityError::InvalidCode)?;

        match record.status {
            OtpStatus::Active => {}
            OtpStatus::Verified => return Err(IdentityError::InvalidCode),
            OtpStatus::Expired => return Err(IdentityError::Expired),
        }

        if record.is_expired_at(now) {
            return Err(IdentityError::Expired);
        }

        let supplied = SecretString::new(self.secrets.normalize_code(code));
        if !self.digest.verify_secret(supplied.expose(), &record.code_hash) {
            return Err(IdentityError::InvalidCode);
        }

        // Conditional on status = active; a concurrent verifier may have won
        if !self.repo.mark_verified(&record.id, now).await? {
            return Err(IdentityError::InvalidCode);
        }

        self.limiter.reset(&record.subject);
        self.cooldown.reset(&record.subject);

        tracing::info!(verification_handle = %record.verification_handle, "OTP verified");

        Ok(VerifyOtpOutput {
            success: true,
            subject: record.subject,
        })
    }

    /// Display form of a code, e.g. `K7M-X2Q`
    pub fn format_code(&self, code: &SecretString) -> String {
        self.secrets.format_code(code.expose(), 3)
    }
}
