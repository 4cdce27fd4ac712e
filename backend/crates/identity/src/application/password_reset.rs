//! Password Reset Use Case
//!
//! Single-use reset tokens: `(none) -> active -> used | expired`.
//!
//! Requesting a reset is enumeration-resistant. Throttled requests, unknown
//! emails and real accounts all get the same response; only the last carries
//! a token for delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::digest::DigestProvider;
use platform::password::ClearTextPassword;
use platform::rate_limit::SlidingWindowLimiter;
use platform::secret::{SecretGenerator, SecretString};

use crate::application::config::{IdentityConfig, expiry_after};
use crate::domain::entity::{PasswordReset, ResetStatus};
use crate::domain::repository::{PasswordResetRepository, UserRepository};
use crate::domain::value_object::Email;
use crate::error::{IdentityError, IdentityResult};

/// Response text for every reset request
pub const RESET_REQUESTED_MESSAGE: &str =
    "If this email exists, a password reset link has been sent";

/// Request reset output
#[derive(Debug)]
pub struct RequestResetOutput {
    /// Always true
    pub success: bool,
    pub message: &'static str,
    /// Present only when a record was created. Must not reach the requester.
    pub token: Option<SecretString>,
}

impl RequestResetOutput {
    fn generic(token: Option<SecretString>) -> Self {
        Self {
            success: true,
            message: RESET_REQUESTED_MESSAGE,
            token,
        }
    }
}

/// Confirm reset output
#[derive(Debug, Clone)]
pub struct ConfirmResetOutput {
    pub success: bool,
    pub message: &'static str,
}

/// Password reset service
pub struct PasswordResetService<U, P>
where
    U: UserRepository,
    P: PasswordResetRepository,
{
    user_repo: Arc<U>,
    reset_repo: Arc<P>,
    limiter: Arc<SlidingWindowLimiter>,
    secrets: SecretGenerator,
    digest: DigestProvider,
    config: Arc<IdentityConfig>,
}

impl<U, P> PasswordResetService<U, P>
where
    U: UserRepository,
    P: PasswordResetRepository,
{
    pub fn new(user_repo: Arc<U>, reset_repo: Arc<P>, config: Arc<IdentityConfig>) -> Self {
        Self {
            user_repo,
            reset_repo,
            limiter: Arc::new(SlidingWindowLimiter::new(config.reset_rate_limit.clone())),
            secrets: SecretGenerator::new(),
            // Reset tokens carry 256 bits; a keyed digest adds nothing
            digest: DigestProvider::default(),
            config,
        }
    }

    /// Limiter shared with the background sweep
    pub fn limiter(&self) -> Arc<SlidingWindowLimiter> {
        Arc::clone(&self.limiter)
    }

    pub async fn request_reset(&self, email: &str) -> IdentityResult<RequestResetOutput> {
        let email = Email::new(email)?;

        if !self.limiter.is_allowed(email.as_str()).allowed {
            tracing::warn!("Password reset request throttled");
            return Ok(RequestResetOutput::generic(None));
        }

        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(RequestResetOutput::generic(None));
        };

        let token = SecretString::new(self.secrets.generate_token()?);
        let now = Utc::now();
        let expires_at = match expiry_after(now, self.config.reset_token_ttl) {
            Ok(at) => at,
            Err(err) => {
                err.log();
                return Ok(RequestResetOutput::generic(None));
            }
        };
        let reset = PasswordReset::issue(
            user.user_id,
            email,
            self.digest.hash(token.expose()),
            expires_at,
            now,
        );

        // A storage failure here would only be observable for existing accounts
        if let Err(err) = self.reset_repo.create(&reset).await {
            err.log();
            return Ok(RequestResetOutput::generic(None));
        }

        tracing::info!(user_id = %reset.user_id, reset_id = %reset.id, "Password reset requested");

        Ok(RequestResetOutput::generic(Some(token)))
    }

    pub async fn confirm_reset(
        &self,
        token: &str,
        new_password: String,
    ) -> IdentityResult<ConfirmResetOutput> {
        self.confirm_reset_at(token, new_password, Utc::now()).await
    }

    pub async fn confirm_reset_at(
        &self,
        token: &str,
        new_password: String,
        now: DateTime<Utc>,
    ) -> IdentityResult<ConfirmResetOutput> {
        let password = ClearTextPassword::new(new_password)?;

        let reset = self
            .find_by_token(token)
            .await?
            .ok_or(IdentityError::InvalidOrExpiredToken)?;

        match reset.status {
            ResetStatus::Active => {}
            ResetStatus::Used => return Err(IdentityError::AlreadyUsed),
            ResetStatus::Expired => return Err(IdentityError::InvalidOrExpiredToken),
        }

        if reset.is_expired_at(now) {
            self.reset_repo.mark_expired(&reset.id).await?;
            return Err(IdentityError::Expired);
        }

        let password_hash = password.hash(self.config.pepper())?;

        // Credential and token status change together or not at all
        let completed = self
            .reset_repo
            .complete_reset(&reset.id, &reset.user_id, &password_hash, now)
            .await?;
        if !completed {
            return Err(IdentityError::AlreadyUsed);
        }

        tracing::info!(user_id = %reset.user_id, reset_id = %reset.id, "Password reset completed");

        Ok(ConfirmResetOutput {
            success: true,
            message: "Password reset successfully",
        })
    }

    /// Whether `token` is active and unexpired. Read-only.
    pub async fn validate_token(&self, token: &str) -> IdentityResult<bool> {
        self.validate_token_at(token, Utc::now()).await
    }

    pub async fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> IdentityResult<bool> {
        Ok(self
            .find_by_token(token)
            .await?
            .is_some_and(|reset| reset.is_usable_at(now)))
    }

    async fn find_by_token(&self, token: &str) -> IdentityResult<Option<PasswordReset>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        self.reset_repo
            .find_by_token_hash(&self.digest.hash(token))
            .await
    }
}
