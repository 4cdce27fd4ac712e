//! Application Configuration
//!
//! Configuration for the identity application layer.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::env::{self, EnvError};
use kernel::error::app_error::AppResult;
use platform::rate_limit::RateLimitConfig;
use platform::secret::DEFAULT_CODE_LENGTH;

use crate::error::{IdentityError, IdentityResult};

/// Lifetime of a frontend-gateway token. Not configurable.
pub const FRONTEND_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

/// Identity application configuration
#[derive(Clone)]
pub struct IdentityConfig {
    /// OTP validity (10 minutes)
    pub otp_ttl: Duration,
    /// Symbols per OTP
    pub otp_code_length: usize,
    /// OTP sends per subject (5 per 15 minutes)
    pub otp_rate_limit: RateLimitConfig,
    /// Minimum spacing between two OTP sends (2 minutes)
    pub otp_resend_cooldown: Duration,
    /// Reset requests per email (3 per hour)
    pub reset_rate_limit: RateLimitConfig,
    /// Reset token validity (2 hours)
    pub reset_token_ttl: Duration,
    /// Period of the throttle-state sweep (5 minutes)
    pub sweep_interval: Duration,
    pub access_token_secret: Vec<u8>,
    /// Access token lifetime (15 minutes)
    pub access_token_ttl: Duration,
    pub refresh_token_secret: Vec<u8>,
    /// Refresh token lifetime (72 hours)
    pub refresh_token_ttl: Duration,
    pub frontend_token_secret: Vec<u8>,
    /// HMAC key for OTP digests (optional)
    pub digest_secret: Option<Vec<u8>>,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            otp_ttl: Duration::from_secs(10 * 60),
            otp_code_length: DEFAULT_CODE_LENGTH,
            otp_rate_limit: RateLimitConfig::new(5, 15 * 60),
            otp_resend_cooldown: Duration::from_secs(2 * 60),
            reset_rate_limit: RateLimitConfig::new(3, 3600),
            reset_token_ttl: Duration::from_secs(2 * 3600),
            sweep_interval: Duration::from_secs(5 * 60),
            access_token_secret: Vec::new(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_secret: Vec::new(),
            refresh_token_ttl: Duration::from_secs(72 * 3600),
            frontend_token_secret: Vec::new(),
            digest_secret: None,
            password_pepper: None,
        }
    }
}

impl IdentityConfig {
    /// Create config with random signing secrets (for development)
    pub fn with_random_secret() -> Self {
        Self {
            access_token_secret: random_secret(),
            refresh_token_secret: random_secret(),
            frontend_token_secret: random_secret(),
            ..Default::default()
        }
    }

    /// Random secrets plus a keyed OTP digest
    pub fn development() -> Self {
        Self {
            digest_secret: Some(random_secret()),
            ..Self::with_random_secret()
        }
    }

    /// Load from the environment.
    ///
    /// The three signing secrets are required. Numeric settings fall back to
    /// the defaults when unset and fail when unparsable.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let secs = |name: &str, default: Duration| -> AppResult<Duration> {
            Ok(Duration::from_secs(env::parse_or(name, default.as_secs())?))
        };
        // Settings given in minutes or hours rather than seconds
        let scaled = |name: &str, default: u64, unit: u64| -> AppResult<Duration> {
            let value: u64 = env::parse_or(name, default)?;
            value
                .checked_mul(unit)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    EnvError::Invalid {
                        name: name.to_string(),
                        reason: "value out of range".to_string(),
                    }
                    .into()
                })
        };

        Ok(Self {
            otp_ttl: secs("OTP_TTL_SECS", defaults.otp_ttl)?,
            otp_code_length: env::parse_or("OTP_CODE_LENGTH", defaults.otp_code_length)?,
            otp_rate_limit: RateLimitConfig {
                max_requests: env::parse_or(
                    "OTP_RATE_LIMIT_MAX",
                    defaults.otp_rate_limit.max_requests,
                )?,
                window: secs("OTP_RATE_LIMIT_WINDOW_SECS", defaults.otp_rate_limit.window)?,
            },
            otp_resend_cooldown: secs("OTP_RESEND_COOLDOWN_SECS", defaults.otp_resend_cooldown)?,
            reset_rate_limit: RateLimitConfig {
                max_requests: env::parse_or(
                    "RESET_RATE_LIMIT_MAX",
                    defaults.reset_rate_limit.max_requests,
                )?,
                window: secs(
                    "RESET_RATE_LIMIT_WINDOW_SECS",
                    defaults.reset_rate_limit.window,
                )?,
            },
            reset_token_ttl: secs("RESET_TOKEN_TTL_SECS", defaults.reset_token_ttl)?,
            sweep_interval: secs("RATE_LIMIT_SWEEP_SECS", defaults.sweep_interval)?,
            access_token_secret: env::required("JWT_SECRET")?.into_bytes(),
            access_token_ttl: scaled("ACCESS_TOKEN_EXPIRATION", 15, 60)?,
            refresh_token_secret: env::required("JWT_REFRESH_SECRET")?.into_bytes(),
            refresh_token_ttl: scaled("REFRESH_TOKEN_EXPIRATION", 72, 3600)?,
            frontend_token_secret: env::required("FRONTEND_TOKEN_SECRET")?.into_bytes(),
            digest_secret: env::optional("OTP_HMAC_SECRET").map(String::into_bytes),
            password_pepper: env::optional("PASSWORD_PEPPER").map(String::into_bytes),
        })
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    pub fn otp_ttl_minutes(&self) -> u64 {
        self.otp_ttl.as_secs().div_ceil(60)
    }
}

/// `now + ttl`, failing instead of overflowing the calendar range
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> IdentityResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| IdentityError::Internal(format!("Expiry out of range for TTL {:?}", ttl)))
}

fn random_secret() -> Vec<u8> {
    use rand::RngCore;
    let mut secret = vec![0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    secret
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "[REDACTED]";
        let optional = |s: &Option<Vec<u8>>| s.as_ref().map(|_| REDACTED);

        f.debug_struct("IdentityConfig")
            .field("otp_ttl", &self.otp_ttl)
            .field("otp_code_length", &self.otp_code_length)
            .field("otp_rate_limit", &self.otp_rate_limit)
            .field("otp_resend_cooldown", &self.otp_resend_cooldown)
            .field("reset_rate_limit", &self.reset_rate_limit)
            .field("reset_token_ttl", &self.reset_token_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("access_token_secret", &REDACTED)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_secret", &REDACTED)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("frontend_token_secret", &REDACTED)
            .field("digest_secret", &optional(&self.digest_secret))
            .field("password_pepper", &optional(&self.password_pepper))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRETS: [(&str, Option<&str>); 3] = [
        ("JWT_SECRET", Some("access-secret")),
        ("JWT_REFRESH_SECRET", Some("refresh-secret")),
        ("FRONTEND_TOKEN_SECRET", Some("frontend-secret")),
    ];

    #[test]
    fn test_defaults() {
        let config = IdentityConfig::default();
        assert_eq!(config.otp_ttl, Duration::from_secs(600));
        assert_eq!(config.otp_ttl_minutes(), 10);
        assert_eq!(config.otp_rate_limit.max_requests, 5);
        assert_eq!(config.otp_rate_limit.window, Duration::from_secs(900));
        assert_eq!(config.reset_rate_limit.max_requests, 3);
        assert_eq!(config.reset_token_ttl, Duration::from_secs(7200));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(72 * 3600));
    }

    #[test]
    fn test_random_secrets_differ() {
        let config = IdentityConfig::development();
        assert_eq!(config.access_token_secret.len(), 32);
        assert_ne!(config.access_token_secret, config.refresh_token_secret);
        assert!(config.digest_secret.is_some());
    }

    #[test]
    fn test_from_env() {
        let mut vars: Vec<(&str, Option<&str>)> = SECRETS.to_vec();
        vars.extend([
            ("ACCESS_TOKEN_EXPIRATION", Some("30")),
            ("REFRESH_TOKEN_EXPIRATION", Some("24")),
            ("RESET_TOKEN_TTL_SECS", Some("1200")),
            ("OTP_HMAC_SECRET", Some("otp-key")),
            ("PASSWORD_PEPPER", None),
        ]);
        temp_env::with_vars(vars, || {
            let config = IdentityConfig::from_env().unwrap();
            assert_eq!(config.access_token_secret, b"access-secret");
            assert_eq!(config.access_token_ttl, Duration::from_secs(30 * 60));
            assert_eq!(config.refresh_token_ttl, Duration::from_secs(24 * 3600));
            assert_eq!(config.reset_token_ttl, Duration::from_secs(1200));
            assert_eq!(config.digest_secret.as_deref(), Some(&b"otp-key"[..]));
            assert!(config.pepper().is_none());
        });
    }

    #[test]
    fn test_from_env_requires_secrets() {
        temp_env::with_vars(
            [
                ("JWT_SECRET", None::<&str>),
                ("JWT_REFRESH_SECRET", Some("refresh-secret")),
                ("FRONTEND_TOKEN_SECRET", Some("frontend-secret")),
            ],
            || {
                let err = IdentityConfig::from_env().unwrap_err();
                assert!(err.is_server_error());
                assert!(err.message().contains("JWT_SECRET"));
            },
        );
    }

    #[test]
    fn test_from_env_rejects_bad_numbers() {
        let mut vars: Vec<(&str, Option<&str>)> = SECRETS.to_vec();
        vars.push(("OTP_RATE_LIMIT_MAX", Some("five")));
        temp_env::with_vars(vars, || {
            let err = IdentityConfig::from_env().unwrap_err();
            assert!(err.message().contains("OTP_RATE_LIMIT_MAX"));
        });
    }

    #[test]
    fn test_from_env_rejects_overflowing_lifetimes() {
        let max = u64::MAX.to_string();
        for name in ["ACCESS_TOKEN_EXPIRATION", "REFRESH_TOKEN_EXPIRATION"] {
            let mut vars: Vec<(&str, Option<&str>)> = SECRETS.to_vec();
            vars.push((name, Some(max.as_str())));
            temp_env::with_vars(vars, || {
                let err = IdentityConfig::from_env().unwrap_err();
                assert!(err.message().contains(name));
            });
        }
    }

    #[test]
    fn test_expiry_after() {
        let now = Utc::now();
        assert_eq!(
            expiry_after(now, Duration::from_secs(600)).unwrap(),
            now + chrono::Duration::minutes(10)
        );
        assert!(matches!(
            expiry_after(now, Duration::from_secs(u64::MAX)),
            Err(IdentityError::Internal(_))
        ));
        // Representable as a chrono duration but past the calendar range
        assert!(expiry_after(now, Duration::from_secs(i64::MAX as u64 / 1000)).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = IdentityConfig {
            password_pepper: Some(b"pepper-value".to_vec()),
            ..IdentityConfig::development()
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("pepper-value"));
    }
}
