//! Bearer Token Issuer
//!
//! Compact HS256 tokens (`base64url(header).base64url(claims).base64url(sig)`)
//! of three kinds, each with its own secret and lifetime:
//! - access: user id plus role codes, minutes-scale
//! - refresh: user id only, hours-scale
//! - frontend: fixed `"frontend"` type marker, no subject, 24 hours
//!
//! Claims are decoded into one typed struct per kind. Claim names on the wire
//! are `id`, `role`, `type` and `expires` (Unix seconds).

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::crypto::{from_base64url, hmac_sha256, hmac_sha256_verify, to_base64url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::application::config::{FRONTEND_TOKEN_TTL, IdentityConfig, expiry_after};
use crate::domain::value_object::Role;
use crate::error::{IdentityError, IdentityResult};

/// The only accepted signing algorithm
pub const ALGORITHM: &str = "HS256";

/// Type marker carried by frontend-gateway tokens
pub const FRONTEND_TOKEN_TYPE: &str = "frontend";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    Frontend,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(rename = "id")]
    pub sub: String,
    #[serde(rename = "role")]
    pub roles: Vec<String>,
    #[serde(rename = "expires")]
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(rename = "id")]
    pub sub: String,
    #[serde(rename = "expires")]
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendClaims {
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
    #[serde(rename = "expires")]
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

trait Expiring {
    fn expires(&self) -> i64;
}

impl Expiring for AccessClaims {
    fn expires(&self) -> i64 {
        self.exp
    }
}

impl Expiring for RefreshClaims {
    fn expires(&self) -> i64 {
        self.exp
    }
}

impl Expiring for FrontendClaims {
    fn expires(&self) -> i64 {
        self.exp
    }
}

/// Accept `Bearer <token>` or a bare token
pub fn strip_bearer(header: &str) -> &str {
    let header = header.trim();
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map_or(header, str::trim)
}

/// Token issuer and verifier
pub struct TokenIssuer {
    access_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_secret: Vec<u8>,
    refresh_ttl: Duration,
    frontend_secret: Vec<u8>,
}

impl TokenIssuer {
    /// Fails when any signing secret is empty.
    pub fn new(config: &IdentityConfig) -> IdentityResult<Self> {
        for (name, secret) in [
            ("access", &config.access_token_secret),
            ("refresh", &config.refresh_token_secret),
            ("frontend", &config.frontend_token_secret),
        ] {
            if secret.is_empty() {
                return Err(IdentityError::Internal(format!(
                    "{} token secret is not configured",
                    name
                )));
            }
        }

        Ok(Self {
            access_secret: config.access_token_secret.clone(),
            access_ttl: config.access_token_ttl,
            refresh_secret: config.refresh_token_secret.clone(),
            refresh_ttl: config.refresh_token_ttl,
            frontend_secret: config.frontend_token_secret.clone(),
        })
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
            TokenKind::Frontend => &self.frontend_secret,
        }
    }

    pub fn issue_access_token(&self, user_id: &UserId, roles: &[Role]) -> IdentityResult<String> {
        self.issue_access_token_at(user_id, roles, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        user_id: &UserId,
        roles: &[Role],
        now: DateTime<Utc>,
    ) -> IdentityResult<String> {
        let claims = AccessClaims {
            sub: user_id.to_string(),
            roles: roles.iter().map(|r| r.code().to_string()).collect(),
            exp: expiry_after(now, self.access_ttl)?.timestamp(),
            iat: now.timestamp(),
        };
        self.sign(TokenKind::Access, &claims)
    }

    pub fn issue_refresh_token(&self, user_id: &UserId) -> IdentityResult<String> {
        self.issue_refresh_token_at(user_id, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> IdentityResult<String> {
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            exp: expiry_after(now, self.refresh_ttl)?.timestamp(),
            iat: now.timestamp(),
        };
        self.sign(TokenKind::Refresh, &claims)
    }

    pub fn issue_frontend_token(&self) -> IdentityResult<String> {
        self.issue_frontend_token_at(Utc::now())
    }

    pub fn issue_frontend_token_at(&self, now: DateTime<Utc>) -> IdentityResult<String> {
        let claims = FrontendClaims {
            token_type: Some(FRONTEND_TOKEN_TYPE.to_string()),
            exp: expiry_after(now, FRONTEND_TOKEN_TTL)?.timestamp(),
            iat: now.timestamp(),
        };
        self.sign(TokenKind::Frontend, &claims)
    }

    pub fn verify_access_token(&self, token: &str) -> IdentityResult<AccessClaims> {
        self.verify_at(TokenKind::Access, token, Utc::now())
    }

    pub fn verify_refresh_token(&self, token: &str) -> IdentityResult<RefreshClaims> {
        self.verify_at(TokenKind::Refresh, token, Utc::now())
    }

    /// `true` only for a valid, unexpired token carrying the frontend marker
    pub fn verify_frontend_token(&self, token: &str) -> bool {
        self.verify_frontend_token_at(token, Utc::now()).is_ok()
    }

    pub fn verify_frontend_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> IdentityResult<FrontendClaims> {
        let claims: FrontendClaims = self.verify_at(TokenKind::Frontend, token, now)?;
        if claims.token_type.as_deref() != Some(FRONTEND_TOKEN_TYPE) {
            return Err(IdentityError::InvalidToken);
        }
        Ok(claims)
    }

    fn sign<C: Serialize>(&self, kind: TokenKind, claims: &C) -> IdentityResult<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header = encode_json(&header)?;
        let payload = encode_json(claims)?;
        let signing_input = format!("{}.{}", header, payload);

        let signature = hmac_sha256(self.secret(kind), signing_input.as_bytes())
            .ok_or_else(|| IdentityError::Internal("Invalid signing key".to_string()))?;
        let signature = to_base64url(&signature);

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Parse, check algorithm and signature, decode typed claims, check expiry.
    fn verify_at<C>(&self, kind: TokenKind, token: &str, now: DateTime<Utc>) -> IdentityResult<C>
    where
        C: DeserializeOwned + Expiring,
    {
        let token = strip_bearer(token);
        let (signing_input, signature) =
            token.rsplit_once('.').ok_or(IdentityError::InvalidToken)?;
        let (header, payload) = signing_input
            .split_once('.')
            .filter(|(_, payload)| !payload.contains('.'))
            .ok_or(IdentityError::InvalidToken)?;

        let header: Header = decode_json(header)?;
        if header.alg != ALGORITHM {
            return Err(IdentityError::InvalidToken);
        }

        let signature = from_base64url(signature).map_err(|_| IdentityError::InvalidToken)?;
        if !hmac_sha256_verify(self.secret(kind), signing_input.as_bytes(), &signature) {
            return Err(IdentityError::InvalidToken);
        }

        let claims: C = decode_json(payload)?;
        if now.timestamp() > claims.expires() {
            return Err(IdentityError::TokenExpired);
        }
        Ok(claims)
    }
}

fn encode_json<T: Serialize>(value: &T) -> IdentityResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| IdentityError::Internal(format!("Token encoding failed: {}", e)))?;
    Ok(to_base64url(&json))
}

fn decode_json<T: DeserializeOwned>(segment: &str) -> IdentityResult<T> {
    let bytes = from_base64url(segment).map_err(|_| IdentityError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| IdentityError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&IdentityConfig::with_random_secret()).unwrap()
    }

    fn forge(header_json: &str, claims_json: &str, secret: &[u8]) -> String {
        let input = format!(
            "{}.{}",
            to_base64url(header_json.as_bytes()),
            to_base64url(claims_json.as_bytes())
        );
        let mac = hmac_sha256(secret, input.as_bytes()).unwrap();
        format!("{}.{}", input, to_base64url(&mac))
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = issuer();
        let user_id = UserId::new();
        let token = issuer
            .issue_access_token(&user_id, &[Role::Agent, Role::Buyer])
            .unwrap();

        assert_eq!(token.split('.').count(), 3);
        let claims = issuer.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.roles, vec!["agent", "buyer"]);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let issuer = issuer();
        let user_id = UserId::new();
        let token = issuer.issue_refresh_token(&user_id).unwrap();
        let claims = issuer.verify_refresh_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.exp - claims.iat, 72 * 3600);
    }

    #[test]
    fn test_kinds_use_independent_secrets() {
        let issuer = issuer();
        let user_id = UserId::new();

        let access = issuer.issue_access_token(&user_id, &[Role::Buyer]).unwrap();
        let refresh = issuer.issue_refresh_token(&user_id).unwrap();

        assert!(matches!(
            issuer.verify_refresh_token(&access),
            Err(IdentityError::InvalidToken)
        ));
        assert!(matches!(
            issuer.verify_access_token(&refresh),
            Err(IdentityError::InvalidToken)
        ));
        assert!(!issuer.verify_frontend_token(&access));
    }

    #[test]
    fn test_frontend_token() {
        let issuer = issuer();
        let now = Utc::now();
        let token = issuer.issue_frontend_token_at(now).unwrap();

        assert!(issuer.verify_frontend_token(&token));
        assert!(issuer.verify_frontend_token(&format!("Bearer {}", token)));

        let claims = issuer.verify_frontend_token_at(&token, now).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 3600);

        let later = now + Duration::hours(24) + Duration::seconds(1);
        assert!(matches!(
            issuer.verify_frontend_token_at(&token, later),
            Err(IdentityError::TokenExpired)
        ));
    }

    #[test]
    fn test_frontend_token_requires_type_marker() {
        let config = IdentityConfig::with_random_secret();
        let issuer = TokenIssuer::new(&config).unwrap();
        let exp = (Utc::now() + Duration::hours(1)).timestamp();

        let missing = forge(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            &format!(r#"{{"expires":{}}}"#, exp),
            &config.frontend_token_secret,
        );
        assert!(!issuer.verify_frontend_token(&missing));

        let wrong = forge(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            &format!(r#"{{"type":"backend","expires":{}}}"#, exp),
            &config.frontend_token_secret,
        );
        assert!(!issuer.verify_frontend_token(&wrong));

        let good = forge(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            &format!(r#"{{"type":"frontend","expires":{}}}"#, exp),
            &config.frontend_token_secret,
        );
        assert!(issuer.verify_frontend_token(&good));
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let config = IdentityConfig::with_random_secret();
        let issuer = TokenIssuer::new(&config).unwrap();
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let claims = format!(r#"{{"id":"u1","role":["admin"],"expires":{}}}"#, exp);

        for alg in ["none", "HS512", "RS256", "hs256"] {
            let token = forge(
                &format!(r#"{{"alg":"{}","typ":"JWT"}}"#, alg),
                &claims,
                &config.access_token_secret,
            );
            assert!(
                matches!(issuer.verify_access_token(&token), Err(IdentityError::InvalidToken)),
                "alg {alg} must be rejected"
            );
        }

        // Unsigned token with an empty signature segment
        let unsigned = format!(
            "{}.{}.",
            to_base64url(br#"{"alg":"none"}"#),
            to_base64url(claims.as_bytes())
        );
        assert!(issuer.verify_access_token(&unsigned).is_err());
    }

    #[test]
    fn test_expired_access_token() {
        let issuer = issuer();
        let issued = Utc::now() - Duration::minutes(16);
        let token = issuer
            .issue_access_token_at(&UserId::new(), &[Role::Buyer], issued)
            .unwrap();
        assert!(matches!(
            issuer.verify_access_token(&token),
            Err(IdentityError::TokenExpired)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token(&UserId::new(), &[Role::Buyer])
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let elevated = to_base64url(
            format!(r#"{{"id":"u1","role":["superAdmin"],"expires":{}}}"#, exp).as_bytes(),
        );
        let tampered = format!("{}.{}.{}", parts[0], elevated, parts[2]);
        assert!(matches!(
            issuer.verify_access_token(&tampered),
            Err(IdentityError::InvalidToken)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let issuer = issuer();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.***.???"] {
            assert!(issuer.verify_access_token(token).is_err(), "{token:?}");
        }
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let config = IdentityConfig::default();
        assert!(matches!(
            TokenIssuer::new(&config),
            Err(IdentityError::Internal(_))
        ));
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error() {
        let config = IdentityConfig {
            access_token_ttl: std::time::Duration::from_secs(u64::MAX),
            ..IdentityConfig::with_random_secret()
        };
        let issuer = TokenIssuer::new(&config).unwrap();
        assert!(matches!(
            issuer.issue_access_token(&UserId::new(), &[Role::Buyer]),
            Err(IdentityError::Internal(_))
        ));
        assert!(issuer.issue_refresh_token(&UserId::new()).is_ok());
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(strip_bearer("  Bearer   abc "), "abc");
        assert_eq!(strip_bearer("abc.def.ghi"), "abc.def.ghi");
    }
}
