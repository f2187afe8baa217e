//! Access and refresh token issuance and verification.
//!
//! Both kinds are HS256 JWTs with the same claim shape but separate secrets,
//! so a token of one kind never verifies on the other kind's path. Tokens are
//! stateless: there is no revocation list and a token stops working only when
//! its `exp` passes or the secrets change.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, TokenError};

const ALGORITHM: Algorithm = Algorithm::HS256;
const GENERATED_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// What a token says about its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    pub fn new(sub: Uuid) -> Self {
        Self { sub, email: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(flatten)]
    claims: Claims,
    typ: TokenKind,
    iat: i64,
    exp: i64,
}

/// Signing material for both token kinds.
pub struct TokenSecrets {
    access: Vec<u8>,
    refresh: Vec<u8>,
}

impl fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSecrets")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

impl TokenSecrets {
    pub fn new(access: impl Into<Vec<u8>>, refresh: impl Into<Vec<u8>>) -> Result<Self, AppError> {
        let (access, refresh) = (access.into(), refresh.into());
        if access.is_empty() || refresh.is_empty() {
            return Err(AppError::ConfigError("token secrets must not be empty".into()));
        }
        if access == refresh {
            return Err(AppError::ConfigError(
                "access and refresh secrets must differ".into(),
            ));
        }
        Ok(Self { access, refresh })
    }

    /// Fresh random secrets for this process only.
    pub fn generate() -> Self {
        Self {
            access: random_secret(),
            refresh: random_secret(),
        }
    }

    /// Configured secrets where present, a per-process random secret otherwise.
    pub fn from_settings(auth: &AuthConfig) -> Result<Self, AppError> {
        let access = match &auth.access_secret {
            Some(secret) => secret.clone().into_bytes(),
            None => {
                warn!("No access secret configured; tokens will not survive a restart");
                random_secret()
            }
        };
        let refresh = match &auth.refresh_secret {
            Some(secret) => secret.clone().into_bytes(),
            None => {
                warn!("No refresh secret configured; tokens will not survive a restart");
                random_secret()
            }
        };
        Self::new(access, refresh)
    }

    fn for_kind(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

fn random_secret() -> Vec<u8> {
    let mut bytes = vec![0u8; GENERATED_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub struct TokenService {
    secrets: TokenSecrets,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(secrets: TokenSecrets, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;

        Self {
            secrets,
            access_ttl,
            refresh_ttl,
            validation,
        }
    }

    pub fn from_settings(auth: &AuthConfig) -> Result<Self, AppError> {
        Ok(Self::new(
            TokenSecrets::from_settings(auth)?,
            Duration::minutes(auth.access_token_ttl_minutes),
            Duration::days(auth.refresh_token_ttl_days),
        ))
    }

    pub fn issue_access(&self, claims: &Claims) -> Result<String, AppError> {
        self.issue(TokenKind::Access, claims, self.access_ttl)
    }

    pub fn issue_access_with_ttl(&self, claims: &Claims, ttl: Duration) -> Result<String, AppError> {
        self.issue(TokenKind::Access, claims, ttl)
    }

    pub fn issue_refresh(&self, claims: &Claims) -> Result<String, AppError> {
        self.issue(TokenKind::Refresh, claims, self.refresh_ttl)
    }

    pub fn issue_refresh_with_ttl(&self, claims: &Claims, ttl: Duration) -> Result<String, AppError> {
        self.issue(TokenKind::Refresh, claims, ttl)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Refresh, token)
    }

    fn issue(&self, kind: TokenKind, claims: &Claims, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let envelope = Envelope {
            claims: claims.clone(),
            typ: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(ALGORITHM),
            &envelope,
            &EncodingKey::from_secret(self.secrets.for_kind(kind)),
        )
        .map_err(|e| AppError::InternalError(format!("failed to sign {} token: {}", kind, e)))
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Envelope>(
            token,
            &DecodingKey::from_secret(self.secrets.for_kind(kind)),
            &self.validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired(kind),
            other => {
                debug!("Rejected {} token: {:?}", kind, other);
                TokenError::Invalid(kind)
            }
        })?;

        if data.claims.typ != kind {
            debug!("Rejected {} token carrying typ {}", kind, data.claims.typ);
            return Err(TokenError::Invalid(kind));
        }

        Ok(data.claims.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(TokenSecrets::generate(), Duration::minutes(60), Duration::days(7))
    }

    fn claims() -> Claims {
        Claims::new(Uuid::new_v4()).with_email("someone@example.com")
    }

    #[test]
    fn test_access_round_trip() {
        let tokens = service();
        let claims = claims();
        let token = tokens.issue_access(&claims).unwrap();
        assert_eq!(tokens.verify_access(&token).unwrap(), claims);

        let bare = Claims::new(Uuid::new_v4());
        let token = tokens.issue_access(&bare).unwrap();
        assert_eq!(tokens.verify_access(&token).unwrap(), bare);
    }

    #[test]
    fn test_refresh_round_trip() {
        let tokens = service();
        let claims = claims();
        let token = tokens.issue_refresh(&claims).unwrap();
        assert_eq!(tokens.verify_refresh(&token).unwrap(), claims);
    }

    #[test]
    fn test_zero_ttl_expires() {
        let tokens = service();
        let access = tokens.issue_access_with_ttl(&claims(), Duration::zero()).unwrap();
        let refresh = tokens.issue_refresh_with_ttl(&claims(), Duration::zero()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert_eq!(tokens.verify_access(&access), Err(TokenError::Expired(TokenKind::Access)));
        assert_eq!(tokens.verify_refresh(&refresh), Err(TokenError::Expired(TokenKind::Refresh)));
    }

    #[test]
    fn test_cross_kind_rejected() {
        let tokens = service();
        let claims = claims();
        let access = tokens.issue_access(&claims).unwrap();
        let refresh = tokens.issue_refresh(&claims).unwrap();

        assert_eq!(tokens.verify_refresh(&access), Err(TokenError::Invalid(TokenKind::Refresh)));
        assert_eq!(tokens.verify_access(&refresh), Err(TokenError::Invalid(TokenKind::Access)));
    }

    #[test]
    fn test_expired_token_of_wrong_kind_is_invalid() {
        let tokens = service();
        let access = tokens.issue_access_with_ttl(&claims(), Duration::minutes(-5)).unwrap();
        assert_eq!(tokens.verify_refresh(&access), Err(TokenError::Invalid(TokenKind::Refresh)));
        assert_eq!(tokens.verify_access(&access), Err(TokenError::Expired(TokenKind::Access)));
    }

    #[test]
    fn test_typ_mismatch_rejected_even_with_shared_key() {
        // Same bytes are refused by TokenSecrets::new, so build the envelope by hand
        let secrets = TokenSecrets::generate();
        let envelope = Envelope {
            claims: claims(),
            typ: TokenKind::Refresh,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let forged = encode(
            &Header::new(ALGORITHM),
            &envelope,
            &EncodingKey::from_secret(secrets.for_kind(TokenKind::Access)),
        )
        .unwrap();

        let tokens = TokenService::new(secrets, Duration::minutes(60), Duration::days(7));
        assert_eq!(tokens.verify_access(&forged), Err(TokenError::Invalid(TokenKind::Access)));
    }

    #[test]
    fn test_any_tampered_byte_is_invalid() {
        let tokens = service();
        let token = tokens.issue_access(&claims()).unwrap();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert_eq!(
                tokens.verify_access(&tampered),
                Err(TokenError::Invalid(TokenKind::Access)),
                "tampering byte {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_garbage_and_foreign_algorithm_rejected() {
        let tokens = service();
        assert_eq!(tokens.verify_access(""), Err(TokenError::Invalid(TokenKind::Access)));
        assert_eq!(tokens.verify_access("not.a.jwt"), Err(TokenError::Invalid(TokenKind::Access)));

        let secrets = TokenSecrets::new("access-secret", "refresh-secret").unwrap();
        let envelope = Envelope {
            claims: claims(),
            typ: TokenKind::Access,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &envelope,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();
        let tokens = TokenService::new(secrets, Duration::minutes(60), Duration::days(7));
        assert_eq!(tokens.verify_access(&hs512), Err(TokenError::Invalid(TokenKind::Access)));
    }

    #[test]
    fn test_generated_secrets_do_not_survive_restart() {
        let before = service();
        let token = before.issue_access(&claims()).unwrap();

        let after = service();
        assert_eq!(after.verify_access(&token), Err(TokenError::Invalid(TokenKind::Access)));
    }

    #[test]
    fn test_configured_secrets_survive_restart() {
        let auth = AuthConfig {
            access_secret: Some("persisted-access".into()),
            refresh_secret: Some("persisted-refresh".into()),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 7,
            bcrypt_cost: 4,
        };
        let claims = claims();
        let token = TokenService::from_settings(&auth).unwrap().issue_refresh(&claims).unwrap();
        let restarted = TokenService::from_settings(&auth).unwrap();
        assert_eq!(restarted.verify_refresh(&token).unwrap(), claims);
    }

    #[test]
    fn test_identical_secrets_rejected() {
        assert!(matches!(
            TokenSecrets::new("same", "same"),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(TokenSecrets::new("", "other"), Err(AppError::ConfigError(_))));
    }
}
