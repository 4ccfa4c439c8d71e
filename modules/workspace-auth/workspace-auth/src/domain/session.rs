//! Session credentials: HS256-signed access and refresh tokens.
//!
//! Both kinds share one key and one claim layout; `typ` tells them apart so a
//! refresh token is never accepted where an access token is expected.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;
use workspace_auth_sdk::SessionCredentialPair;

use crate::config::SessionConfig;

const MIN_SECRET_LEN: usize = 32;

/// Current time as unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims of a gate-issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    /// Subject email.
    pub sub: String,
    /// Email domain.
    pub dom: String,
    /// Refresh family (session) id.
    pub sid: Uuid,
    pub jti: Uuid,
    pub typ: TokenKind,
    #[serde(rename = "gen", default)]
    pub generation: u32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session signing key is not configured")]
    MissingKey,
    #[error("session lifetime out of range")]
    LifetimeOutOfRange,
    #[error("failed to sign session token: {0}")]
    Signing(String),
    #[error("invalid session token: {0}")]
    Invalid(String),
    #[error("expected {expected:?} token, got {actual:?}")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },
}

/// A pair plus the rotation state the refresh store must record.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub pair: SessionCredentialPair,
    pub refresh_jti: Uuid,
    pub refresh_expires_at: i64,
}

/// Mints and validates session tokens.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl SessionIssuer {
    /// Build an issuer from configuration.
    ///
    /// # Errors
    ///
    /// `MissingKey` if the signing secret is empty.
    pub fn new(cfg: &SessionConfig) -> Result<Self, SessionError> {
        let secret = cfg.signing_secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(SessionError::MissingKey);
        }
        if secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                len = secret.len(),
                min = MIN_SECRET_LEN,
                "session signing secret is shorter than recommended"
            );
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[cfg.issuer.as_str()]);
        validation.set_audience(&[cfg.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.access_ttl_secs),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_secs),
            validation,
        })
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Unix expiry of a refresh token minted at `now`.
    ///
    /// # Errors
    ///
    /// `LifetimeOutOfRange` if the configured lifetime overflows.
    pub fn refresh_expiry(&self, now: i64) -> Result<i64, SessionError> {
        add_secs(now, self.refresh_ttl)
    }

    /// Mint an access/refresh pair for one generation of a session family.
    ///
    /// # Errors
    ///
    /// `Signing` if encoding fails.
    pub fn issue(
        &self,
        email: &str,
        domain: &str,
        family_id: Uuid,
        generation: u32,
        refresh_jti: Uuid,
        now: i64,
    ) -> Result<IssuedSession, SessionError> {
        let access_exp = add_secs(now, self.access_ttl)?;
        let refresh_exp = add_secs(now, self.refresh_ttl)?;

        let access = self.claims(email, domain, family_id, generation, Uuid::new_v4(), TokenKind::Access, now, access_exp);
        let refresh = self.claims(email, domain, family_id, generation, refresh_jti, TokenKind::Refresh, now, refresh_exp);

        let access_token = self.sign(&access)?;
        let refresh_token = self.sign(&refresh)?;

        Ok(IssuedSession {
            pair: SessionCredentialPair {
                access_token: SecretString::from(access_token),
                refresh_token: SecretString::from(refresh_token),
                access_expires_in: self.access_ttl,
                refresh_expires_in: self.refresh_ttl,
            },
            refresh_jti,
            refresh_expires_at: refresh_exp,
        })
    }

    /// Validate signature, issuer, audience, expiry and kind of `token`.
    ///
    /// # Errors
    ///
    /// `Invalid` for any validation failure, `WrongKind` for a token of the other kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| SessionError::Invalid(e.to_string()))?;
        let claims = data.claims;
        if claims.typ != expected {
            return Err(SessionError::WrongKind {
                expected,
                actual: claims.typ,
            });
        }
        Ok(claims)
    }

    #[allow(clippy::too_many_arguments)]
    fn claims(
        &self,
        email: &str,
        domain: &str,
        family_id: Uuid,
        generation: u32,
        jti: Uuid,
        typ: TokenKind,
        iat: i64,
        exp: i64,
    ) -> SessionClaims {
        SessionClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: email.to_owned(),
            dom: domain.to_owned(),
            sid: family_id,
            jti,
            typ,
            generation,
            iat,
            exp,
        }
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }
}

fn add_secs(now: i64, ttl: Duration) -> Result<i64, SessionError> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or(SessionError::LifetimeOutOfRange)
}
