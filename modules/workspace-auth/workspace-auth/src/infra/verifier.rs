//! Identity token verification against the provider's JWKS.
//!
//! The key set is fetched over HTTPS, cached for a TTL and re-fetched when a
//! token names an unknown `kid` (provider key rotation). Fetches are serialized
//! and spaced at least [`MIN_REFETCH_INTERVAL`] apart, so a stream of tokens
//! with made-up `kid`s costs one request per interval. The algorithm is pinned
//! per key source before any key lookup, so an attacker cannot pick it through
//! the token header.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use workspace_auth_sdk::{
    IdentityClaims, IdentityTokenVerifier, TokenVerificationError, VerificationParams,
};

/// Shortest gap between two JWKS fetches.
pub const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

struct JwksSource {
    client: reqwest::Client,
    url: String,
    ttl: Duration,
    min_refetch: Duration,
    cache: RwLock<Option<CachedJwks>>,
    /// Held for the duration of a fetch; stores when the last one started.
    last_fetch: tokio::sync::Mutex<Option<Instant>>,
}

enum KeySource {
    Jwks(JwksSource),
    /// Shared-secret HS256 key, development and tests only.
    Static(DecodingKey),
}

/// JWT verifier for identity tokens.
pub struct JwtIdentityVerifier {
    keys: KeySource,
    clock_skew_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    #[serde(default)]
    email: Option<String>,
    // some tokens carry "true"/"false" strings
    #[serde(default, deserialize_with = "bool_or_string")]
    email_verified: bool,
    #[serde(default)]
    hd: Option<String>,
    #[serde(default)]
    iat: i64,
    exp: i64,
}

impl JwtIdentityVerifier {
    /// Verifier backed by the JWKS document at `url`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn jwks(
        url: impl Into<String>,
        ttl: Duration,
        fetch_timeout: Duration,
        clock_skew_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("failed to build JWKS http client")?;
        Ok(Self {
            keys: KeySource::Jwks(JwksSource::new(client, url.into(), ttl)),
            clock_skew_secs,
        })
    }

    /// Verifier accepting HS256 tokens signed with `secret`.
    #[must_use]
    pub fn static_hs256(secret: &SecretString, clock_skew_secs: u64) -> Self {
        tracing::warn!("identity tokens are verified with a static HS256 key; do NOT use in production");
        Self {
            keys: KeySource::Static(DecodingKey::from_secret(secret.expose_secret().as_bytes())),
            clock_skew_secs,
        }
    }

    async fn decoding_key(
        &self,
        alg: Algorithm,
        kid: Option<&str>,
    ) -> Result<DecodingKey, TokenVerificationError> {
        match &self.keys {
            KeySource::Static(key) => {
                if alg != Algorithm::HS256 {
                    return Err(TokenVerificationError::Malformed("unsupported algorithm".to_owned()));
                }
                Ok(key.clone())
            }
            KeySource::Jwks(source) => {
                if alg != Algorithm::RS256 {
                    return Err(TokenVerificationError::Malformed("unsupported algorithm".to_owned()));
                }
                let kid = kid.ok_or_else(|| TokenVerificationError::Malformed("missing kid".to_owned()))?;

                let jwk = source.jwk(kid).await?;
                if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
                    return Err(TokenVerificationError::KeyUnavailable("kty mismatch".to_owned()));
                }
                DecodingKey::from_jwk(&jwk)
                    .map_err(|e| TokenVerificationError::KeyUnavailable(e.to_string()))
            }
        }
    }
}

impl JwksSource {
    fn new(client: reqwest::Client, url: String, ttl: Duration) -> Self {
        Self {
            client,
            url,
            ttl,
            min_refetch: MIN_REFETCH_INTERVAL.min(ttl),
            cache: RwLock::new(None),
            last_fetch: tokio::sync::Mutex::new(None),
        }
    }

    /// Key for `kid` from a fresh cache, fetching the set when the cache is
    /// stale or lacks the key and the previous fetch is old enough.
    async fn jwk(&self, kid: &str) -> Result<Jwk, TokenVerificationError> {
        if let Some(jwk) = self.cached(kid) {
            return Ok(jwk);
        }

        let mut last_fetch = self.last_fetch.lock().await;
        // a concurrent caller may have fetched while we waited
        if let Some(jwk) = self.cached(kid) {
            return Ok(jwk);
        }
        if last_fetch.is_some_and(|at| at.elapsed() < self.min_refetch) {
            tracing::debug!(kid, "unknown kid, JWKS fetched too recently to retry");
            return Err(TokenVerificationError::KeyUnavailable(format!("no key for kid {kid}")));
        }

        tracing::debug!(kid, "kid not in cached JWKS, fetching");
        *last_fetch = Some(Instant::now());
        let jwks = self.fetch().await?;
        find_jwk(&jwks, kid)
            .cloned()
            .ok_or_else(|| TokenVerificationError::KeyUnavailable(format!("no key for kid {kid}")))
    }

    fn cached(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read();
        let cached = cache.as_ref().filter(|c| c.expires_at > Instant::now())?;
        find_jwk(&cached.jwks, kid).cloned()
    }

    async fn fetch(&self) -> Result<JwkSet, TokenVerificationError> {
        let jwks: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TokenVerificationError::KeyUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| TokenVerificationError::KeyUnavailable(e.to_string()))?;

        tracing::debug!(url = %self.url, keys = jwks.keys.len(), "fetched JWKS");
        *self.cache.write() = Some(CachedJwks {
            jwks: jwks.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(jwks)
    }
}

#[async_trait]
impl IdentityTokenVerifier for JwtIdentityVerifier {
    async fn verify(
        &self,
        raw_token: &str,
        params: &VerificationParams,
    ) -> Result<IdentityClaims, TokenVerificationError> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(TokenVerificationError::Malformed("empty token".to_owned()));
        }

        let header =
            decode_header(raw_token).map_err(|e| TokenVerificationError::Malformed(e.to_string()))?;
        let key = self.decoding_key(header.alg, header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[params.audience.as_str()]);
        validation.set_issuer(params.issuers.as_slice());
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.clock_skew_secs;

        let data = decode::<IdTokenClaims>(raw_token, &key, &validation).map_err(map_jwt_error)?;
        let claims = data.claims;

        Ok(IdentityClaims {
            issuer: claims.iss,
            subject: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            hosted_domain: claims.hd.filter(|hd| !hd.trim().is_empty()),
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenVerificationError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenVerificationError::Expired,
        ErrorKind::InvalidSignature => TokenVerificationError::InvalidSignature,
        ErrorKind::InvalidAudience => TokenVerificationError::InvalidAudience,
        ErrorKind::InvalidIssuer => TokenVerificationError::InvalidIssuer,
        _ => TokenVerificationError::Malformed(e.to_string()),
    }
}

fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}
