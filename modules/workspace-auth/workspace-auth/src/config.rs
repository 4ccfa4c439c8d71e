//! Configuration for the workspace auth gate.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Gate configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceAuthConfig {
    /// OAuth client id; the required `aud` of identity tokens.
    pub client_id: String,

    /// Accepted `iss` values of identity tokens.
    #[serde(default = "default_issuers")]
    pub issuers: Vec<String>,

    /// Consumer mail domains that are never eligible. Subdomains match too.
    #[serde(default = "default_personal_provider_domains")]
    pub personal_provider_domains: Vec<String>,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub dns: DnsConfig,

    pub session: SessionConfig,

    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
}

impl WorkspaceAuthConfig {
    /// Reject values that would silently disable a protection.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limits.validate()
    }

    /// Configuration with defaults for everything but the client id and signing secret.
    #[must_use]
    pub fn new(client_id: impl Into<String>, signing_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            issuers: default_issuers(),
            personal_provider_domains: default_personal_provider_domains(),
            verifier: VerifierConfig::default(),
            dns: DnsConfig::default(),
            session: SessionConfig::new(signing_secret),
            rate_limits: RateLimitsConfig::default(),
        }
    }
}

/// Identity token verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// JWKS document of the identity provider.
    pub jwks_url: String,

    /// How long a fetched key set is trusted before it is fetched again.
    pub jwks_ttl_secs: u64,

    /// Allowed clock skew for `exp`/`iat`.
    pub clock_skew_secs: u64,

    /// Upper bound on a single verification, JWKS fetch included.
    pub timeout_ms: u64,

    /// Shared HS256 key used instead of the JWKS. Development and tests only.
    pub static_hs256_secret: Option<SecretString>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            jwks_url: GOOGLE_JWKS_URL.to_owned(),
            jwks_ttl_secs: 3600,
            clock_skew_secs: 60,
            timeout_ms: 5_000,
            static_hs256_secret: None,
        }
    }
}

impl VerifierConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// MX lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DnsConfig {
    /// Upper bound on a single MX lookup.
    pub timeout_ms: u64,

    /// Mail exchangers that identify a workspace-hosted domain.
    pub workspace_mx_hosts: Vec<String>,

    /// Fixed MX answers used instead of DNS. Development and tests only.
    pub static_records: HashMap<String, Vec<String>>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            workspace_mx_hosts: default_workspace_mx_hosts(),
            static_records: HashMap::new(),
        }
    }
}

impl DnsConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Session credentials issued by the gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// HS256 key for access and refresh tokens.
    pub signing_secret: SecretString,

    #[serde(default = "default_session_issuer")]
    pub issuer: String,

    #[serde(default = "default_session_audience")]
    pub audience: String,

    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,

    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn new(signing_secret: SecretString) -> Self {
        Self {
            signing_secret,
            issuer: default_session_issuer(),
            audience: default_session_audience(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
        }
    }
}

/// IP-scoped limits of the sign-in endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitsConfig {
    pub authenticate: WindowLimit,
    pub refresh: WindowLimit,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            authenticate: WindowLimit {
                limit: 10,
                window_secs: 60,
            },
            refresh: WindowLimit {
                limit: 30,
                window_secs: 60,
            },
        }
    }
}

/// `limit` hits per fixed window of `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowLimit {
    pub limit: u32,
    pub window_secs: u64,
}

impl WindowLimit {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// A zero window resets the counter on every call, so both values must
    /// be positive.
    ///
    /// # Errors
    /// Returns [`ConfigError`] naming the offending field.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::ZeroLimit { name });
        }
        if self.window_secs == 0 {
            return Err(ConfigError::ZeroWindow { name });
        }
        Ok(())
    }
}

impl RateLimitsConfig {
    /// # Errors
    /// Returns [`ConfigError`] if either limit is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.authenticate.validate("rate_limits.authenticate")?;
        self.refresh.validate("rate_limits.refresh")
    }
}

/// Configuration values the gate cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}.limit must be greater than zero")]
    ZeroLimit { name: &'static str },
    #[error("{name}.window_secs must be greater than zero")]
    ZeroWindow { name: &'static str },
}

fn default_issuers() -> Vec<String> {
    vec![
        "accounts.google.com".to_owned(),
        "https://accounts.google.com".to_owned(),
    ]
}

fn default_personal_provider_domains() -> Vec<String> {
    [
        "gmail.com",
        "googlemail.com",
        "yahoo.com",
        "ymail.com",
        "hotmail.com",
        "outlook.com",
        "live.com",
        "msn.com",
        "icloud.com",
        "me.com",
        "aol.com",
        "protonmail.com",
        "proton.me",
        "mail.com",
        "gmx.com",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_workspace_mx_hosts() -> Vec<String> {
    [
        "aspmx.l.google.com",
        "alt1.aspmx.l.google.com",
        "alt2.aspmx.l.google.com",
        "alt3.aspmx.l.google.com",
        "alt4.aspmx.l.google.com",
        "aspmx2.googlemail.com",
        "aspmx3.googlemail.com",
        "aspmx4.googlemail.com",
        "aspmx5.googlemail.com",
        "smtp.google.com",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_session_issuer() -> String {
    "workspace-gate".to_owned()
}

fn default_session_audience() -> String {
    "workspace-gate-api".to_owned()
}

fn default_access_ttl_secs() -> u64 {
    3600
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 3600
}
