//! The workspace auth gate.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use workspace_auth_sdk::{
    AuthenticatedPrincipal, ClientIp, DnsLookupError, EligibilityDecision, IdentityClaims,
    IdentityTokenVerifier, MxResolver, RateLimitDecision, RateLimitKey, RateLimitStore,
    RefreshFamily, RefreshTokenStore, RotationOutcome, SessionCredentialPair,
    TokenVerificationError, VerificationParams,
};

use super::audit::{SecurityEvent, SecurityEventKind};
use super::eligibility::{EligibilityPolicy, email_domain};
use super::error::DomainError;
use super::session::{SessionIssuer, TokenKind, unix_now};
use crate::config::{RateLimitsConfig, WindowLimit, WorkspaceAuthConfig};

/// External collaborators the gate composes with.
#[derive(Clone)]
pub struct Collaborators {
    pub verifier: Arc<dyn IdentityTokenVerifier>,
    pub mx_resolver: Arc<dyn MxResolver>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub refresh_store: Arc<dyn RefreshTokenStore>,
}

/// Gate service: eligibility evaluation plus session issuance and rotation.
///
/// Holds no per-request state; everything shared lives in the stores.
pub struct Service {
    deps: Collaborators,
    policy: EligibilityPolicy,
    sessions: SessionIssuer,
    params: VerificationParams,
    verify_timeout: Duration,
    dns_timeout: Duration,
    limits: RateLimitsConfig,
}

impl Service {
    /// Build the gate from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the session signing key or a rate limit is unusable.
    pub fn new(cfg: &WorkspaceAuthConfig, deps: Collaborators) -> Result<Self, DomainError> {
        cfg.validate()?;
        Ok(Self {
            deps,
            policy: EligibilityPolicy::new(
                &cfg.personal_provider_domains,
                &cfg.dns.workspace_mx_hosts,
            ),
            sessions: SessionIssuer::new(&cfg.session)?,
            params: VerificationParams {
                audience: cfg.client_id.clone(),
                issuers: cfg.issuers.clone(),
            },
            verify_timeout: cfg.verifier.timeout(),
            dns_timeout: cfg.dns.timeout(),
            limits: cfg.rate_limits.clone(),
        })
    }

    /// Exchange an identity token for a new session.
    ///
    /// Checks run cheapest first: IP rate limit, token verification, claim
    /// rules, then the MX lookup. Every exit records a security event.
    ///
    /// # Errors
    ///
    /// See [`DomainError`]; every variant is a terminal rejection.
    #[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
    pub async fn authenticate(
        &self,
        credential: &str,
        client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, DomainError> {
        const KIND: SecurityEventKind = SecurityEventKind::Authenticate;
        let deny = |decision: &str, domain: Option<&str>| {
            SecurityEvent::denied(KIND, decision)
                .domain(domain)
                .ip(client_ip)
                .record();
        };

        self.enforce_ip_limit(KIND, self.limits.authenticate, client_ip)
            .await?;

        let claims = match self.verify(credential).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "identity token rejected by verifier");
                deny(EligibilityDecision::RejectedMalformedToken.as_str(), None);
                return Err(e.into());
            }
        };

        let (email, domain) = match self.policy.evaluate_claims(&claims) {
            EligibilityDecision::Accepted { email, domain } => (email, domain),
            rejected => {
                let claimed = claims.email.as_deref().and_then(email_domain);
                deny(rejected.as_str(), claimed.as_deref());
                return Err(DomainError::Rejected(rejected));
            }
        };

        if let Err(e) = self.check_workspace_mx(&domain).await {
            tracing::debug!(error = %e, "workspace MX check failed");
            deny(
                EligibilityDecision::RejectedNonWorkspaceDomain.as_str(),
                Some(&domain),
            );
            return Err(e);
        }

        if !claims.email_verified {
            deny(
                EligibilityDecision::RejectedMalformedToken.as_str(),
                Some(&domain),
            );
            return Err(DomainError::EmailNotVerified);
        }

        let pair = match self.start_session(&email, &domain).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "failed to start session");
                deny("internal", Some(&domain));
                return Err(e);
            }
        };

        SecurityEvent::granted(KIND, "accepted")
            .domain(Some(&domain))
            .ip(client_ip)
            .record();
        Ok(pair)
    }

    /// Rotate a refresh token.
    ///
    /// # Errors
    ///
    /// `Replayed` for a stale token (the whole family is revoked),
    /// `UnknownSession` for a revoked or expired family, `Session` for an
    /// invalid token, `RateLimited` when the IP window is exhausted.
    #[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, DomainError> {
        const KIND: SecurityEventKind = SecurityEventKind::Refresh;

        self.enforce_ip_limit(KIND, self.limits.refresh, client_ip)
            .await?;

        let claims = match self.sessions.decode(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                SecurityEvent::denied(KIND, "malformed_token")
                    .ip(client_ip)
                    .record();
                return Err(e.into());
            }
        };
        let domain = Some(claims.dom.as_str());

        let now = unix_now();
        let next_jti = Uuid::new_v4();
        let next_expires_at = self.sessions.refresh_expiry(now)?;

        let outcome = self
            .deps
            .refresh_store
            .rotate(claims.sid, claims.jti, next_jti, next_expires_at)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, family_id = %claims.sid, "refresh store failed");
            })?;

        match outcome {
            RotationOutcome::Rotated { generation } => {
                let issued = self.sessions.issue(
                    &claims.sub,
                    &claims.dom,
                    claims.sid,
                    generation,
                    next_jti,
                    now,
                )?;
                SecurityEvent::granted(KIND, "rotated")
                    .domain(domain)
                    .ip(client_ip)
                    .record();
                Ok(issued.pair)
            }
            RotationOutcome::Replayed => {
                tracing::warn!(
                    family_id = %claims.sid,
                    generation = claims.generation,
                    "refresh token replayed, revoking session family"
                );
                if let Err(e) = self.deps.refresh_store.revoke_family(claims.sid).await {
                    tracing::error!(error = %e, family_id = %claims.sid, "failed to revoke replayed family");
                }
                SecurityEvent::threat(KIND, "replayed_refresh_token")
                    .domain(domain)
                    .ip(client_ip)
                    .record();
                Err(DomainError::Replayed {
                    family_id: claims.sid,
                })
            }
            RotationOutcome::Unknown => {
                SecurityEvent::denied(KIND, "malformed_token")
                    .domain(domain)
                    .ip(client_ip)
                    .record();
                Err(DomainError::UnknownSession {
                    family_id: claims.sid,
                })
            }
        }
    }

    /// Revoke the session a refresh token belongs to. Idempotent.
    ///
    /// # Errors
    ///
    /// `Session` if the token is invalid, `Store` if revocation fails.
    #[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
    pub async fn logout(&self, refresh_token: &str, client_ip: ClientIp) -> Result<(), DomainError> {
        const KIND: SecurityEventKind = SecurityEventKind::Logout;

        let claims = match self.sessions.decode(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                SecurityEvent::denied(KIND, "malformed_token")
                    .ip(client_ip)
                    .record();
                return Err(e.into());
            }
        };

        let was_active = self.deps.refresh_store.revoke_family(claims.sid).await?;
        SecurityEvent::granted(KIND, if was_active { "revoked" } else { "already_revoked" })
            .domain(Some(&claims.dom))
            .ip(client_ip)
            .record();
        Ok(())
    }

    /// Validate a gate-issued access token.
    ///
    /// # Errors
    ///
    /// `Session` for invalid tokens, `UnknownSession` once the family is revoked.
    pub async fn validate_access_token(
        &self,
        access_token: &str,
    ) -> Result<AuthenticatedPrincipal, DomainError> {
        let claims = self.sessions.decode(access_token, TokenKind::Access)?;
        if !self.deps.refresh_store.is_active(claims.sid).await? {
            return Err(DomainError::UnknownSession {
                family_id: claims.sid,
            });
        }
        Ok(AuthenticatedPrincipal {
            email: claims.sub,
            domain: claims.dom,
            session_id: claims.sid,
            expires_at: claims.exp,
        })
    }

    async fn enforce_ip_limit(
        &self,
        kind: SecurityEventKind,
        limit: WindowLimit,
        client_ip: ClientIp,
    ) -> Result<(), DomainError> {
        let key = RateLimitKey::ip(kind.as_str(), client_ip.0);
        let decision = match self
            .deps
            .rate_limits
            .check_and_increment(&key, limit.limit, limit.window())
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                // fail closed
                tracing::error!(error = %e, key = %key, "rate-limit store failed, denying");
                RateLimitDecision::Denied {
                    retry_after: limit.window(),
                }
            }
        };

        match decision {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Denied { retry_after } => {
                SecurityEvent::denied(kind, "rate_limited")
                    .ip(client_ip)
                    .record();
                Err(DomainError::RateLimited { retry_after })
            }
        }
    }

    async fn verify(&self, credential: &str) -> Result<IdentityClaims, TokenVerificationError> {
        tokio::time::timeout(
            self.verify_timeout,
            self.deps.verifier.verify(credential, &self.params),
        )
        .await
        .unwrap_or(Err(TokenVerificationError::Timeout))
    }

    async fn check_workspace_mx(&self, domain: &str) -> Result<(), DomainError> {
        let exchanges = tokio::time::timeout(
            self.dns_timeout,
            self.deps.mx_resolver.lookup_mx(domain),
        )
        .await
        .unwrap_or(Err(DnsLookupError::Timeout))
        .map_err(|source| DomainError::MxLookup {
            domain: domain.to_owned(),
            source,
        })?;

        if self.policy.matches_workspace_mx(&exchanges) {
            Ok(())
        } else {
            Err(DomainError::Rejected(
                EligibilityDecision::RejectedNonWorkspaceDomain,
            ))
        }
    }

    async fn start_session(
        &self,
        email: &str,
        domain: &str,
    ) -> Result<SessionCredentialPair, DomainError> {
        let now = unix_now();
        let family_id = Uuid::new_v4();
        let issued = self
            .sessions
            .issue(email, domain, family_id, 0, Uuid::new_v4(), now)?;

        self.deps
            .refresh_store
            .register(RefreshFamily {
                family_id,
                subject: email.to_owned(),
                current_jti: issued.refresh_jti,
                generation: 0,
                expires_at: issued.refresh_expires_at,
            })
            .await?;

        Ok(issued.pair)
    }
}
