#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing_test::traced_test;
use workspace_auth_sdk::{
    ClientIp, DnsLookupError, IdentityClaims, IdentityTokenVerifier, MxResolver,
    RateLimitDecision, RateLimitKey, RateLimitStore, StoreError, TokenVerificationError,
    VerificationParams, WorkspaceAuthError,
};

use super::service::{Collaborators, Service};
use super::session::unix_now;
use crate::config::{WindowLimit, WorkspaceAuthConfig};
use crate::infra::{InMemoryRateLimitStore, InMemoryRefreshTokenStore, StaticMxResolver};

const AUTH_LIMIT: u32 = 3;
const REFRESH_LIMIT: u32 = 4;

/// Maps credential strings to claims; anything else fails signature checks.
#[derive(Default)]
struct FakeVerifier {
    tokens: HashMap<String, IdentityClaims>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeVerifier {
    fn with(mut self, credential: &str, claims: IdentityClaims) -> Self {
        self.tokens.insert(credential.to_owned(), claims);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityTokenVerifier for FakeVerifier {
    async fn verify(
        &self,
        raw_token: &str,
        params: &VerificationParams,
    ) -> Result<IdentityClaims, TokenVerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        assert_eq!(params.audience, "client-123");
        self.tokens
            .get(raw_token)
            .cloned()
            .ok_or(TokenVerificationError::InvalidSignature)
    }
}

struct SlowResolver;

#[async_trait]
impl MxResolver for SlowResolver {
    async fn lookup_mx(&self, _domain: &str) -> Result<Vec<String>, DnsLookupError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec!["aspmx.l.google.com".to_owned()])
    }
}

struct BrokenRateLimitStore;

#[async_trait]
impl RateLimitStore for BrokenRateLimitStore {
    async fn check_and_increment(
        &self,
        _key: &RateLimitKey,
        _limit: u32,
        _window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_owned()))
    }
}

fn claims(email: &str, hd: Option<&str>, verified: bool) -> IdentityClaims {
    let now = unix_now();
    IdentityClaims {
        issuer: "https://accounts.google.com".to_owned(),
        subject: "110169484474386276334".to_owned(),
        email: Some(email.to_owned()),
        email_verified: verified,
        hosted_domain: hd.map(str::to_owned),
        issued_at: now,
        expires_at: now + 3600,
    }
}

fn default_resolver() -> Arc<dyn MxResolver> {
    Arc::new(StaticMxResolver::new([
        ("acme.com", vec!["aspmx.l.google.com.", "alt1.aspmx.l.google.com."]),
        ("selfhosted.org", vec!["mx1.selfhosted.org."]),
        ("gmail.com", vec!["gmail-smtp-in.l.google.com."]),
    ]))
}

fn config() -> WorkspaceAuthConfig {
    let mut cfg = WorkspaceAuthConfig::new(
        "client-123",
        SecretString::from("test-session-secret-0123456789abcdef"),
    );
    cfg.rate_limits.authenticate = WindowLimit {
        limit: AUTH_LIMIT,
        window_secs: 60,
    };
    cfg.rate_limits.refresh = WindowLimit {
        limit: REFRESH_LIMIT,
        window_secs: 60,
    };
    cfg
}

fn gate_with(
    verifier: Arc<FakeVerifier>,
    mx_resolver: Arc<dyn MxResolver>,
    rate_limits: Arc<dyn RateLimitStore>,
) -> Service {
    Service::new(
        &config(),
        Collaborators {
            verifier,
            mx_resolver,
            rate_limits,
            refresh_store: Arc::new(InMemoryRefreshTokenStore::new()),
        },
    )
    .unwrap()
}

fn gate(verifier: Arc<FakeVerifier>) -> Service {
    gate_with(
        verifier,
        default_resolver(),
        Arc::new(InMemoryRateLimitStore::new()),
    )
}

fn ip(last: u8) -> ClientIp {
    ClientIp(IpAddr::V4(Ipv4Addr::new(192, 0, 2, last)))
}

async fn rejection(svc: &Service, credential: &str, client_ip: ClientIp) -> WorkspaceAuthError {
    svc.authenticate(credential, client_ip)
        .await
        .expect_err("expected rejection")
        .into()
}

#[tokio::test]
async fn personal_provider_with_empty_hd_is_rejected() {
    // the verifier maps an empty `hd` to None
    let verifier = Arc::new(FakeVerifier::default().with("gmail", claims("user@gmail.com", None, true)));
    let svc = gate(verifier);

    assert_eq!(
        rejection(&svc, "gmail", ip(1)).await,
        WorkspaceAuthError::PersonalProvider
    );
}

#[tokio::test]
async fn every_denylisted_domain_is_rejected_regardless_of_other_claims() {
    let cfg = config();
    for (i, domain) in cfg.personal_provider_domains.iter().enumerate() {
        let verifier = Arc::new(
            FakeVerifier::default()
                .with("consistent", claims(&format!("u@{domain}"), Some(domain), true))
                .with("mismatched", claims(&format!("u@mail.{domain}"), Some("acme.com"), false)),
        );
        let svc = gate(verifier);
        let client = ip(u8::try_from(i).unwrap());

        assert_eq!(
            rejection(&svc, "consistent", client).await,
            WorkspaceAuthError::PersonalProvider,
            "{domain}"
        );
        assert_eq!(
            rejection(&svc, "mismatched", client).await,
            WorkspaceAuthError::PersonalProvider,
            "mail.{domain}"
        );
    }
}

#[tokio::test]
async fn hosted_domain_mismatch_is_rejected() {
    let verifier = Arc::new(FakeVerifier::default().with("t", claims("alice@acme.com", Some("evil.com"), true)));
    assert_eq!(
        rejection(&gate(verifier), "t", ip(1)).await,
        WorkspaceAuthError::ClaimMismatch
    );
}

#[tokio::test]
async fn non_workspace_mx_is_rejected_even_with_consistent_hd() {
    let verifier = Arc::new(
        FakeVerifier::default()
            .with("selfhosted", claims("bob@selfhosted.org", Some("selfhosted.org"), true))
            .with("nomx", claims("bob@nomx.net", Some("nomx.net"), true)),
    );
    let svc = gate(verifier);

    assert_eq!(
        rejection(&svc, "selfhosted", ip(1)).await,
        WorkspaceAuthError::NonWorkspaceDomain
    );
    assert_eq!(
        rejection(&svc, "nomx", ip(1)).await,
        WorkspaceAuthError::NonWorkspaceDomain
    );
}

#[tokio::test]
async fn unverified_email_is_malformed() {
    let verifier = Arc::new(FakeVerifier::default().with("t", claims("alice@acme.com", Some("acme.com"), false)));
    assert_eq!(
        rejection(&gate(verifier), "t", ip(1)).await,
        WorkspaceAuthError::MalformedToken
    );
}

#[tokio::test]
async fn verifier_failure_is_malformed() {
    let svc = gate(Arc::new(FakeVerifier::default()));
    assert_eq!(
        rejection(&svc, "garbage", ip(1)).await,
        WorkspaceAuthError::MalformedToken
    );
}

#[tokio::test]
async fn workspace_account_gets_a_session() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);

    let pair = svc.authenticate("acme", ip(1)).await.unwrap();
    assert_eq!(pair.access_expires_in, Duration::from_secs(3600));
    assert_eq!(pair.refresh_expires_in, Duration::from_secs(7 * 24 * 3600));
    assert_ne!(
        pair.access_token.expose_secret(),
        pair.refresh_token.expose_secret()
    );

    let principal = svc
        .validate_access_token(pair.access_token.expose_secret())
        .await
        .unwrap();
    assert_eq!(principal.email, "user@acme.com");
    assert_eq!(principal.domain, "acme.com");
}

#[tokio::test]
async fn workspace_account_without_hd_passes_on_mx() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@ACME.com", None, true)));
    let pair = gate(verifier).authenticate("acme", ip(1)).await;
    assert!(pair.is_ok());
}

#[tokio::test]
async fn refresh_rotates_and_replay_revokes_the_family() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);
    let first = svc.authenticate("acme", ip(1)).await.unwrap();

    let second = svc
        .refresh(first.refresh_token.expose_secret(), ip(1))
        .await
        .unwrap();
    assert_eq!(second.access_expires_in, Duration::from_secs(3600));

    let replay: WorkspaceAuthError = svc
        .refresh(first.refresh_token.expose_secret(), ip(2))
        .await
        .unwrap_err()
        .into();
    assert_eq!(replay, WorkspaceAuthError::ReplayedRefreshToken);

    // the replay killed the whole session, including the legitimate successor
    let after: WorkspaceAuthError = svc
        .refresh(second.refresh_token.expose_secret(), ip(1))
        .await
        .unwrap_err()
        .into();
    assert_eq!(after, WorkspaceAuthError::MalformedToken);
    assert!(svc
        .validate_access_token(second.access_token.expose_secret())
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_with_same_token_has_one_winner() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = Arc::new(gate(verifier));
    let pair = svc.authenticate("acme", ip(1)).await.unwrap();
    let token = pair.refresh_token.expose_secret().to_owned();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let token = token.clone();
            tokio::spawn(async move { svc.refresh(&token, ip(1)).await.map_err(WorkspaceAuthError::from) })
        })
        .collect();

    let mut ok = 0;
    let mut replayed = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(WorkspaceAuthError::ReplayedRefreshToken) => replayed += 1,
            Err(other) => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!((ok, replayed), (1, 1));
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);
    let pair = svc.authenticate("acme", ip(1)).await.unwrap();

    let err: WorkspaceAuthError = svc
        .refresh(pair.access_token.expose_secret(), ip(1))
        .await
        .unwrap_err()
        .into();
    assert_eq!(err, WorkspaceAuthError::MalformedToken);
    assert!(svc
        .validate_access_token(pair.refresh_token.expose_secret())
        .await
        .is_err());
}

#[tokio::test]
async fn logout_revokes_and_is_idempotent() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);
    let pair = svc.authenticate("acme", ip(1)).await.unwrap();

    svc.logout(pair.refresh_token.expose_secret(), ip(1)).await.unwrap();
    svc.logout(pair.refresh_token.expose_secret(), ip(1)).await.unwrap();

    assert!(svc
        .validate_access_token(pair.access_token.expose_secret())
        .await
        .is_err());
    let err: WorkspaceAuthError = svc.logout("nonsense", ip(1)).await.unwrap_err().into();
    assert_eq!(err, WorkspaceAuthError::MalformedToken);
}

#[tokio::test]
async fn rate_limit_denies_before_verification() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(Arc::clone(&verifier));

    for _ in 0..AUTH_LIMIT {
        svc.authenticate("acme", ip(9)).await.unwrap();
    }
    let err = rejection(&svc, "acme", ip(9)).await;

    assert!(matches!(err, WorkspaceAuthError::RateLimited { retry_after } if retry_after <= Duration::from_secs(60)));
    assert_eq!(verifier.calls(), usize::try_from(AUTH_LIMIT).unwrap());

    // other addresses keep their own budget
    assert!(svc.authenticate("acme", ip(10)).await.is_ok());
}

#[tokio::test]
async fn exhausted_refresh_budget_leaves_sign_in_open() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(Arc::clone(&verifier));

    for _ in 0..REFRESH_LIMIT {
        let err: WorkspaceAuthError = svc.refresh("garbage", ip(20)).await.unwrap_err().into();
        assert_eq!(err, WorkspaceAuthError::MalformedToken);
    }
    let err: WorkspaceAuthError = svc.refresh("garbage", ip(20)).await.unwrap_err().into();
    assert!(matches!(err, WorkspaceAuthError::RateLimited { .. }));

    assert!(svc.authenticate("acme", ip(20)).await.is_ok());
    assert_eq!(verifier.calls(), 1);
}

#[tokio::test]
async fn exhausted_sign_in_budget_leaves_refresh_open() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);

    let mut last = None;
    for _ in 0..AUTH_LIMIT {
        last = Some(svc.authenticate("acme", ip(21)).await.unwrap());
    }
    assert!(matches!(
        rejection(&svc, "acme", ip(21)).await,
        WorkspaceAuthError::RateLimited { .. }
    ));

    let pair = last.unwrap();
    assert!(svc
        .refresh(pair.refresh_token.expose_secret(), ip(21))
        .await
        .is_ok());
}

#[test]
fn zero_length_window_is_refused() {
    let mut cfg = config();
    cfg.rate_limits.authenticate = WindowLimit {
        limit: 1,
        window_secs: 0,
    };

    let res = Service::new(
        &cfg,
        Collaborators {
            verifier: Arc::new(FakeVerifier::default()),
            mx_resolver: default_resolver(),
            rate_limits: Arc::new(InMemoryRateLimitStore::new()),
            refresh_store: Arc::new(InMemoryRefreshTokenStore::new()),
        },
    );
    assert!(res.is_err());
}

#[tokio::test]
async fn rate_limit_store_failure_fails_closed() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate_with(
        Arc::clone(&verifier),
        default_resolver(),
        Arc::new(BrokenRateLimitStore),
    );

    let err = rejection(&svc, "acme", ip(1)).await;
    assert!(matches!(err, WorkspaceAuthError::RateLimited { .. }));
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn verifier_timeout_fails_closed() {
    let verifier = Arc::new(FakeVerifier {
        delay: Some(Duration::from_secs(30)),
        ..FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true))
    });
    let svc = gate(verifier);

    assert_eq!(
        rejection(&svc, "acme", ip(1)).await,
        WorkspaceAuthError::MalformedToken
    );
}

#[tokio::test(start_paused = true)]
async fn dns_timeout_fails_closed() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate_with(
        verifier,
        Arc::new(SlowResolver),
        Arc::new(InMemoryRateLimitStore::new()),
    );

    assert_eq!(
        rejection(&svc, "acme", ip(1)).await,
        WorkspaceAuthError::NonWorkspaceDomain
    );
}

#[tokio::test]
#[traced_test]
async fn rejections_record_security_events() {
    let verifier = Arc::new(FakeVerifier::default().with("gmail", claims("user@gmail.com", None, true)));
    let svc = gate(verifier);

    let _ = svc.authenticate("gmail", ip(77)).await;

    assert!(logs_contain("decision=\"personal_provider\""));
    assert!(logs_contain("email_domain=\"gmail.com\""));
    assert!(logs_contain("client_ip=192.0.2.77"));
}

#[tokio::test]
#[traced_test]
async fn replay_is_logged_as_theft_signal() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);
    let pair = svc.authenticate("acme", ip(1)).await.unwrap();
    svc.refresh(pair.refresh_token.expose_secret(), ip(1)).await.unwrap();
    let _ = svc.refresh(pair.refresh_token.expose_secret(), ip(1)).await;

    assert!(logs_contain("theft_signal=true"));
    assert!(logs_contain("decision=\"replayed_refresh_token\""));
}

#[tokio::test]
#[traced_test]
async fn logout_events_carry_the_client_ip() {
    let verifier = Arc::new(FakeVerifier::default().with("acme", claims("user@acme.com", Some("acme.com"), true)));
    let svc = gate(verifier);
    let pair = svc.authenticate("acme", ip(1)).await.unwrap();

    svc.logout(pair.refresh_token.expose_secret(), ip(88)).await.unwrap();
    let _ = svc.logout("nonsense", ip(89)).await;

    assert!(logs_contain("decision=\"revoked\""));
    assert!(logs_contain("client_ip=192.0.2.88"));
    assert!(logs_contain("client_ip=192.0.2.89"));
}
