//! Pure eligibility rules: email domain extraction, personal-provider denylist,
//! hosted-domain consistency and workspace MX matching.
//!
//! Nothing here performs I/O. The service decides when DNS is consulted.

use std::collections::HashSet;

use workspace_auth_sdk::{EligibilityDecision, IdentityClaims};

/// Static part of the eligibility evaluation.
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    personal_domains: HashSet<String>,
    workspace_mx_hosts: HashSet<String>,
}

impl EligibilityPolicy {
    pub fn new<P, M>(personal_domains: P, workspace_mx_hosts: M) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        Self {
            personal_domains: personal_domains
                .into_iter()
                .map(|d| normalize_host(d.as_ref()))
                .filter(|d| !d.is_empty())
                .collect(),
            workspace_mx_hosts: workspace_mx_hosts
                .into_iter()
                .map(|h| normalize_host(h.as_ref()))
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// `true` for a denylisted domain or any subdomain of one.
    #[must_use]
    pub fn is_personal_provider(&self, domain: &str) -> bool {
        let domain = normalize_host(domain);
        let mut candidate = domain.as_str();
        loop {
            if self.personal_domains.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return false,
            }
        }
    }

    /// Claim checks that need no I/O, in order: email shape, denylist, `hd`.
    ///
    /// `Accepted` here only means the domain may go on to the MX check.
    #[must_use]
    pub fn evaluate_claims(&self, claims: &IdentityClaims) -> EligibilityDecision {
        let Some(email) = claims.email.as_deref() else {
            return EligibilityDecision::RejectedMalformedToken;
        };
        let Some(domain) = email_domain(email) else {
            return EligibilityDecision::RejectedMalformedToken;
        };

        if self.is_personal_provider(&domain) {
            return EligibilityDecision::RejectedPersonalProvider;
        }

        if let Some(hd) = claims.hosted_domain.as_deref()
            && normalize_host(hd) != domain
        {
            return EligibilityDecision::RejectedClaimMismatch;
        }

        EligibilityDecision::Accepted {
            email: email.trim().to_owned(),
            domain,
        }
    }

    /// `true` if any exchange host is in the workspace MX set.
    pub fn matches_workspace_mx<I>(&self, exchanges: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        exchanges
            .into_iter()
            .any(|h| self.workspace_mx_hosts.contains(&normalize_host(h.as_ref())))
    }
}

/// Lowercased domain part of `email`, `None` unless it has exactly one `@`
/// and a dotted, non-empty domain.
#[must_use]
pub fn email_domain(email: &str) -> Option<String> {
    let email = email.trim();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let domain = normalize_host(domain);
    let valid = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.contains("..")
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    valid.then_some(domain)
}

/// Lowercase and strip the trailing root dot.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
