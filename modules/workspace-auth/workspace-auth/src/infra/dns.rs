//! MX resolvers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use workspace_auth_sdk::{DnsLookupError, MxResolver};

use crate::domain::eligibility::normalize_host;

/// MX lookups through the system resolver configuration, falling back to
/// the resolver library's public defaults when none can be read.
pub struct HickoryMxResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryMxResolver {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::warn!(error = %e, "system resolver config unavailable, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl MxResolver for HickoryMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, DnsLookupError> {
        // fully qualified, so search domains are never appended
        let fqdn = format!("{}.", normalize_host(domain));
        match self.resolver.mx_lookup(fqdn).await {
            Ok(lookup) => {
                let hosts: Vec<String> = lookup
                    .iter()
                    .map(|mx| normalize_host(&mx.exchange().to_ascii()))
                    .collect();
                if hosts.is_empty() {
                    Err(DnsLookupError::NoRecords)
                } else {
                    Ok(hosts)
                }
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Err(DnsLookupError::NoRecords),
                ResolveErrorKind::Timeout => Err(DnsLookupError::Timeout),
                _ => Err(DnsLookupError::Resolution(e.to_string())),
            },
        }
    }
}

/// Fixed MX answers for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMxResolver {
    records: HashMap<String, Vec<String>>,
}

impl StaticMxResolver {
    pub fn new<I, D, H>(records: I) -> Self
    where
        I: IntoIterator<Item = (D, Vec<H>)>,
        D: AsRef<str>,
        H: AsRef<str>,
    {
        Self {
            records: records
                .into_iter()
                .map(|(domain, hosts)| {
                    (
                        normalize_host(domain.as_ref()),
                        hosts.iter().map(|h| normalize_host(h.as_ref())).collect(),
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl MxResolver for StaticMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, DnsLookupError> {
        match self.records.get(&normalize_host(domain)) {
            Some(hosts) if !hosts.is_empty() => Ok(hosts.clone()),
            _ => Err(DnsLookupError::NoRecords),
        }
    }
}
