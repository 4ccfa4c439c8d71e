//! Structured security events.
//!
//! Every gate decision is emitted as one `tracing` event carrying `event`,
//! `decision`, `email_domain` and `client_ip` fields, so log pipelines can
//! filter on them without parsing messages.

use workspace_auth_sdk::ClientIp;

/// Operation a security event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    Authenticate,
    Refresh,
    Logout,
}

impl SecurityEventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Refresh => "refresh",
            Self::Logout => "logout",
        }
    }
}

/// Severity bucket of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Granted,
    Denied,
    /// Signals likely credential theft (refresh replay).
    Threat,
}

#[derive(Debug, Clone, Copy)]
pub struct SecurityEvent<'a> {
    pub kind: SecurityEventKind,
    pub decision: &'a str,
    pub email_domain: Option<&'a str>,
    pub client_ip: Option<ClientIp>,
    pub severity: Severity,
}

impl<'a> SecurityEvent<'a> {
    #[must_use]
    pub fn granted(kind: SecurityEventKind, decision: &'a str) -> Self {
        Self {
            kind,
            decision,
            email_domain: None,
            client_ip: None,
            severity: Severity::Granted,
        }
    }

    #[must_use]
    pub fn denied(kind: SecurityEventKind, decision: &'a str) -> Self {
        Self {
            severity: Severity::Denied,
            ..Self::granted(kind, decision)
        }
    }

    #[must_use]
    pub fn threat(kind: SecurityEventKind, decision: &'a str) -> Self {
        Self {
            severity: Severity::Threat,
            ..Self::granted(kind, decision)
        }
    }

    #[must_use]
    pub fn domain(mut self, domain: Option<&'a str>) -> Self {
        self.email_domain = domain;
        self
    }

    #[must_use]
    pub fn ip(mut self, ip: ClientIp) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn record(&self) {
        let event = self.kind.as_str();
        let decision = self.decision;
        let email_domain = self.email_domain.unwrap_or("-");
        let client_ip = self
            .client_ip
            .map_or_else(|| "-".to_owned(), |ip| ip.to_string());

        match self.severity {
            Severity::Granted => tracing::info!(
                event,
                decision,
                email_domain,
                client_ip = %client_ip,
                "security event"
            ),
            Severity::Denied => tracing::warn!(
                event,
                decision,
                email_domain,
                client_ip = %client_ip,
                "security event"
            ),
            Severity::Threat => tracing::error!(
                event,
                decision,
                email_domain,
                client_ip = %client_ip,
                theft_signal = true,
                "security event"
            ),
        }
    }
}
