//! Layered application configuration.
//!
//! Sources, later ones override earlier ones:
//! 1. built-in defaults of each section
//! 2. YAML file given with `--config`
//! 3. environment variables prefixed with `GATE__`, `__` separating keys,
//!    e.g. `GATE__WORKSPACE_AUTH__CLIENT_ID` or `GATE__GATEWAY__BIND_ADDR`

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use api_gateway::ApiGatewayConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use workspace_auth::WorkspaceAuthConfig;

pub const ENV_PREFIX: &str = "GATE__";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: ApiGatewayConfig,
    pub workspace_auth: WorkspaceAuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Background purge of expired rate-limit windows and refresh families.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaintenanceConfig {
    pub sweep_interval_secs: u64,
}

impl MaintenanceConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Sources of the configuration, for callers that want to inspect them.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, a value has the wrong
    /// shape, a required key is missing, or a value fails validation.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let cfg: Self = Self::figment(path)
            .extract()
            .context("failed to load configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.workspace_auth.client_id.trim().is_empty() {
            anyhow::bail!("workspace_auth.client_id must not be empty");
        }
        if self.maintenance.sweep_interval_secs == 0 {
            anyhow::bail!("maintenance.sweep_interval_secs must be greater than zero");
        }
        self.workspace_auth
            .validate()
            .context("invalid workspace_auth configuration")?;
        let user_limit = &self.gateway.defaults.user_rate_limit;
        if user_limit.enabled && user_limit.limit == 0 {
            anyhow::bail!("gateway.defaults.user_rate_limit.limit must be greater than zero");
        }
        if user_limit.enabled && user_limit.window_secs == 0 {
            anyhow::bail!("gateway.defaults.user_rate_limit.window_secs must be greater than zero");
        }
        Ok(())
    }
}
