use anyhow::Context;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level` when set.
///
/// # Errors
/// Returns an error if the level directive is invalid or a subscriber is already installed.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .with_context(|| format!("invalid logging.level '{}'", cfg.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match cfg.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_timer(UtcTime::rfc_3339()))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_timer(UtcTime::rfc_3339()),
            )
            .try_init(),
    };
    installed.context("failed to initialize tracing subscriber")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_reported() {
        let cfg = LoggingConfig {
            level: "gate_server=verbose".to_owned(),
            format: LogFormat::Json,
        };
        let err = temp_env::with_var_unset("RUST_LOG", || init(&cfg)).unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }
}
