//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::TelemetryConfig;
use crate::error::{AgentError, Result};

pub const TRACING_TARGET_TELEMETRY: &str = "bedrock_agent::telemetry";

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
pub fn build_env_filter(config: &TelemetryConfig) -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    parse_filter(&filter_directives(rust_log.as_deref(), config))
}

fn filter_directives(rust_log: Option<&str>, config: &TelemetryConfig) -> String {
    let directives = rust_log.unwrap_or(&config.log_level);
    format!("{directives},tower_http=info")
}

fn parse_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_tracing(service_name: &str, config: &TelemetryConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_env_filter(config));
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|err| AgentError::Config(format!("failed to install tracing: {err}")))?;

    tracing::debug!(
        target: TRACING_TARGET_TELEMETRY,
        service = service_name,
        json = config.json,
        "tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_level: level.into(),
            json: false,
        }
    }

    #[test]
    fn rust_log_wins_over_configured_level() {
        assert_eq!(
            filter_directives(None, &config("debug")),
            "debug,tower_http=info"
        );
        assert_eq!(
            filter_directives(Some("bedrock_agent=trace"), &config("debug")),
            "bedrock_agent=trace,tower_http=info"
        );
    }

    #[test]
    fn filter_falls_back_to_info_on_garbage() {
        let directives = filter_directives(None, &config("bedrock_agent=loud"));
        assert!(EnvFilter::try_new(&directives).is_err());
        assert_eq!(parse_filter(&directives).to_string(), "info");
    }
}
