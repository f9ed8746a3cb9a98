//! # Structured Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem. Engine
//! diagnostics go to stderr so they never mix with the job output written to
//! stdout by the command-line front end.

use crate::constants::env;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format of engine diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `TEKTON_RUN_LOG_FORMAT=json` selects JSON, anything else the console format
    pub fn from_env() -> Self {
        match std::env::var(env::LOG_FORMAT).as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize structured logging. Safe to call more than once; only the first call
/// installs a subscriber and an already-installed global subscriber is kept.
pub fn init_structured_logging(format: LogFormat) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = match format {
            LogFormat::Json => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            format = ?format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Current environment name
fn get_environment() -> String {
    std::env::var(env::ENVIRONMENT).unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive for an environment, used when `RUST_LOG` is unset
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "tekton_run=info,warn".to_string(),
        "test" => "tekton_run=debug,warn".to_string(),
        _ => "tekton_run=debug,info".to_string(),
    }
}
