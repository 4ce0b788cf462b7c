//! # Structured Logging Module
//!
//! Environment-aware structured logging for long-running dispatch loops and
//! scan runs. Logs go to the console and to a JSON file under `log/`, one
//! file per process.

use chrono::Utc;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// An explicit `RUST_LOG` overrides the per-environment defaults.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();

        let log_dir = PathBuf::from("log");
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir).expect("Failed to create log directory");
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("bridgesync.{}.{}.{}.log", environment, pid, timestamp);
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(IsTerminal::is_terminal(&std::io::stdout()))
            .with_filter(build_env_filter(&environment));

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(false)
            .json()
            .with_filter(build_env_filter(&environment));

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        // The embedding host may have installed a subscriber already.
        if subscriber.try_init().is_err() {
            tracing::debug!("Tracing subscriber already installed, keeping the existing one");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "🔧 STRUCTURED LOGGING: Initialized with file output"
        );

        // The writer guard must live for the process lifetime.
        std::mem::forget(guard);
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("BRIDGESYNC_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Build the log filter: `RUST_LOG` if set, environment defaults otherwise.
fn build_env_filter(environment: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(environment)))
}

/// Default filter directives per environment. sqlx query logging is noisy at
/// the level the rest of the crate wants, so it gets its own directive.
fn default_directives(environment: &str) -> &'static str {
    match environment {
        "production" => "info,sqlx=warn",
        _ => "debug,sqlx=info",
    }
}
