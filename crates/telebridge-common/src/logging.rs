//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Tracing bootstrap for the bridge daemon and producer tools."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Bridge-specific filter variable, consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "TELEBRIDGE_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// Non-blocking writers flush on drop; the guards live for the process.
static GUARDS: OnceCell<Vec<WorkerGuard>> = OnceCell::new();

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Resolve the filter directive: `TELEBRIDGE_LOG`, then `RUST_LOG`, then `info`.
///
/// An unparsable directive falls back to the default with a note on stderr,
/// since the subscriber that would report it is not installed yet.
fn resolve_directive<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let (source, directive) = match lookup(LOG_ENV) {
        Some(directive) => (LOG_ENV, directive),
        None => match lookup(EnvFilter::DEFAULT_ENV) {
            Some(directive) => (EnvFilter::DEFAULT_ENV, directive),
            None => return DEFAULT_DIRECTIVE.to_owned(),
        },
    };
    match EnvFilter::try_new(&directive) {
        Ok(_) => directive,
        Err(err) => {
            eprintln!(
                "invalid {source} directive {directive:?} ({err}); using {DEFAULT_DIRECTIVE}"
            );
            DEFAULT_DIRECTIVE.to_owned()
        }
    }
}

fn env_filter() -> EnvFilter {
    let directive = resolve_directive(|name| std::env::var(name).ok());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn console_layer(format: LogFormat) -> (BoxedLayer, WorkerGuard) {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    let layer = match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    };
    (layer, guard)
}

/// Install the daemon subscriber: a console layer on stderr in the configured
/// format plus a daily rolling JSON file under `config.directory`.
///
/// Stdout is left untouched; it carries the envelope reports.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("creating log directory {}", config.directory.display())
    })?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, format!("{prefix}.log")));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();
    let (console, console_guard) = console_layer(config.format);

    let _ = GUARDS.set(vec![file_guard, console_guard]);

    // A second call (tests, embedding) keeps the first subscriber.
    tracing_subscriber::registry()
        .with(vec![console, file_layer])
        .with(env_filter())
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

/// Console-only subscriber for short-lived tools that should not leave log files behind.
pub fn init_console() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .try_init();
}
