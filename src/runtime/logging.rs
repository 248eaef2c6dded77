use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

use crate::error::ParseWarning;

#[derive(Clone, Copy)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Installs the fmt subscriber, honouring `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn log_event(level: LogLevel, message: &str, context: Option<serde_json::Value>) {
    let context = context.map(|value| value.to_string()).unwrap_or_default();
    match level {
        LogLevel::Debug => tracing::debug!(context = %context, "[Ingest] {}", message),
        LogLevel::Info => tracing::info!(context = %context, "[Ingest] {}", message),
        LogLevel::Warn => tracing::warn!(context = %context, "[Ingest] {}", message),
        LogLevel::Error => tracing::error!(context = %context, "[Ingest] {}", message),
    }
}

/// Logs each warning at debug level and a per-kind summary at warn level.
pub fn log_warnings(document_id: &str, warnings: &[ParseWarning]) {
    if warnings.is_empty() {
        return;
    }

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for warning in warnings {
        *counts.entry(warning.kind.as_str()).or_insert(0) += 1;
        tracing::debug!(
            kind = warning.kind.as_str(),
            canonical_id = warning.canonical_id.as_deref().unwrap_or(""),
            offset = ?warning.offset,
            "[Ingest] {}: {}",
            document_id,
            warning.message
        );
    }

    log_event(
        LogLevel::Warn,
        &format!("{document_id}: {} warnings", warnings.len()),
        Some(serde_json::json!(counts)),
    );
}
