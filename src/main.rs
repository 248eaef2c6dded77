use std::sync::Arc;
use usc_ingest::configs::{IngestConfig, SourceConfig};
use usc_ingest::ingest::ingest_titles;
use usc_ingest::runtime::fetcher::{DirectoryDocumentSource, DocumentSource, HttpDocumentSource, HttpFetcher};
use usc_ingest::runtime::logging::init_logging;
use usc_ingest::runtime::sink::JsonlSink;

#[tokio::main]
async fn main() {
    init_logging();

    let Some(config_path) = std::env::args().nth(1) else {
        eprintln!("Usage: usc-ingest <config.json>");
        std::process::exit(2);
    };

    let mut config = match IngestConfig::load_from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("[Ingest] {}", err);
            std::process::exit(2);
        }
    };
    if let Err(err) = config.apply_env_overrides() {
        tracing::error!("[Ingest] Invalid configuration: {}", err);
        std::process::exit(2);
    }

    let source: Arc<dyn DocumentSource> = match &config.source {
        SourceConfig::Directory { path } => Arc::new(DirectoryDocumentSource::new(path.clone())),
        SourceConfig::Download { catalog_url } => {
            let fetcher = Arc::new(HttpFetcher::new(reqwest::Client::new()));
            Arc::new(HttpDocumentSource::new(fetcher, Some(catalog_url.clone())))
        }
    };
    let sink = Arc::new(JsonlSink::new(config.output_dir.clone()));

    match ingest_titles(&config, source, sink).await {
        Ok(summary) => {
            tracing::info!(
                "[Ingest] Wrote {} chunks for {} titles to {} ({} warnings)",
                summary.chunk_count,
                summary.titles_processed,
                config.output_dir.display(),
                summary.warning_count
            );
            for (title, err) in &summary.failures {
                tracing::error!("[Ingest] Title {} failed: {}", title, err);
            }
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            tracing::error!("[Ingest] Ingest failed: {}", err);
            std::process::exit(1);
        }
    }
}
