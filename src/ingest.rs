use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::chunker::ChunkerConfig;
use crate::configs::IngestConfig;
use crate::runtime::fetcher::{DocumentSource, SourceDocument};
use crate::runtime::logging::{log_event, log_warnings, LogLevel};
use crate::runtime::sink::ChunkSink;
use crate::sources::usc::parser::parse_usc_bytes;
use crate::types::TitleOutput;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub titles_processed: usize,
    /// `(title number, error)` for every title that failed.
    pub failures: Vec<(String, String)>,
    pub chunk_count: usize,
    pub warning_count: usize,
}

impl IngestSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Parses and chunks one title. CPU-bound; callers on the runtime should run
/// it through `spawn_blocking`.
pub fn build_title_output(
    document_id: &str,
    bytes: &[u8],
    config: &ChunkerConfig,
    title_number: &str,
    accessed_at: &str,
) -> Result<TitleOutput, String> {
    let parsed = parse_usc_bytes(bytes, document_id).map_err(|e| e.to_string())?;
    let chunk_set = parsed.chunk(config).map_err(|e| e.to_string())?;

    let mut warnings = parsed.warnings;
    warnings.extend(chunk_set.warnings);

    let title_number = if parsed.root.designator.is_empty() {
        title_number.to_string()
    } else {
        parsed.root.designator.clone()
    };

    Ok(TitleOutput {
        title_number,
        meta: parsed.meta,
        chunks: chunk_set.chunks,
        notes: parsed.notes,
        cross_references: parsed.cross_references,
        warnings,
        accessed_at: accessed_at.to_string(),
    })
}

async fn process_title(
    source: Arc<dyn DocumentSource>,
    config: ChunkerConfig,
    title_number: String,
) -> Result<TitleOutput, String> {
    tracing::info!("[Ingest] Starting title {}", title_number);

    let SourceDocument {
        document_id,
        bytes,
        accessed_at,
        source_url,
        ..
    } = source.fetch_title(&title_number).await?;

    if let Some(url) = &source_url {
        tracing::debug!("[Ingest] Title {}: fetched {} bytes from {}", title_number, bytes.len(), url);
    }

    let output = {
        let task_document = document_id.clone();
        let task_title = title_number.clone();
        tokio::task::spawn_blocking(move || {
            build_title_output(&task_document, &bytes, &config, &task_title, &accessed_at)
        })
        .await
        .map_err(|e| format!("Title {title_number} task failed: {e}"))??
    };

    log_warnings(&document_id, &output.warnings);
    tracing::info!(
        "[Ingest] Title {}: {} chunks, {} notes, {} references",
        title_number,
        output.chunks.len(),
        output.notes.len(),
        output.cross_references.len()
    );
    Ok(output)
}

/// Fetches, parses, chunks and writes every configured title. A failing title
/// is recorded in the summary and does not stop the others.
pub async fn ingest_titles(
    config: &IngestConfig,
    source: Arc<dyn DocumentSource>,
    sink: Arc<dyn ChunkSink>,
) -> Result<IngestSummary, String> {
    config.chunking.validate().map_err(|e| e.to_string())?;

    let titles = match &config.titles {
        Some(titles) => titles.clone(),
        None => source.list_titles().await?,
    };

    tracing::info!("[Ingest] Starting ingest for {} titles", titles.len());

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for title_number in titles {
        let source = source.clone();
        let chunking = config.chunking.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                // Inner task so a panic is reported against its title.
                Ok(_permit) => {
                    match tokio::spawn(process_title(source, chunking, title_number.clone())).await {
                        Ok(result) => result,
                        Err(e) => Err(format!("Title {title_number} task panicked: {e}")),
                    }
                }
                Err(e) => Err(e.to_string()),
            };
            (title_number, result)
        });
    }

    let mut summary = IngestSummary::default();
    while let Some(joined) = tasks.join_next().await {
        let (title_number, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!("[Ingest] Title task was cancelled: {}", e);
                summary.failures.push((String::new(), e.to_string()));
                continue;
            }
        };

        let written = match result {
            Ok(output) => sink.write_title(&output).await.map(|_| output),
            Err(err) => Err(err),
        };

        match written {
            Ok(output) => {
                summary.titles_processed += 1;
                summary.chunk_count += output.chunks.len();
                summary.warning_count += output.warnings.len();
            }
            Err(err) => {
                tracing::error!("[Ingest] Title {} failed: {}", title_number, err);
                summary.failures.push((title_number, err));
            }
        }
    }

    sink.flush().await?;
    summary.failures.sort();

    log_event(
        if summary.is_success() { LogLevel::Info } else { LogLevel::Error },
        "All titles complete",
        Some(serde_json::json!({
            "processed": summary.titles_processed,
            "failed": summary.failures.len(),
            "chunks": summary.chunk_count,
            "warnings": summary.warning_count,
        })),
    );
    Ok(summary)
}
