use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::runtime::fetcher::title_document_id;
use crate::types::TitleOutput;

/// Receives the finished output of each title.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn write_title(&self, output: &TitleOutput) -> Result<(), String>;

    async fn flush(&self) -> Result<(), String>;
}

/// Writes `<uscNN>.chunks.jsonl` (one chunk per line) and `<uscNN>.meta.json`
/// (metadata, notes, references, warnings) per title.
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn chunks_path(&self, title_number: &str) -> PathBuf {
        self.dir
            .join(format!("{}.chunks.jsonl", title_document_id(title_number)))
    }

    pub fn meta_path(&self, title_number: &str) -> PathBuf {
        self.dir
            .join(format!("{}.meta.json", title_document_id(title_number)))
    }
}

#[async_trait]
impl ChunkSink for JsonlSink {
    async fn write_title(&self, output: &TitleOutput) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", self.dir.display()))?;

        let chunks_path = self.chunks_path(&output.title_number);
        let mut lines = Vec::new();
        for chunk in &output.chunks {
            serde_json::to_writer(&mut lines, chunk)
                .map_err(|e| format!("Failed to serialize chunk {}: {e}", chunk.chunk_id))?;
            lines.push(b'\n');
        }
        let mut file = tokio::fs::File::create(&chunks_path)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", chunks_path.display()))?;
        file.write_all(&lines)
            .await
            .map_err(|e| format!("Failed to write {}: {e}", chunks_path.display()))?;
        file.flush()
            .await
            .map_err(|e| format!("Failed to write {}: {e}", chunks_path.display()))?;

        let meta_path = self.meta_path(&output.title_number);
        let meta = json!({
            "titleNumber": output.title_number,
            "meta": output.meta,
            "accessedAt": output.accessed_at,
            "chunkCount": output.chunks.len(),
            "notes": output.notes,
            "crossReferences": output.cross_references,
            "warnings": output.warnings,
        });
        let body = serde_json::to_vec_pretty(&meta)
            .map_err(|e| format!("Failed to serialize metadata for title {}: {e}", output.title_number))?;
        tokio::fs::write(&meta_path, body)
            .await
            .map_err(|e| format!("Failed to write {}: {e}", meta_path.display()))
    }

    async fn flush(&self) -> Result<(), String> {
        Ok(())
    }
}
