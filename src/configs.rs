use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkerConfig;
use crate::sources::usc::discover::USC_DOWNLOAD_PAGE_URL;

fn default_catalog_url() -> String {
    USC_DOWNLOAD_PAGE_URL.to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceConfig {
    /// Local `uscNN.xml` files.
    Directory { path: PathBuf },
    /// Title zips from the uscode.house.gov download page.
    #[serde(rename_all = "camelCase")]
    Download {
        #[serde(default = "default_catalog_url")]
        catalog_url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    pub source: SourceConfig,
    /// Title numbers to process; every title the source offers when absent.
    #[serde(default)]
    pub titles: Option<Vec<String>>,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl IngestConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let config: IngestConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Applies `CHUNK_STRATEGY`, `MAX_TOKENS_PER_CHUNK`, `CHUNK_OVERLAP` and
    /// `USC_DATA_DIR` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(strategy) = lookup("CHUNK_STRATEGY") {
            self.chunking.strategy = strategy.parse()?;
        }
        if let Some(max) = lookup("MAX_TOKENS_PER_CHUNK") {
            self.chunking.max_tokens_per_chunk = max
                .trim()
                .parse()
                .map_err(|e| format!("Invalid MAX_TOKENS_PER_CHUNK {max:?}: {e}"))?;
        }
        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            self.chunking.overlap_tokens = overlap
                .trim()
                .parse()
                .map_err(|e| format!("Invalid CHUNK_OVERLAP {overlap:?}: {e}"))?;
        }
        if let Some(dir) = lookup("USC_DATA_DIR") {
            self.source = SourceConfig::Directory {
                path: PathBuf::from(dir),
            };
        }
        self.chunking.validate().map_err(|e| e.to_string())
    }
}
