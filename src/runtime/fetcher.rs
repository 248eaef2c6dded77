use async_trait::async_trait;
use reqwest::Client;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::sources::usc::discover::{discover_usc_titles, TitleCatalog, USC_DOWNLOAD_PAGE_URL};

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, String>;

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, String> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "usc-ingest/1.0")
            .send()
            .await
            .map_err(|e| format!("Network error fetching {url}: {e}"))?;

        if !response.status().is_success() {
            return Err(format!(
                "HTTP error {} fetching {url}",
                response.status().as_u16()
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| format!("Error reading response body from {url}: {e}"))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        self.get(url)
            .await?
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| format!("Error reading response body from {url}: {e}"))
    }
}

/// Raw markup for one title, as handed to the parser.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub title_number: String,
    pub document_id: String,
    pub source_url: Option<String>,
    pub bytes: Vec<u8>,
    pub accessed_at: String,
}

/// Supplies raw title markup. Retries and caching belong to implementations.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_titles(&self) -> Result<Vec<String>, String>;

    async fn fetch_title(&self, title_number: &str) -> Result<SourceDocument, String>;
}

/// Two-digit zero-padded file stem used by the official downloads (`usc05A`).
pub fn title_document_id(title_number: &str) -> String {
    let digits: String = title_number.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix = &title_number[digits.len()..];
    match digits.parse::<u32>() {
        Ok(n) => format!("usc{n:02}{suffix}"),
        Err(_) => format!("usc{title_number}"),
    }
}

/// Reads `uscNN.xml` files from a local directory.
pub struct DirectoryDocumentSource {
    dir: PathBuf,
}

impl DirectoryDocumentSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DocumentSource for DirectoryDocumentSource {
    async fn list_titles(&self) -> Result<Vec<String>, String> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", self.dir.display()))?;

        let mut titles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read {}: {e}", self.dir.display()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(".xml") else {
                continue;
            };
            if let Some(title) = stem.strip_prefix("usc") {
                titles.push(crate::sources::common::strip_leading_zeros(title));
            }
        }
        titles.sort_by_key(|title| crate::sources::usc::discover::title_sort_key(title));
        Ok(titles)
    }

    async fn fetch_title(&self, title_number: &str) -> Result<SourceDocument, String> {
        let document_id = title_document_id(title_number);
        let path = self.dir.join(format!("{document_id}.xml"));
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        Ok(SourceDocument {
            title_number: title_number.to_string(),
            document_id,
            source_url: None,
            bytes,
            accessed_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Downloads title zips listed on the uscode.house.gov download page.
pub struct HttpDocumentSource {
    fetcher: Arc<dyn Fetcher>,
    catalog_url: String,
    catalog: OnceCell<TitleCatalog>,
}

impl HttpDocumentSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, catalog_url: Option<String>) -> Self {
        Self {
            fetcher,
            catalog_url: catalog_url.unwrap_or_else(|| USC_DOWNLOAD_PAGE_URL.to_string()),
            catalog: OnceCell::new(),
        }
    }

    pub async fn catalog(&self) -> Result<&TitleCatalog, String> {
        self.catalog
            .get_or_try_init(|| discover_usc_titles(self.fetcher.as_ref(), &self.catalog_url))
            .await
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn list_titles(&self) -> Result<Vec<String>, String> {
        Ok(self
            .catalog()
            .await?
            .titles
            .iter()
            .map(|title| title.title_number.clone())
            .collect())
    }

    async fn fetch_title(&self, title_number: &str) -> Result<SourceDocument, String> {
        let catalog = self.catalog().await?;
        let title = catalog
            .titles
            .iter()
            .find(|title| title.title_number == title_number)
            .ok_or_else(|| {
                format!(
                    "Title {title_number} is not listed in release point {}",
                    catalog.release_point
                )
            })?;

        let archive = self.fetcher.fetch_bytes(&title.url).await?;
        if archive.starts_with(b"<") {
            return Err(format!(
                "Got an HTML response instead of a zip archive for {}",
                title.url
            ));
        }
        let bytes = extract_xml_from_zip(&archive)
            .map_err(|e| format!("Title {title_number} ({}): {e}", title.url))?;

        Ok(SourceDocument {
            title_number: title_number.to_string(),
            document_id: title_document_id(title_number),
            source_url: Some(title.url.clone()),
            bytes,
            accessed_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Returns the first `.xml` member of a zip archive.
pub fn extract_xml_from_zip(archive: &[u8]) -> Result<Vec<u8>, String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| format!("Failed to open zip archive: {e}"))?;

    for index in 0..zip.len() {
        let mut file = zip
            .by_index(index)
            .map_err(|e| format!("Failed to read zip entry {index}: {e}"))?;
        if !file.name().to_ascii_lowercase().ends_with(".xml") {
            continue;
        }
        let mut out = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut out)
            .map_err(|e| format!("Failed to extract {}: {e}", file.name()))?;
        return Ok(out);
    }
    Err("No XML file found in zip archive".to_string())
}
