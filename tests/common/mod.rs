#![allow(dead_code)]
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use usc_ingest::runtime::fetcher::{title_document_id, DocumentSource, Fetcher, SourceDocument};
use usc_ingest::runtime::sink::ChunkSink;
use usc_ingest::sources::usc::parser::{parse_usc_xml, ParseResult};
use usc_ingest::types::TitleOutput;

pub fn fixtures_dir() -> String {
    format!("{}/tests/fixtures", env!("CARGO_MANIFEST_DIR"))
}

pub fn load_fixture(filename: &str) -> String {
    let path = Path::new(&fixtures_dir()).join(filename);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

/// The Title 26 excerpt, parsed with ids assigned.
pub fn parse_excerpt() -> ParseResult {
    let xml = load_fixture("usc26_excerpt.xml");
    parse_usc_xml(&xml, "usc26").expect("fixture should parse")
}

/// Minimal USLM document wrapping `body` inside title `title`.
pub fn uslm_document(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<uscDoc xmlns="http://xml.house.gov/schemas/uslm/1.0" identifier="/us/usc/t{title}">
  <main>
    <title identifier="/us/usc/t{title}">
      <num value="{title}">Title {title}—</num>
      <heading>TEST TITLE</heading>
      {body}
    </title>
  </main>
</uscDoc>"#
    )
}

pub struct MockFetcher {
    pub fixtures: HashMap<String, String>,
    pub binary_fixtures: HashMap<String, Vec<u8>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            fixtures: HashMap::new(),
            binary_fixtures: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn add_fixture(&mut self, url: &str, content: &str) {
        self.fixtures.insert(url.to_string(), content.to_string());
    }

    pub fn add_binary_fixture(&mut self, url: &str, content: Vec<u8>) {
        self.binary_fixtures.insert(url.to_string(), content);
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.fixtures
            .get(url)
            .cloned()
            .ok_or_else(|| format!("MockFetcher: No fixture for URL: {}", url))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.binary_fixtures
            .get(url)
            .cloned()
            .ok_or_else(|| format!("MockFetcher: No fixture for URL: {}", url))
    }
}

/// In-memory titles keyed by title number.
pub struct MockSource {
    pub titles: HashMap<String, Vec<u8>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            titles: HashMap::new(),
        }
    }

    pub fn with_title(mut self, title_number: &str, xml: &str) -> Self {
        self.titles
            .insert(title_number.to_string(), xml.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl DocumentSource for MockSource {
    async fn list_titles(&self) -> Result<Vec<String>, String> {
        let mut titles: Vec<String> = self.titles.keys().cloned().collect();
        titles.sort();
        Ok(titles)
    }

    async fn fetch_title(&self, title_number: &str) -> Result<SourceDocument, String> {
        let bytes = self
            .titles
            .get(title_number)
            .cloned()
            .ok_or_else(|| format!("MockSource: No title {}", title_number))?;
        Ok(SourceDocument {
            title_number: title_number.to_string(),
            document_id: title_document_id(title_number),
            source_url: None,
            bytes,
            accessed_at: "2024-01-01T00:00:00+00:00".to_string(),
        })
    }
}

/// Wraps a `MockSource` and panics while fetching one title.
pub struct PanickingSource {
    pub inner: MockSource,
    pub panic_on: String,
}

#[async_trait]
impl DocumentSource for PanickingSource {
    async fn list_titles(&self) -> Result<Vec<String>, String> {
        self.inner.list_titles().await
    }

    async fn fetch_title(&self, title_number: &str) -> Result<SourceDocument, String> {
        if title_number == self.panic_on {
            panic!("source blew up on title {}", title_number);
        }
        self.inner.fetch_title(title_number).await
    }
}

#[derive(Clone)]
pub struct CaptureSink {
    pub outputs: Arc<Mutex<Vec<TitleOutput>>>,
    pub flushed: Arc<Mutex<bool>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            outputs: Arc::new(Mutex::new(Vec::new())),
            flushed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn outputs(&self) -> Vec<TitleOutput> {
        self.outputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChunkSink for CaptureSink {
    async fn write_title(&self, output: &TitleOutput) -> Result<(), String> {
        self.outputs.lock().unwrap().push(output.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), String> {
        *self.flushed.lock().unwrap() = true;
        Ok(())
    }
}
