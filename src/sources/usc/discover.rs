use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::runtime::fetcher::Fetcher;

pub const USC_DOWNLOAD_PAGE_URL: &str = "https://uscode.house.gov/download/download.shtml";

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap());
static XML_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)xml_usc(\d{2}[a-z]?)@").unwrap());
static RELEASE_POINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@(\d+-[^./?#\s]+)").unwrap());
static TITLE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([a-zA-Z]?)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleDownload {
    pub title_number: String,
    pub url: String,
}

/// Title zips of one release point, sorted by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleCatalog {
    pub release_point: String,
    pub titles: Vec<TitleDownload>,
}

pub fn title_sort_key(title_num: &str) -> (i32, String) {
    if let Some(caps) = TITLE_NUMBER_RE.captures(title_num) {
        let n: i32 = caps[1].parse().unwrap_or(0);
        let suffix = caps[2].to_lowercase();
        (n, suffix)
    } else {
        (0, title_num.to_string())
    }
}

pub async fn discover_usc_titles(fetcher: &dyn Fetcher, page_url: &str) -> Result<TitleCatalog, String> {
    let html = fetcher
        .fetch(page_url)
        .await
        .map_err(|e| format!("Failed to fetch USC download page: {e}"))?;
    parse_download_page(&html, page_url)
}

/// Extracts the per-title XML zip links from the download page HTML.
pub fn parse_download_page(html: &str, page_url: &str) -> Result<TitleCatalog, String> {
    let base = Url::parse(page_url).map_err(|e| format!("Invalid download page URL {page_url}: {e}"))?;

    let mut by_title: HashMap<String, String> = HashMap::new();
    let mut release_points = HashSet::new();

    for caps in HREF_RE.captures_iter(html) {
        let href = &caps[1];
        let Ok(url) = base.join(href) else {
            continue;
        };
        let url = url.to_string();

        if let Some(caps) = XML_LINK_RE.captures(&url) {
            let title_num = caps[1].trim_start_matches('0').to_string();
            let title_num = if title_num.is_empty() {
                "0".to_string()
            } else {
                title_num
            };
            by_title.entry(title_num).or_insert_with(|| url.clone());

            if let Some(rp_caps) = RELEASE_POINT_RE.captures(&url) {
                release_points.insert(rp_caps[1].to_string());
            }
        }
    }

    if by_title.is_empty() {
        return Err("Found no titles on USC download page.".to_string());
    }
    if release_points.len() > 1 {
        let mut found: Vec<_> = release_points.into_iter().collect();
        found.sort();
        return Err(format!(
            "Found multiple USC release points in one crawl: {}",
            found.join(", ")
        ));
    }
    let Some(release_point) = release_points.into_iter().next() else {
        return Err("Failed to determine USC release point from title URLs.".to_string());
    };

    let mut titles: Vec<TitleDownload> = by_title
        .into_iter()
        .map(|(title_number, url)| TitleDownload { title_number, url })
        .collect();
    titles.sort_by_key(|title| title_sort_key(&title.title_number));

    Ok(TitleCatalog {
        release_point,
        titles,
    })
}
