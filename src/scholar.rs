//! Google Scholar result-page scraper
//!
//! Walks `nb_pages` result pages (10 hits each) for a query, optionally pinned
//! to one publication year, and resolves every hit's DOI through Crossref.
//! There is no official API; markup selectors follow the public HTML:
//! `div.gs_ri` per hit, `h3.gs_rt` for the title, first anchor for the link.

use crate::crossref::CrossrefClient;
use crate::http::{build_client, HttpOptions};
use crate::papers::ManifestEntry;
use reqwest::Client;
use scraper::{Html, Selector};

pub const SCHOLAR_BASE_URL: &str = "https://scholar.google.com";
pub const RESULTS_PER_PAGE: u32 = 10;

const SCHOLAR_HEADERS: &[(&str, &str)] = &[
    ("Referer", "https://www.google.com/"),
    ("Upgrade-Insecure-Requests", "1"),
];

/// Title and link of one result block, before DOI resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ScholarHit {
    pub title: String,
    pub link: String,
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("Invalid selector {}: {:?}", css, e))
}

/// Extract valid hits from one result page. Blocks without a title or an
/// absolute http(s) link are reported and skipped.
pub fn parse_results_page(html: &str) -> Result<Vec<ScholarHit>, String> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.gs_ri")?;
    let title_sel = selector("h3.gs_rt")?;
    let link_sel = selector("a")?;

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        let title = result
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());
        let link = result
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        match (title, link) {
            (Some(title), Some(link)) if link.starts_with("http") => {
                hits.push(ScholarHit { title, link });
            }
            (title, link) => {
                println!("[Scholar] Skipping invalid entry: Title: {:?}, Link: {:?}", title, link);
            }
        }
    }

    Ok(hits)
}

/// Result page URL for a 0-based page index
pub fn results_page_url(base_url: &str, query: &str, year: Option<i32>, page_index: u32) -> String {
    let mut url = format!(
        "{}/scholar?q={}&hl=en&start={}",
        base_url,
        urlencoding::encode(query),
        page_index * RESULTS_PER_PAGE
    );
    if let Some(y) = year {
        url.push_str(&format!("&as_ylo={}&as_yhi={}", y, y));
    }
    url
}

pub struct ScholarClient {
    client: Client,
    base_url: String,
    crossref: CrossrefClient,
}

impl ScholarClient {
    pub fn new(options: &HttpOptions, crossref: CrossrefClient) -> Result<Self, String> {
        Ok(Self {
            client: build_client(options, SCHOLAR_HEADERS)?,
            base_url: SCHOLAR_BASE_URL.to_string(),
            crossref,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch one result page. HTTP failures abort the whole search.
    async fn fetch_page(&self, query: &str, year: Option<i32>, page_index: u32) -> Result<Vec<ScholarHit>, String> {
        let url = results_page_url(&self.base_url, query, year, page_index);

        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Scholar returned status {} for {}", response.status(), url));
        }

        let html = response
            .text()
            .await
            .map_err(|e| format!("Failed to read Scholar page: {}", e))?;

        parse_results_page(&html)
    }

    /// Search `nb_pages` pages and resolve a DOI for every valid hit
    pub async fn search(&self, query: &str, year: Option<i32>, nb_pages: u32) -> Result<Vec<ManifestEntry>, String> {
        println!("[Scholar] Searching: \"{}\"{}", query,
            year.map(|y| format!(" (year {})", y)).unwrap_or_default());

        let mut entries = Vec::new();

        for page_index in 0..nb_pages {
            let hits = self.fetch_page(query, year, page_index).await?;
            println!("[Scholar]   Page {}: {} results", page_index + 1, hits.len());

            for hit in hits {
                let doi = match self.crossref.lookup_doi(&hit.title).await {
                    Ok(doi) => doi,
                    Err(e) => {
                        eprintln!("[Scholar] Error fetching DOI for title '{}': {}", hit.title, e);
                        None
                    }
                };

                entries.push(ManifestEntry {
                    title: hit.title,
                    link: hit.link,
                    doi,
                });
            }
        }

        println!("[Scholar]   Collected {} articles", entries.len());
        Ok(entries)
    }
}
