//! DOI-based PDF downloader
//!
//! Fetches `{mirror}/pdf/{doi}.pdf` with browser headers, refuses files above
//! the size cap and waits a fixed delay after each request to stay clear of
//! HTTP 429 responses.

use super::{load_manifest, DownloadStats, ManifestEntry};
use crate::http::{build_client, HttpOptions};
use reqwest::Client;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MIRROR: &str = "https://sci.bban.top";
pub const DEFAULT_MAX_SIZE_MB: u32 = 5;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(5);

const BYTES_PER_MB: u64 = 1_048_576;

const MIRROR_HEADERS: &[(&str, &str)] = &[
    ("Referer", "https://www.wellesu.com/"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-CH-UA", "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
    ("Sec-CH-UA-Mobile", "?0"),
    ("Sec-CH-UA-Platform", "Windows"),
];

/// What happened to one DOI
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    TooLarge { size_mb: f64 },
    HttpStatus(u16),
    NotPdf,
    Failed(String),
}

/// Turn a DOI into a file-system safe stem (`.`, `/`, `-` become `_`)
pub fn doi_to_filename(doi: &str) -> String {
    doi.chars()
        .map(|c| if matches!(c, '.' | '/' | '-') { '_' } else { c })
        .collect()
}

pub struct PdfDownloader {
    client: Client,
    mirror: String,
    max_size_mb: u32,
    delay: Duration,
}

impl PdfDownloader {
    pub fn new(options: &HttpOptions) -> Result<Self, String> {
        Ok(Self {
            client: build_client(options, MIRROR_HEADERS)?,
            mirror: DEFAULT_MIRROR.to_string(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            delay: DEFAULT_REQUEST_DELAY,
        })
    }

    pub fn with_mirror(mut self, mirror: &str) -> Self {
        self.mirror = mirror.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_size_mb(mut self, max_size_mb: u32) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn pdf_url(&self, doi: &str) -> String {
        format!("{}/pdf/{}.pdf", self.mirror, doi)
    }

    /// Download one article into `output_dir`. Errors are reported, never raised.
    pub async fn download(&self, doi: &str, output_dir: &Path) -> DownloadOutcome {
        match self.try_download(doi, output_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("[Download] An error occurred for {}: {}", doi, e);
                DownloadOutcome::Failed(e)
            }
        }
    }

    async fn try_download(&self, doi: &str, output_dir: &Path) -> Result<DownloadOutcome, String> {
        fs::create_dir_all(output_dir)
            .map_err(|e| format!("Failed to create {}: {}", output_dir.display(), e))?;

        let url = self.pdf_url(doi);
        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        if !response.status().is_success() {
            println!("[Download] Failed to download the PDF. Status code: {}", response.status().as_u16());
            return Ok(DownloadOutcome::HttpStatus(response.status().as_u16()));
        }

        let max_bytes = self.max_size_mb as u64 * BYTES_PER_MB;

        // Check content-length header first
        if let Some(content_length) = response.content_length() {
            if content_length > max_bytes {
                let size_mb = content_length as f64 / BYTES_PER_MB as f64;
                println!("[Download] File size {:.2} MB exceeds the maximum allowed size of {} MB. Download aborted.",
                    size_mb, self.max_size_mb);
                return Ok(DownloadOutcome::TooLarge { size_mb });
            }
        }

        let raw_bytes = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read PDF bytes: {}", e))?;

        // Handle gzip-compressed responses
        let bytes: Vec<u8> = if raw_bytes.starts_with(&[0x1f, 0x8b]) {
            let mut decoder = flate2::read::GzDecoder::new(&raw_bytes[..]);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| format!("Gzip decompression failed: {}", e))?;
            decompressed
        } else {
            raw_bytes.to_vec()
        };

        if bytes.len() as u64 > max_bytes {
            let size_mb = bytes.len() as f64 / BYTES_PER_MB as f64;
            println!("[Download] File size {:.2} MB exceeds the maximum allowed size of {} MB. Download aborted.",
                size_mb, self.max_size_mb);
            return Ok(DownloadOutcome::TooLarge { size_mb });
        }

        if !bytes.starts_with(b"%PDF") {
            println!("[Download] {} did not return a PDF ({} bytes)", url, bytes.len());
            return Ok(DownloadOutcome::NotPdf);
        }

        let output_file = output_dir.join(format!("{}.pdf", doi_to_filename(doi)));
        fs::write(&output_file, &bytes)
            .map_err(|e| format!("Failed to write {}: {}", output_file.display(), e))?;

        println!("[Download] Saved {} ({} KB)", output_file.display(), bytes.len() / 1024);
        Ok(DownloadOutcome::Saved(output_file))
    }

    /// Download every entry that has a DOI, pausing after each request
    pub async fn download_entries(&self, entries: &[ManifestEntry], output_dir: &Path) -> DownloadStats {
        let mut stats = DownloadStats::default();

        for entry in entries {
            let doi = match entry.doi.as_deref().filter(|d| !d.is_empty()) {
                Some(doi) => doi,
                None => {
                    println!("[Download] Skipping article without DOI: {}", entry.title);
                    stats.skipped_no_doi += 1;
                    continue;
                }
            };

            println!("[Download] Downloading article with DOI: {}", doi);
            match self.download(doi, output_dir).await {
                DownloadOutcome::Saved(_) => stats.downloaded += 1,
                DownloadOutcome::TooLarge { .. } => stats.too_large += 1,
                DownloadOutcome::HttpStatus(_) | DownloadOutcome::NotPdf | DownloadOutcome::Failed(_) => {
                    stats.failed += 1
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        stats
    }

    /// Load a manifest file and download its entries
    pub async fn download_from_manifest(&self, manifest: &Path, output_dir: &Path) -> Result<DownloadStats, String> {
        let entries = load_manifest(manifest)?;
        Ok(self.download_entries(&entries, output_dir).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, MockResponse};

    fn downloader(mirror: &str) -> PdfDownloader {
        PdfDownloader::new(&HttpOptions::default())
            .unwrap()
            .with_mirror(mirror)
            .with_delay(Duration::ZERO)
    }

    #[test]
    fn test_doi_to_filename() {
        assert_eq!(doi_to_filename("10.1016/j.ejor-2020.01.001"), "10_1016_j_ejor_2020_01_001");
        assert_eq!(doi_to_filename("abc"), "abc");
    }

    #[test]
    fn test_pdf_url() {
        let d = downloader("https://mirror.example/");
        assert_eq!(d.pdf_url("10.1/x"), "https://mirror.example/pdf/10.1/x.pdf");
    }

    #[tokio::test]
    async fn test_download_saves_pdf() {
        let server = serve(vec![MockResponse::ok(b"%PDF-1.4 fake body".to_vec())]);
        let dir = tempfile::tempdir().unwrap();

        let outcome = downloader(&server.url).download("10.1/abc", dir.path()).await;

        let expected = dir.path().join("10_1_abc.pdf");
        assert_eq!(outcome, DownloadOutcome::Saved(expected.clone()));
        assert_eq!(fs::read(&expected).unwrap(), b"%PDF-1.4 fake body");
        assert_eq!(server.paths(), vec!["/pdf/10.1/abc.pdf"]);
    }

    #[tokio::test]
    async fn test_download_respects_size_cap() {
        let server = serve(vec![MockResponse::ok(b"%PDF-1.4 something".to_vec())]);
        let dir = tempfile::tempdir().unwrap();

        let outcome = downloader(&server.url)
            .with_max_size_mb(0)
            .download("10.1/big", dir.path())
            .await;

        assert!(matches!(outcome, DownloadOutcome::TooLarge { .. }));
        assert!(!dir.path().join("10_1_big.pdf").exists());
    }

    #[tokio::test]
    async fn test_download_http_error_and_non_pdf() {
        let server = serve(vec![
            MockResponse::status(404, b"missing".to_vec()),
            MockResponse::ok(b"<html>captcha</html>".to_vec()),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let d = downloader(&server.url);

        assert_eq!(d.download("10.1/a", dir.path()).await, DownloadOutcome::HttpStatus(404));
        assert_eq!(d.download("10.1/b", dir.path()).await, DownloadOutcome::NotPdf);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_entries_skips_missing_doi() {
        let server = serve(vec![MockResponse::ok(b"%PDF-1.5".to_vec())]);
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            ManifestEntry { title: "no doi".into(), link: "https://a.org".into(), doi: None },
            ManifestEntry { title: "has doi".into(), link: "https://b.org".into(), doi: Some("10.2/b".into()) },
        ];

        let stats = downloader(&server.url).download_entries(&entries, dir.path()).await;

        assert_eq!(stats, DownloadStats { downloaded: 1, skipped_no_doi: 1, too_large: 0, failed: 0 });
        assert!(dir.path().join("10_2_b.pdf").exists());
    }

    #[tokio::test]
    async fn test_download_from_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let result = downloader("http://127.0.0.1:9")
            .download_from_manifest(&dir.path().join("nope.json"), dir.path())
            .await;
        assert!(result.is_err());
    }
}
