//! Article manifests, PDF download and text extraction
//!
//! A manifest is the JSON list of search hits (title, link, DOI) written by
//! the Scholar search and consumed by the downloader.

pub mod downloader;
pub mod pdf_extractor;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One search hit with its resolved DOI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub doi: Option<String>,
}

/// Default manifest file name for a query, optionally scoped to a year
pub fn manifest_file_name(query: &str, year: Option<i32>) -> String {
    match year {
        Some(y) => format!("{}_{}_results.json", query, y),
        None => format!("{}_results.json", query),
    }
}

/// Pick a path in `dir` that does not exist yet: `name.json`, then `name_1.json`, ...
pub fn unique_manifest_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let mut i = 1;
    loop {
        let candidate = dir.join(format!("{}_{}.json", stem, i));
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

/// Write a manifest without overwriting an existing one; returns the path used
pub fn save_manifest(
    entries: &[ManifestEntry],
    dir: &Path,
    query: &str,
    year: Option<i32>,
) -> Result<PathBuf, String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;

    let path = unique_manifest_path(dir, &manifest_file_name(query, year));
    let content = serde_json::to_string_pretty(entries)
        .map_err(|e| format!("Failed to serialize manifest: {}", e))?;
    fs::write(&path, content)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

    Ok(path)
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("The file '{}' could not be read: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to decode JSON from the file '{}': {}", path.display(), e))
}

/// Counters for one manifest download pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DownloadStats {
    pub downloaded: u32,
    pub skipped_no_doi: u32,
    pub too_large: u32,
    pub failed: u32,
}

impl DownloadStats {
    pub fn attempted(&self) -> u32 {
        self.downloaded + self.too_large + self.failed
    }

    pub fn print_summary(&self) {
        println!("\nPDF Download Results:");
        println!("  {:12} {:3}", "Downloaded:", self.downloaded);
        println!("  {:12} {:3}", "Too large:", self.too_large);
        println!("  {:12} {:3}", "Failed:", self.failed);
        println!("  {:12} {:3}", "No DOI:", self.skipped_no_doi);

        let attempted = self.attempted();
        if attempted > 0 {
            println!("\nTotal: {}/{} PDFs ({:.0}% success rate)",
                     self.downloaded, attempted,
                     (self.downloaded as f64 / attempted as f64) * 100.0);
        }
    }
}
