//! Year-by-year harvest: Scholar search, manifest, PDF download
//!
//! Each year is one step. A failed step (search error) is retried from the
//! start after a fixed backoff, up to `attempts` times in total.

use crate::papers::downloader::PdfDownloader;
use crate::papers::{save_manifest, DownloadStats};
use crate::scholar::ScholarClient;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_PAGES: u32 = 30;

#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub query: String,
    pub from_year: i32,
    pub to_year: i32,
    pub nb_pages: u32,
    pub attempts: u32,
    pub backoff: Duration,
    /// Manifests are written here
    pub manifest_dir: PathBuf,
    /// PDFs land in `pdf_root/year_{year}`
    pub pdf_root: PathBuf,
}

impl HarvestPlan {
    pub fn new(query: &str, from_year: i32, to_year: i32) -> Self {
        Self {
            query: query.to_string(),
            from_year,
            to_year,
            nb_pages: DEFAULT_PAGES,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            manifest_dir: PathBuf::from("."),
            pdf_root: PathBuf::from("."),
        }
    }

    pub fn year_dir(&self, year: i32) -> PathBuf {
        self.pdf_root.join(format!("year_{}", year))
    }
}

#[derive(Debug, Clone)]
pub struct YearOutcome {
    pub year: i32,
    pub manifest: PathBuf,
    pub articles: usize,
    pub downloads: DownloadStats,
    pub attempts_used: u32,
}

#[derive(Debug, Default)]
pub struct HarvestReport {
    pub completed: Vec<YearOutcome>,
    pub failed_years: Vec<i32>,
}

async fn harvest_year(
    plan: &HarvestPlan,
    year: i32,
    scholar: &ScholarClient,
    downloader: &PdfDownloader,
) -> Result<(PathBuf, usize, DownloadStats), String> {
    let entries = scholar.search(&plan.query, Some(year), plan.nb_pages).await?;
    let manifest = save_manifest(&entries, &plan.manifest_dir, &plan.query, Some(year))?;
    println!("[Harvest] Saved {} articles to {}", entries.len(), manifest.display());

    let stats = downloader.download_entries(&entries, &plan.year_dir(year)).await;
    Ok((manifest, entries.len(), stats))
}

/// Run the plan year by year, retrying whole years on failure
pub async fn run_harvest(plan: &HarvestPlan, scholar: &ScholarClient, downloader: &PdfDownloader) -> HarvestReport {
    let mut report = HarvestReport::default();
    let attempts = plan.attempts.max(1);

    for year in plan.from_year..=plan.to_year {
        println!("[Harvest] Year {}", year);

        for attempt in 1..=attempts {
            match harvest_year(plan, year, scholar, downloader).await {
                Ok((manifest, articles, downloads)) => {
                    report.completed.push(YearOutcome {
                        year,
                        manifest,
                        articles,
                        downloads,
                        attempts_used: attempt,
                    });
                    break;
                }
                Err(e) => {
                    eprintln!("[Harvest] Attempt no.{} failed for year {}: {}", attempt, year, e);
                    if attempt == attempts {
                        eprintln!("[Harvest] Failed to process year {} after {} attempts.", year, attempts);
                        report.failed_years.push(year);
                    } else if !plan.backoff.is_zero() {
                        tokio::time::sleep(plan.backoff).await;
                    }
                }
            }
        }
    }

    report
}

/// Print a per-year overview of a finished harvest
pub fn print_report(report: &HarvestReport, manifest_dir: &Path) {
    println!("\nHarvest Results ({}):", manifest_dir.display());
    for outcome in &report.completed {
        println!("  {}: {:4} articles, {:4} PDFs ({} attempt(s))",
            outcome.year, outcome.articles, outcome.downloads.downloaded, outcome.attempts_used);
    }
    if !report.failed_years.is_empty() {
        println!("\nFailed years ({}):", report.failed_years.len());
        for year in &report.failed_years {
            println!("  - {}", year);
        }
    }
}
