//! Batch harvest script
//!
//! Searches and downloads one query across a range of years.
//! Usage: cargo run --bin batch_harvest --release [-- <output dir>]
//!
//! The plan is hardcoded below. Edit as needed.

use std::path::PathBuf;
use std::time::{Duration, Instant};

// Import from the library crate
use litaudit_lib::crossref::CrossrefClient;
use litaudit_lib::harvest::{self, HarvestPlan};
use litaudit_lib::papers::downloader::PdfDownloader;
use litaudit_lib::scholar::ScholarClient;
use litaudit_lib::settings::{self, Settings};
use litaudit_lib::logging;

const QUERY: &str = "metaheuristics";
const FROM_YEAR: i32 = 2001;
const TO_YEAR: i32 = 2024;
const PAGES_PER_YEAR: u32 = 30;
const ATTEMPTS: u32 = 3;
const BACKOFF: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    println!("==============================================");
    println!("  Batch Harvest - \"{}\" {}-{}", QUERY, FROM_YEAR, TO_YEAR);
    println!("==============================================");
    println!();

    if let Some(log_path) = logging::init_logging(&settings::app_data_dir().join("logs")) {
        println!("[Batch] Logging to: {}", log_path.display());
    }

    let output_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    println!("[Batch] Output directory: {}", output_dir.display());

    let settings = Settings::load(&settings::default_settings_path());
    let options = settings.http_options();
    println!("[Batch] Proxy: {}", settings.proxy.as_deref().unwrap_or("none"));

    let scholar = match CrossrefClient::new(&options, settings.crossref_mailto.clone())
        .and_then(|crossref| ScholarClient::new(&options, crossref))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[Batch] ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut downloader = match PdfDownloader::new(&options) {
        Ok(d) => d.with_max_size_mb(settings.max_pdf_size_mb).with_delay(settings.request_delay()),
        Err(e) => {
            eprintln!("[Batch] ERROR: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(mirror) = settings.pdf_mirror.as_deref().filter(|m| !m.is_empty()) {
        downloader = downloader.with_mirror(mirror);
    }

    let plan = HarvestPlan {
        nb_pages: PAGES_PER_YEAR,
        attempts: ATTEMPTS,
        backoff: BACKOFF,
        manifest_dir: output_dir.clone(),
        pdf_root: output_dir,
        ..HarvestPlan::new(QUERY, FROM_YEAR, TO_YEAR)
    };

    let total_years = (TO_YEAR - FROM_YEAR + 1) as u32;
    println!("[Batch] {} years, up to {} articles each", total_years, PAGES_PER_YEAR * 10);
    println!();

    let start_time = Instant::now();
    let report = harvest::run_harvest(&plan, &scholar, &downloader).await;
    let total_elapsed = start_time.elapsed();

    let total_articles: usize = report.completed.iter().map(|y| y.articles).sum();
    let total_pdfs: u32 = report.completed.iter().map(|y| y.downloads.downloaded).sum();

    println!();
    println!("==============================================");
    println!("  BATCH HARVEST COMPLETE");
    println!("==============================================");
    println!();
    println!("Total time: {:.1} minutes", total_elapsed.as_secs_f64() / 60.0);
    println!("Articles found: {}", total_articles);
    println!("PDFs downloaded: {}", total_pdfs);

    harvest::print_report(&report, &plan.manifest_dir);
    println!();

    if !report.failed_years.is_empty() {
        std::process::exit(1);
    }
}
