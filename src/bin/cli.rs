//! litaudit CLI - literature harvest and checklist evaluation
//!
//! Usage: litaudit [OPTIONS] <COMMAND>
//!
//! Typical flow:
//!   litaudit search "metaheuristics" --year 2004 --pages 30
//!   litaudit download metaheuristics_2004_results.json year_2004
//!   litaudit analyze year_2004 --output year_2004_results

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use litaudit_lib::ai_client::{Evaluator, LlmBackend};
use litaudit_lib::checklist::Checklist;
use litaudit_lib::crossref::CrossrefClient;
use litaudit_lib::harvest::{self, HarvestPlan};
use litaudit_lib::papers::downloader::PdfDownloader;
use litaudit_lib::papers::save_manifest;
use litaudit_lib::scholar::ScholarClient;
use litaudit_lib::settings::{self, mask_key, Settings};
use litaudit_lib::{batch, http, logging};
use litaudit_lib::{elog, log};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "litaudit")]
#[command(version, about = "Checklist-based literature review pipeline", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (default: <data dir>/litaudit/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Proxy for Scholar, Crossref and PDF traffic (overrides settings)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Do not write a log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every PDF in a directory against the checklist
    Analyze {
        /// Directory containing the PDFs
        input: PathBuf,

        /// Where results.json, aggregate_results.json and summary.txt go (default: INPUT)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Custom checklist JSON file
        #[arg(long)]
        checklist: Option<PathBuf>,

        /// LLM backend: openai (also Ollama) or anthropic
        #[arg(long)]
        backend: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// OpenAI-compatible base URL, e.g. http://localhost:11434/v1
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Re-render summary.txt from aggregate_results.json
    Summary {
        /// Directory holding aggregate_results.json
        dir: PathBuf,

        /// Custom checklist JSON file (must match the run)
        #[arg(long)]
        checklist: Option<PathBuf>,
    },

    /// Show the checklist and the prompt sent to the model
    Checklist {
        /// Custom checklist JSON file
        #[arg(long)]
        checklist: Option<PathBuf>,

        /// Print checklist items as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search Google Scholar and save a manifest with resolved DOIs
    Search {
        /// Search query
        query: String,

        /// Restrict to one publication year
        #[arg(long)]
        year: Option<i32>,

        /// Number of result pages (10 results each)
        #[arg(long, default_value = "1")]
        pages: u32,

        /// Directory for the manifest file
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Download the PDFs listed in a manifest
    Download {
        /// Manifest JSON file
        manifest: PathBuf,

        /// Destination directory
        dir: PathBuf,

        /// Skip files larger than this (MB)
        #[arg(long)]
        max_size_mb: Option<u32>,

        /// PDF mirror base URL
        #[arg(long)]
        mirror: Option<String>,
    },

    /// Search and download year by year with whole-year retries
    Harvest {
        /// Search query
        query: String,

        #[arg(long)]
        from_year: i32,

        #[arg(long)]
        to_year: i32,

        /// Result pages per year
        #[arg(long, default_value_t = harvest::DEFAULT_PAGES)]
        pages: u32,

        /// Attempts per year
        #[arg(long, default_value_t = harvest::DEFAULT_ATTEMPTS)]
        attempts: u32,

        /// Seconds to wait before retrying a year
        #[arg(long, default_value = "60")]
        backoff_secs: u64,

        /// Directory for manifests
        #[arg(long, default_value = ".")]
        manifest_dir: PathBuf,

        /// Root directory for year_<YEAR> PDF folders
        #[arg(long, default_value = ".")]
        pdf_dir: PathBuf,
    },

    /// Settings management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current settings (keys masked)
    Show,
    /// Store an API key: openai or anthropic
    SetKey { provider: String, key: String },
    /// Choose the LLM backend and optionally the model
    SetBackend {
        backend: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Set or clear (no argument) the proxy
    SetProxy { url: Option<String> },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    // Ignore SIGPIPE so piping through head/tail doesn't kill the process.
    #[cfg(unix)]
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN); }

    let cli = Cli::parse();

    if !cli.no_log_file {
        if let Some(log_path) = logging::init_logging(&settings::app_data_dir().join("logs")) {
            eprintln!("Logging to: {}", log_path.display());
        }
    }

    if let Err(e) = run_cli(cli).await {
        elog!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_checklist(path: Option<&Path>) -> Result<Checklist, String> {
    match path {
        Some(p) => Checklist::from_json_file(p).map_err(|e| e.to_string()),
        None => Ok(Checklist::default_checklist()),
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    let settings_path = cli.settings.clone().unwrap_or_else(settings::default_settings_path);
    let mut settings = Settings::load(&settings_path);
    // Only applied to outbound clients, never saved
    let proxy = cli.proxy.as_deref();

    match cli.command {
        Commands::Analyze { input, output, checklist, backend, model, base_url } => {
            if let Some(b) = backend {
                settings.llm_backend = b;
            }
            if model.is_some() {
                settings.llm_model = model;
            }
            if base_url.is_some() {
                settings.llm_base_url = base_url;
            }
            run_analyze(&settings, &input, output.as_deref(), checklist.as_deref()).await
        }

        Commands::Summary { dir, checklist } => {
            let checklist = load_checklist(checklist.as_deref())?;
            let summary = batch::rebuild_summary(&dir, &checklist.keys()).map_err(|e| e.to_string())?;
            log!("{}", summary);
            Ok(())
        }

        Commands::Checklist { checklist, json } => {
            let checklist = load_checklist(checklist.as_deref())?;
            if json {
                let out = serde_json::to_string_pretty(checklist.items())
                    .map_err(|e| format!("Failed to serialize checklist: {}", e))?;
                println!("{}", out);
            } else {
                println!("Keys ({}): {}", checklist.keys().len(), checklist.keys().join(", "));
                println!("\n--- System prompt ---\n{}", checklist.system_prompt());
                println!("\n--- User prompt ---\n{}", checklist.user_prompt());
            }
            Ok(())
        }

        Commands::Search { query, year, pages, out_dir } => {
            let scholar = scholar_client(&settings, proxy)?;
            let entries = scholar.search(&query, year, pages).await?;
            let path = save_manifest(&entries, &out_dir, &query, year)?;
            let with_doi = entries.iter().filter(|e| e.doi.is_some()).count();
            log!("Saved {} articles ({} with DOI) to {}", entries.len(), with_doi, path.display());
            Ok(())
        }

        Commands::Download { manifest, dir, max_size_mb, mirror } => {
            if let Some(m) = mirror {
                settings.pdf_mirror = Some(m);
            }
            if let Some(size) = max_size_mb {
                settings.max_pdf_size_mb = size;
            }
            let downloader = pdf_downloader(&settings, proxy)?;
            let stats = downloader.download_from_manifest(&manifest, &dir).await?;
            stats.print_summary();
            Ok(())
        }

        Commands::Harvest { query, from_year, to_year, pages, attempts, backoff_secs, manifest_dir, pdf_dir } => {
            if from_year > to_year {
                return Err(format!("--from-year {} is after --to-year {}", from_year, to_year));
            }
            let plan = HarvestPlan {
                nb_pages: pages,
                attempts,
                backoff: Duration::from_secs(backoff_secs),
                manifest_dir,
                pdf_root: pdf_dir,
                ..HarvestPlan::new(&query, from_year, to_year)
            };
            let scholar = scholar_client(&settings, proxy)?;
            let downloader = pdf_downloader(&settings, proxy)?;

            let report = harvest::run_harvest(&plan, &scholar, &downloader).await;
            harvest::print_report(&report, &plan.manifest_dir);
            log!("Harvest done: {} year(s) completed, {} failed", report.completed.len(), report.failed_years.len());
            Ok(())
        }

        Commands::Config { action } => run_config(action, &mut settings, &settings_path),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "litaudit", &mut std::io::stdout());
            Ok(())
        }
    }
}

async fn run_analyze(
    settings: &Settings,
    input: &Path,
    output: Option<&Path>,
    checklist_path: Option<&Path>,
) -> Result<(), String> {
    let checklist = load_checklist(checklist_path)?;
    let config = settings.llm_config()?;
    if config.api_key.is_none() && settings.llm_base_url.is_none() {
        elog!("[Analyzer] No API key configured for {} (set it with `litaudit config set-key`)", config.backend);
    }
    log!("[Analyzer] Model: {} via {} ({} checklist items)", config.model, config.backend, checklist.items().len());

    let backend = LlmBackend::from_config(config)?;
    let evaluator = Evaluator::new(&checklist, backend);

    let outcome = batch::analyze_pdfs(input, output, &checklist, &evaluator)
        .await
        .map_err(|e| e.to_string())?;

    log!("\n{}\n", outcome.summary);
    log!("Results written to {}", outcome.output_dir.display());
    if !outcome.skipped.is_empty() {
        elog!("{} PDF(s) had no extractable text: {}", outcome.skipped.len(), outcome.skipped.join(", "));
    }
    Ok(())
}

fn scholar_client(settings: &Settings, proxy: Option<&str>) -> Result<ScholarClient, String> {
    let options = settings.http_options_with_proxy(proxy);
    let crossref = CrossrefClient::new(&options, settings.crossref_mailto.clone())?;
    ScholarClient::new(&options, crossref)
}

fn pdf_downloader(settings: &Settings, proxy: Option<&str>) -> Result<PdfDownloader, String> {
    let mut downloader = PdfDownloader::new(&settings.http_options_with_proxy(proxy))?
        .with_max_size_mb(settings.max_pdf_size_mb)
        .with_delay(settings.request_delay());
    if let Some(mirror) = settings.pdf_mirror.as_deref().filter(|m| !m.is_empty()) {
        downloader = downloader.with_mirror(mirror);
    }
    Ok(downloader)
}

fn run_config(action: ConfigAction, settings: &mut Settings, path: &Path) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            let masked = |key: Option<String>| key.map(|k| mask_key(&k)).unwrap_or_else(|| "(not set)".to_string());
            println!("Settings file:    {}", path.display());
            println!("LLM backend:      {}", settings.llm_backend);
            println!("LLM model:        {}", settings.llm_model.as_deref().unwrap_or("(default)"));
            println!("LLM base URL:     {}", settings.llm_base_url.as_deref().unwrap_or("(default)"));
            println!("OpenAI key:       {}", masked(settings.openai_api_key()));
            println!("Anthropic key:    {}", masked(settings.anthropic_api_key()));
            println!("Proxy:            {}", settings.proxy.as_deref().unwrap_or("(none)"));
            println!("Crossref mailto:  {}", settings.crossref_mailto.as_deref().unwrap_or("(none)"));
            println!("Max PDF size:     {} MB", settings.max_pdf_size_mb);
            println!("Request delay:    {} s", settings.request_delay_secs);
            return Ok(());
        }
        ConfigAction::SetKey { provider, key } => {
            let key = if key.is_empty() { None } else { Some(key) };
            match provider.to_lowercase().as_str() {
                "openai" => settings.openai_api_key = key,
                "anthropic" => settings.anthropic_api_key = key,
                other => return Err(format!("Unknown provider '{}' (expected openai or anthropic)", other)),
            }
        }
        ConfigAction::SetBackend { backend, model, base_url } => {
            backend.parse::<litaudit_lib::ai_client::BackendKind>()?;
            settings.llm_backend = backend.to_lowercase();
            settings.llm_model = model;
            settings.llm_base_url = base_url;
        }
        ConfigAction::SetProxy { url } => {
            let url = url.filter(|u| !u.is_empty());
            if let Some(u) = &url {
                http::validate_proxy_url(u)?;
            }
            settings.proxy = url;
        }
    }

    settings.save(path)?;
    log!("Settings saved to {}", path.display());
    Ok(())
}
