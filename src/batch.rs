//! Batch evaluation of a directory of PDFs
//!
//! Documents are handled strictly one at a time, sorted by file name:
//! extract text -> ask the model -> parse and tally. Once every document is
//! done the per-document results, the aggregate tally and the summary table
//! are written next to each other.

use crate::ai_client::{CompletionBackend, Evaluator};
use crate::analysis::{AggregateTally, RunResults};
use crate::checklist::Checklist;
use crate::papers::pdf_extractor::extract_text_from_pdf;
use crate::report::{write_summary, SUMMARY_FILE};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RESULTS_FILE: &str = "results.json";
pub const AGGREGATE_FILE: &str = "aggregate_results.json";

/// Files a previous run leaves behind
const RUN_ARTIFACTS: &[&str] = &[RESULTS_FILE, AGGREGATE_FILE, SUMMARY_FILE];

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No PDF files found in the input folder {0}")]
    NoDocuments(PathBuf),
    #[error("The output folder {0} is not empty. Please clear it before running the analysis.")]
    OutputNotEmpty(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {file}: {source}")]
    Serialize {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {file}: {message}")]
    InvalidArtifact { file: &'static str, message: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> BatchError + '_ {
    move |source| BatchError::Io { path: path.to_path_buf(), source }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub output_dir: PathBuf,
    pub results: RunResults,
    pub tally: AggregateTally,
    pub summary: String,
    /// PDFs whose text could not be extracted; they have no record
    pub skipped: Vec<String>,
}

/// PDF file names in `dir`, sorted
pub fn list_pdfs(dir: &Path) -> Result<Vec<String>, BatchError> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            Path::new(name)
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    names.sort();
    Ok(names)
}

/// Refuse to overwrite a previous run. A separate output directory must be
/// empty (or missing); when writing next to the inputs only earlier result
/// files count.
fn check_output_dir(input_dir: &Path, output_dir: &Path) -> Result<(), BatchError> {
    if !output_dir.exists() {
        return Ok(());
    }

    let same_dir = match (fs::canonicalize(input_dir), fs::canonicalize(output_dir)) {
        (Ok(a), Ok(b)) => a == b,
        _ => input_dir == output_dir,
    };

    let occupied = if same_dir {
        RUN_ARTIFACTS.iter().any(|name| output_dir.join(name).exists())
    } else {
        fs::read_dir(output_dir)
            .map_err(io_err(output_dir))?
            .next()
            .is_some()
    };

    if occupied {
        return Err(BatchError::OutputNotEmpty(output_dir.to_path_buf()));
    }
    Ok(())
}

/// Write pretty JSON with four-space indentation
fn write_json<T: Serialize>(path: &Path, file: &'static str, value: &T) -> Result<(), BatchError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|source| BatchError::Serialize { file, source })?;
    fs::write(path, buf).map_err(io_err(path))
}

/// Evaluate every PDF in `input_dir` and write the run artifacts to
/// `output_dir` (defaults to `input_dir`).
pub async fn analyze_pdfs<B: CompletionBackend>(
    input_dir: &Path,
    output_dir: Option<&Path>,
    checklist: &Checklist,
    evaluator: &Evaluator<B>,
) -> Result<RunOutcome, BatchError> {
    let output_dir = output_dir.unwrap_or(input_dir);

    let pdfs = list_pdfs(input_dir)?;
    if pdfs.is_empty() {
        return Err(BatchError::NoDocuments(input_dir.to_path_buf()));
    }
    check_output_dir(input_dir, output_dir)?;

    let keys = checklist.keys();
    let mut tally = AggregateTally::new(&keys);
    let mut results = RunResults::new();
    let mut skipped = Vec::new();
    let total = pdfs.len();

    for (i, filename) in pdfs.iter().enumerate() {
        let progress_pct = (i + 1) as f64 / total as f64 * 100.0;
        println!("{:>5.1}% Processing: {}", progress_pct, filename);

        let pdf_path = input_dir.join(filename);
        let text = extract_text_from_pdf(&pdf_path);
        if text.is_empty() {
            eprintln!("[Analyzer] Failed to extract text from {}", pdf_path.display());
            skipped.push(filename.clone());
            continue;
        }

        let response = evaluator.evaluate(&text).await;
        results.record(filename, &response, &mut tally);
    }

    tally.finalize();

    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;
    write_json(&output_dir.join(RESULTS_FILE), RESULTS_FILE, &results)?;
    write_json(&output_dir.join(AGGREGATE_FILE), AGGREGATE_FILE, &tally.to_flat_map())?;

    let summary_path = output_dir.join(SUMMARY_FILE);
    let summary = write_summary(output_dir, &tally, &keys).map_err(io_err(&summary_path))?;

    println!("[Analyzer] {} evaluated, {} unparseable, {} unreadable",
        tally.evaluated_documents, tally.excluded_documents, skipped.len());

    Ok(RunOutcome {
        output_dir: output_dir.to_path_buf(),
        results,
        tally,
        summary,
        skipped,
    })
}

/// Re-render `summary.txt` from an existing `aggregate_results.json`.
/// The excluded-document footer comes from `results.json` when present.
pub fn rebuild_summary(dir: &Path, keys: &[String]) -> Result<String, BatchError> {
    let path = dir.join(AGGREGATE_FILE);
    let content = fs::read_to_string(&path).map_err(io_err(&path))?;
    let map: Map<String, Value> = serde_json::from_str(&content)
        .map_err(|e| BatchError::InvalidArtifact { file: AGGREGATE_FILE, message: e.to_string() })?;
    let mut tally = AggregateTally::from_flat_map(keys, &map)
        .map_err(|message| BatchError::InvalidArtifact { file: AGGREGATE_FILE, message })?;

    let results_path = dir.join(RESULTS_FILE);
    if results_path.exists() {
        let content = fs::read_to_string(&results_path).map_err(io_err(&results_path))?;
        let results: RunResults = serde_json::from_str(&content)
            .map_err(|e| BatchError::InvalidArtifact { file: RESULTS_FILE, message: e.to_string() })?;
        let failed = results.failed_count() as u64;
        tally.excluded_documents = failed;
        tally.evaluated_documents = results.len() as u64 - failed;
    }

    let summary_path = dir.join(SUMMARY_FILE);
    write_summary(dir, &tally, keys).map_err(io_err(&summary_path))
}
