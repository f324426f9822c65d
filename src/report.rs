//! Fixed-width summary table for a finalized tally

use crate::analysis::AggregateTally;
use std::fs;
use std::io;
use std::path::Path;

pub const SUMMARY_FILE: &str = "summary.txt";

/// Header, a rule as wide as the header, then one row per key
pub fn render_summary(tally: &AggregateTally, keys: &[String]) -> String {
    let header = format!(
        "{:<10} {:<6} {:<6} {:<6} {:<6} {:<8} {:<8}",
        "Question", "True", "False", "N/A", "Total", "% True", "% False"
    );
    let separator = "-".repeat(header.chars().count());
    let mut lines = vec![header, separator];

    for key in keys {
        let t = tally.get(key).cloned().unwrap_or_default();
        lines.push(format!(
            "{:<10} {:<6} {:<6} {:<6} {:<6} {:<8.1} {:<8.1}",
            key, t.true_count, t.false_count, t.na_count, t.total_count, t.true_pct, t.false_pct
        ));
    }

    if tally.excluded_documents > 0 {
        lines.push(String::new());
        lines.push(format!(
            "{} document(s) excluded from totals (unparseable model response)",
            tally.excluded_documents
        ));
    }

    lines.join("\n")
}

/// Render and write `summary.txt` into `dir`; returns the rendered table
pub fn write_summary(dir: &Path, tally: &AggregateTally, keys: &[String]) -> io::Result<String> {
    let summary = render_summary(tally, keys);
    fs::write(dir.join(SUMMARY_FILE), &summary)?;
    Ok(summary)
}
