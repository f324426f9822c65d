//! Evaluation checklist
//!
//! The checklist is an explicit list of items (key, category, question).
//! The user prompt sent to the model is rendered from it, and the ordered key
//! list used for aggregation comes straight from the items.
//!
//! `extract_keys` recovers the same key list from rendered prompt text by line
//! shape. It is kept for prompts authored by hand.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You will analyze a research article for adherence to specific criteria. \
For each question, answer with \"True\" if the criterion is met, \"False\" if it is not, and \"N/A\" if the \
criterion is not applicable to the article. Use the specified output format to ensure consistency.\n\
For questions related to NHST (i.e., Category B), consider whether statistical testing is appropriate for the \
study (e.g., performance evaluation). If NHST is not performed (B2), mark the criterion as \"False\" and mark all \
the remaining Category B questions as \"N/A\".";

const CATEGORY_A: &str = "Category A";
const CATEGORY_B: &str = "Category B";

/// (key, category, question) for the built-in checklist
const DEFAULT_ITEMS: &[(&str, &str, &str)] = &[
    ("A1", CATEGORY_A, "Is the parameter setting methodology documented?"),
    ("A2", CATEGORY_A, "Are the performance metrics clearly defined?"),
    ("A3", CATEGORY_A, "Is a measure of central tendency provided for the chosen performance metrics?"),
    ("A4", CATEGORY_A, "Is a measure of variability provided for the chosen performance metrics?"),
    ("A5", CATEGORY_A, "Is a measure of symmetry provided for the chosen performance metrics?"),
    ("A6", CATEGORY_A, "Is a measure of tailedness provided for the chosen performance metrics?"),
    ("A7", CATEGORY_A, "Are confidence intervals provided for the chosen performance metrics?"),
    ("A8", CATEGORY_A, "Are the performance metrics distributions plotted?"),
    ("A9", CATEGORY_A, "Are sample sizes adequate (≥30)?"),
    ("A10", CATEGORY_A, "Are sample sizes equal?"),
    ("A11", CATEGORY_A, "Is computation effort discussed?"),
    ("A12", CATEGORY_A, "Is the source code freely available?"),
    ("A13", CATEGORY_A, "Are the limitations of the study discussed?"),
    ("B1", CATEGORY_B, "Could NHST have been performed?"),
    ("B2", CATEGORY_B, "Is NHST performed?"),
    ("B3", CATEGORY_B, "Is power analysis done a priori?"),
    ("B4", CATEGORY_B, "Are the test assumptions discussed and/or verified?"),
    ("B5", CATEGORY_B, "Is the significance level (α) provided?"),
    ("B6", CATEGORY_B, "Is the familywise Type I error rate controlled?"),
    ("B7", CATEGORY_B, "Are exact test statistics provided?"),
    ("B8", CATEGORY_B, "Are exact p-values provided?"),
    ("B9", CATEGORY_B, "Are statistically non-significant results discussed?"),
    ("B10", CATEGORY_B, "Are effect sizes provided?"),
];

/// Human-readable headings for the built-in categories
fn category_heading(category: &str) -> Option<&'static str> {
    match category {
        CATEGORY_A => Some("Descriptive and Methodological Criteria"),
        CATEGORY_B => Some("Null Hypothesis Statistical Testing (NHST) Criteria"),
        _ => None,
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ChecklistError {
    #[error("duplicate checklist key '{0}'")]
    DuplicateKey(String),
    #[error("checklist key must be a single non-empty token, got '{0}'")]
    InvalidKey(String),
    #[error("checklist has no items")]
    Empty,
    #[error("failed to read checklist file: {0}")]
    Io(String),
    #[error("failed to parse checklist file: {0}")]
    Parse(String),
}

/// One yes/no/not-applicable question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub key: String,
    pub category: String,
    pub question: String,
}

impl ChecklistItem {
    pub fn new(key: &str, category: &str, question: &str) -> Self {
        Self {
            key: key.to_string(),
            category: category.to_string(),
            question: question.to_string(),
        }
    }
}

/// On-disk form accepted by `Checklist::from_json_file`
#[derive(Debug, Deserialize)]
struct ChecklistFile {
    #[serde(default)]
    system_prompt: Option<String>,
    items: Vec<ChecklistItem>,
}

/// Validated checklist; keys are unique and fixed after construction
#[derive(Debug, Clone)]
pub struct Checklist {
    system_prompt: String,
    items: Vec<ChecklistItem>,
}

impl Checklist {
    pub fn new(system_prompt: impl Into<String>, items: Vec<ChecklistItem>) -> Result<Self, ChecklistError> {
        if items.is_empty() {
            return Err(ChecklistError::Empty);
        }

        let mut seen = HashSet::new();
        for item in &items {
            if item.key.is_empty() || item.key.split_whitespace().count() != 1 || item.key.ends_with('.') {
                return Err(ChecklistError::InvalidKey(item.key.clone()));
            }
            if !seen.insert(item.key.as_str()) {
                return Err(ChecklistError::DuplicateKey(item.key.clone()));
            }
        }

        Ok(Self {
            system_prompt: system_prompt.into(),
            items,
        })
    }

    /// The built-in statistical-reporting checklist (13 + 10 questions)
    pub fn default_checklist() -> Self {
        let items = DEFAULT_ITEMS
            .iter()
            .map(|(key, category, question)| ChecklistItem::new(key, category, question))
            .collect();
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            items,
        }
    }

    /// Load a custom checklist: `{"system_prompt": "...", "items": [{"key", "category", "question"}]}`
    pub fn from_json_file(path: &Path) -> Result<Self, ChecklistError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ChecklistError::Io(format!("{}: {}", path.display(), e)))?;
        let file: ChecklistFile = serde_json::from_str(&content)
            .map_err(|e| ChecklistError::Parse(e.to_string()))?;
        let system_prompt = file
            .system_prompt
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self::new(system_prompt, file.items)
    }

    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Keys in checklist order
    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(|i| i.key.clone()).collect()
    }

    /// Category names in first-appearance order
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for item in &self.items {
            if !categories.contains(&item.category.as_str()) {
                categories.push(&item.category);
            }
        }
        categories
    }

    /// Render the user instruction: checklist, then the expected JSON shape
    pub fn user_prompt(&self) -> String {
        let mut out = String::from("CHECKLIST TO EVALUATE\n");

        for category in self.categories() {
            out.push('\n');
            match category_heading(category) {
                Some(heading) => out.push_str(&format!("{}: {}\n", category.to_uppercase(), heading)),
                None => out.push_str(&format!("{}\n", category.to_uppercase())),
            }
            out.push('\n');
            for item in self.items.iter().filter(|i| i.category == category) {
                out.push_str(&format!("    {}. {}\n", item.key, item.question));
            }
        }

        out.push_str("\nEXPECTED OUTPUT FORMAT\n\n");
        out.push_str("You shall provide your answer in the following format without additional commentary :\n\n");
        out.push_str(&self.output_skeleton());
        out
    }

    /// JSON skeleton listing every key under its category
    fn output_skeleton(&self) -> String {
        let categories = self.categories();
        let mut out = String::from("{\n");
        for (ci, category) in categories.iter().enumerate() {
            out.push_str(&format!("    \"{}\": {{\n", category));
            let keys: Vec<&ChecklistItem> = self.items.iter().filter(|i| &i.category == category).collect();
            for (ki, item) in keys.iter().enumerate() {
                let comma = if ki + 1 < keys.len() { "," } else { "" };
                out.push_str(&format!("        \"{}\": \"True/False/N/A\"{}\n", item.key, comma));
            }
            let comma = if ci + 1 < categories.len() { "," } else { "" };
            out.push_str(&format!("    }}{}\n", comma));
        }
        out.push_str("}\n");
        out
    }
}

impl Default for Checklist {
    fn default() -> Self {
        Self::default_checklist()
    }
}

/// Infer checklist keys from prompt text by line shape.
///
/// A line counts when its first whitespace-delimited token ends with a period;
/// the key is that token minus the period. Any line that happens to start with
/// an abbreviation ("e.g.") is picked up too.
pub fn extract_keys(prompt_text: &str) -> Vec<String> {
    prompt_text
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.strip_suffix('.'))
        .map(|key| key.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keys_scenario() {
        let text = "CHECKLIST\n\n  A1. Is X documented?\nsome free text\n   B2. Is Y performed?\n";
        assert_eq!(extract_keys(text), vec!["A1", "B2"]);
    }

    #[test]
    fn test_extract_keys_ignores_headers_and_blank_lines() {
        let text = "CATEGORY A: Criteria\n\n\t\nEXPECTED OUTPUT FORMAT\n{\n  \"A1\": \"True\"\n}";
        assert!(extract_keys(text).is_empty());
    }

    #[test]
    fn test_extract_keys_picks_up_abbreviations() {
        let text = "e.g. this line is not a question\nA1. Real question?";
        assert_eq!(extract_keys(text), vec!["e.g", "A1"]);
    }

    #[test]
    fn test_default_checklist_keys() {
        let checklist = Checklist::default_checklist();
        let keys = checklist.keys();
        assert_eq!(keys.len(), 23);
        assert_eq!(keys.first().map(String::as_str), Some("A1"));
        assert_eq!(keys.get(12).map(String::as_str), Some("A13"));
        assert_eq!(keys.get(13).map(String::as_str), Some("B1"));
        assert_eq!(keys.last().map(String::as_str), Some("B10"));
        assert_eq!(checklist.categories(), vec!["Category A", "Category B"]);
    }

    #[test]
    fn test_user_prompt_round_trips_keys() {
        let checklist = Checklist::default_checklist();
        let prompt = checklist.user_prompt();
        assert_eq!(extract_keys(&prompt), checklist.keys());
        assert!(prompt.contains("A9. Are sample sizes adequate (≥30)?"));
        assert!(prompt.contains("\"B10\": \"True/False/N/A\"\n"));
        assert!(prompt.contains("CATEGORY B: Null Hypothesis Statistical Testing (NHST) Criteria"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let items = vec![
            ChecklistItem::new("A1", "Category A", "First?"),
            ChecklistItem::new("A1", "Category B", "Second?"),
        ];
        assert_eq!(
            Checklist::new("sys", items).unwrap_err(),
            ChecklistError::DuplicateKey("A1".to_string())
        );
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let items = vec![ChecklistItem::new("A 1", "Category A", "Spaced?")];
        assert!(matches!(Checklist::new("sys", items), Err(ChecklistError::InvalidKey(_))));
        assert_eq!(Checklist::new("sys", vec![]).unwrap_err(), ChecklistError::Empty);
    }

    #[test]
    fn test_custom_category_prompt() {
        let checklist = Checklist::new(
            "sys",
            vec![
                ChecklistItem::new("Q1", "Reporting", "Is the seed reported?"),
                ChecklistItem::new("Q2", "Reporting", "Is the hardware reported?"),
            ],
        )
        .unwrap();
        let prompt = checklist.user_prompt();
        assert!(prompt.contains("REPORTING\n"));
        assert_eq!(extract_keys(&prompt), vec!["Q1", "Q2"]);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checklist.json");
        fs::write(
            &path,
            r#"{"items": [{"key": "C1", "category": "Category C", "question": "Is it reproducible?"}]}"#,
        )
        .unwrap();

        let checklist = Checklist::from_json_file(&path).unwrap();
        assert_eq!(checklist.keys(), vec!["C1"]);
        assert_eq!(checklist.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }
}
