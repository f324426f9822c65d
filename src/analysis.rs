//! Model reply parsing and per-key aggregation
//!
//! A reply is expected to be a JSON object of category -> {key -> verdict}.
//! Parsed replies are kept per document and folded into an `AggregateTally`;
//! unparseable replies are kept verbatim and contribute nothing to the tally.

use crate::utils::response_preview;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Error marker stored for unparseable replies
pub const INVALID_RESPONSE: &str = "Invalid JSON response";

/// category -> {key -> verdict}, in reply order
pub type Evaluation = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    True,
    False,
    NotApplicable,
}

impl Verdict {
    /// Exact wire literals only; anything else is not a verdict
    pub fn parse(value: &Value) -> Option<Verdict> {
        match value.as_str()? {
            "True" => Some(Verdict::True),
            "False" => Some(Verdict::False),
            "N/A" => Some(Verdict::NotApplicable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "True",
            Verdict::False => "False",
            Verdict::NotApplicable => "N/A",
        }
    }
}

/// Outcome for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentRecord {
    Failed { error: String, response: String },
    Evaluated(Evaluation),
}

impl DocumentRecord {
    pub fn failed(raw: &str) -> Self {
        DocumentRecord::Failed {
            error: INVALID_RESPONSE.to_string(),
            response: raw.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DocumentRecord::Failed { .. })
    }
}

/// Body of a reply wrapped in a markdown code fence; `None` when unfenced
fn fenced_body(text: &str) -> Option<&str> {
    if !text.starts_with("```") {
        return None;
    }
    let body = &text[text.find('\n')? + 1..];
    Some(body.trim_end().strip_suffix("```").unwrap_or(body).trim())
}

/// Parse a raw model reply into category -> {key -> verdict}
pub fn parse_response(raw: &str) -> Result<Evaluation, String> {
    let trimmed = raw.trim();
    let json_text = match fenced_body(trimmed) {
        Some(body) => {
            eprintln!("[Analyzer] Stripped markdown code fence from model reply");
            body
        }
        None => trimmed,
    };
    if json_text.is_empty() {
        return Err("empty response".to_string());
    }

    let value: Value = serde_json::from_str(json_text)
        .map_err(|e| format!("invalid JSON: {}", e))?;

    let categories = match value {
        Value::Object(map) => map,
        other => return Err(format!("expected a JSON object, got {}", json_type(&other))),
    };

    for (category, verdicts) in &categories {
        if !verdicts.is_object() {
            return Err(format!(
                "category '{}' should map to an object, got {}",
                category,
                json_type(verdicts)
            ));
        }
    }

    Ok(categories)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Counters for one checklist key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyTally {
    pub true_count: u64,
    pub false_count: u64,
    pub na_count: u64,
    pub total_count: u64,
    pub true_pct: f64,
    pub false_pct: f64,
}

impl KeyTally {
    fn add(&mut self, verdict: Option<Verdict>) {
        match verdict {
            Some(Verdict::True) => self.true_count += 1,
            Some(Verdict::False) => self.false_count += 1,
            Some(Verdict::NotApplicable) => self.na_count += 1,
            None => {}
        }
        self.total_count += 1;
    }

    fn finalize(&mut self) {
        if self.total_count > 0 {
            self.true_pct = self.true_count as f64 / self.total_count as f64 * 100.0;
            self.false_pct = 100.0 - self.true_pct;
        } else {
            self.true_pct = 0.0;
            self.false_pct = 0.0;
        }
    }
}

/// Per-key tallies over every successfully parsed document of a run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTally {
    keys: Vec<String>,
    tallies: HashMap<String, KeyTally>,
    /// Documents whose reply could not be parsed; not part of any total
    pub excluded_documents: u64,
    pub evaluated_documents: u64,
}

impl AggregateTally {
    /// Zeroed tally for every key
    pub fn new(keys: &[String]) -> Self {
        Self {
            keys: keys.to_vec(),
            tallies: keys.iter().map(|k| (k.clone(), KeyTally::default())).collect(),
            excluded_documents: 0,
            evaluated_documents: 0,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn get(&self, key: &str) -> Option<&KeyTally> {
        self.tallies.get(key)
    }

    /// Fold one parsed reply. Every (key, verdict) bumps `total_count`; keys
    /// that are not on the checklist are reported and ignored.
    pub fn fold(&mut self, evaluation: &Evaluation) {
        for verdicts in evaluation.values() {
            let Some(verdicts) = verdicts.as_object() else { continue };
            for (key, value) in verdicts {
                match self.tallies.get_mut(key) {
                    Some(tally) => tally.add(Verdict::parse(value)),
                    None => eprintln!("[Analyzer] Ignoring unknown checklist key '{}'", key),
                }
            }
        }
        self.evaluated_documents += 1;
    }

    /// Record a document that produced no usable reply
    pub fn exclude(&mut self) {
        self.excluded_documents += 1;
    }

    /// Compute percentages; call once all documents are folded
    pub fn finalize(&mut self) {
        for tally in self.tallies.values_mut() {
            tally.finalize();
        }
    }

    /// `{key}_true`, `{key}_false`, `{key}_na`, `{key}_total`, `{key}_true_pct`, `{key}_false_pct`
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for key in &self.keys {
            let tally = self.tallies.get(key).cloned().unwrap_or_default();
            map.insert(format!("{}_true", key), Value::from(tally.true_count));
            map.insert(format!("{}_false", key), Value::from(tally.false_count));
            map.insert(format!("{}_na", key), Value::from(tally.na_count));
            map.insert(format!("{}_total", key), Value::from(tally.total_count));
            map.insert(format!("{}_true_pct", key), Value::from(tally.true_pct));
            map.insert(format!("{}_false_pct", key), Value::from(tally.false_pct));
        }
        map
    }

    /// Rebuild a finalized tally from an `aggregate_results.json` map
    pub fn from_flat_map(keys: &[String], map: &Map<String, Value>) -> Result<Self, String> {
        let count = |name: String| -> Result<u64, String> {
            map.get(&name)
                .and_then(Value::as_u64)
                .ok_or_else(|| format!("missing or invalid '{}'", name))
        };
        let pct = |name: String| -> Result<f64, String> {
            map.get(&name)
                .and_then(Value::as_f64)
                .ok_or_else(|| format!("missing or invalid '{}'", name))
        };

        let mut tally = Self::new(keys);
        for key in keys {
            let entry = KeyTally {
                true_count: count(format!("{}_true", key))?,
                false_count: count(format!("{}_false", key))?,
                na_count: count(format!("{}_na", key))?,
                total_count: count(format!("{}_total", key))?,
                true_pct: pct(format!("{}_true_pct", key))?,
                false_pct: pct(format!("{}_false_pct", key))?,
            };
            tally.tallies.insert(key.clone(), entry);
        }
        Ok(tally)
    }
}

/// Per-document outcomes of one run, keyed by file name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunResults {
    records: BTreeMap<String, DocumentRecord>,
}

impl RunResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw`, store the document's record and fold it into `tally`.
    /// Unparseable replies are stored as failures and leave `tally` untouched
    /// apart from the excluded-document count.
    pub fn record(&mut self, filename: &str, raw: &str, tally: &mut AggregateTally) -> &DocumentRecord {
        let record = match parse_response(raw) {
            Ok(evaluation) => {
                tally.fold(&evaluation);
                DocumentRecord::Evaluated(evaluation)
            }
            Err(e) => {
                eprintln!("[Analyzer] Error parsing JSON for {}: {} (reply: {:?})",
                    filename, e, response_preview(raw, 120));
                tally.exclude();
                DocumentRecord::failed(raw)
            }
        };
        self.records.insert(filename.to_string(), record);
        &self.records[filename]
    }

    pub fn get(&self, filename: &str) -> Option<&DocumentRecord> {
        self.records.get(filename)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.records.values().filter(|r| r.is_failed()).count()
    }
}
