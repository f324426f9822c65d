//! End-to-end batch runs against a scripted model backend

use litaudit_lib::ai_client::{CompletionBackend, Evaluator};
use litaudit_lib::analysis::{DocumentRecord, INVALID_RESPONSE};
use litaudit_lib::batch::{self, BatchError, AGGREGATE_FILE, RESULTS_FILE};
use litaudit_lib::checklist::{Checklist, ChecklistItem};
use litaudit_lib::report::SUMMARY_FILE;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Replies with canned responses in order and counts calls
struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<usize>,
}

impl ScriptedBackend {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(0),
        }
    }
}

impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, String> {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "no scripted reply left".to_string())
    }
}

fn two_item_checklist() -> Checklist {
    Checklist::new(
        "Grade the article.",
        vec![
            ChecklistItem::new("A1", "Category A", "Is the problem stated?"),
            ChecklistItem::new("B2", "Category B", "Are results reproducible?"),
        ],
    )
    .unwrap()
}

/// Single-page PDF showing `text` in Helvetica, with a correct xref table
fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, obj).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_empty_input_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("notes.txt"), "not a pdf").unwrap();
    let checklist = two_item_checklist();
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&[]));

    let err = batch::analyze_pdfs(input.path(), None, &checklist, &evaluator).await.unwrap_err();

    assert!(matches!(err, BatchError::NoDocuments(_)));
    assert!(!input.path().join(RESULTS_FILE).exists());
    assert!(!input.path().join(AGGREGATE_FILE).exists());
    assert!(!input.path().join(SUMMARY_FILE).exists());
}

#[tokio::test]
async fn test_non_empty_output_aborts_before_any_model_call() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("paper.pdf"), minimal_pdf("Problem statement")).unwrap();
    fs::write(output.path().join("previous.txt"), "old run").unwrap();

    let checklist = two_item_checklist();
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&["{}"]));

    let err = batch::analyze_pdfs(input.path(), Some(output.path()), &checklist, &evaluator)
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::OutputNotEmpty(_)));
    assert_eq!(*evaluator.backend().calls.lock().unwrap(), 0);
    assert!(!output.path().join(RESULTS_FILE).exists());
}

#[tokio::test]
async fn test_one_parsed_one_unparseable() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let output_dir = output.path().join("run");
    fs::write(input.path().join("a.pdf"), minimal_pdf("The problem is stated clearly")).unwrap();
    fs::write(input.path().join("b.pdf"), minimal_pdf("Results are not reproducible")).unwrap();

    let reply = r#"```json
{"Category A": {"A1": "True"}, "Category B": {"B2": "False"}}
```"#;
    let checklist = two_item_checklist();
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&[reply, "Sorry, I cannot help."]));

    let outcome = batch::analyze_pdfs(input.path(), Some(output_dir.as_path()), &checklist, &evaluator)
        .await
        .unwrap();

    assert!(outcome.skipped.is_empty());
    assert_eq!(*evaluator.backend().calls.lock().unwrap(), 2);
    assert_eq!(outcome.tally.evaluated_documents, 1);
    assert_eq!(outcome.tally.excluded_documents, 1);

    match outcome.results.get("b.pdf") {
        Some(DocumentRecord::Failed { error, response }) => {
            assert_eq!(error, INVALID_RESPONSE);
            assert_eq!(response, "Sorry, I cannot help.");
        }
        other => panic!("expected failed record for b.pdf, got {:?}", other),
    }

    let results = read_json(&output_dir.join(RESULTS_FILE));
    assert_eq!(results["a.pdf"]["Category A"]["A1"], "True");
    assert_eq!(results["b.pdf"]["error"], INVALID_RESPONSE);

    let aggregate = read_json(&output_dir.join(AGGREGATE_FILE));
    assert_eq!(aggregate["A1_true"], 1);
    assert_eq!(aggregate["A1_total"], 1);
    assert_eq!(aggregate["A1_true_pct"], 100.0);
    assert_eq!(aggregate["B2_false"], 1);
    assert_eq!(aggregate["B2_false_pct"], 100.0);

    let summary = fs::read_to_string(output_dir.join(SUMMARY_FILE)).unwrap();
    assert_eq!(summary, outcome.summary);
    assert!(summary.contains("1 document(s) excluded"));

    // A second run into the same directory is refused
    let rerun = batch::analyze_pdfs(input.path(), Some(output_dir.as_path()), &checklist, &evaluator).await;
    assert!(matches!(rerun, Err(BatchError::OutputNotEmpty(_))));
}

#[tokio::test]
async fn test_rebuild_summary_matches_run() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("only.pdf"), minimal_pdf("Reproducible results")).unwrap();

    let checklist = two_item_checklist();
    let reply = r#"{"Category A": {"A1": "N/A"}, "Category B": {"B2": "True"}}"#;
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&[reply]));

    let outcome = batch::analyze_pdfs(input.path(), None, &checklist, &evaluator).await.unwrap();
    fs::remove_file(input.path().join(SUMMARY_FILE)).unwrap();

    let rebuilt = batch::rebuild_summary(input.path(), &checklist.keys()).unwrap();
    assert_eq!(rebuilt, outcome.summary);
}

#[tokio::test]
async fn test_rebuild_summary_keeps_excluded_footer() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.pdf"), minimal_pdf("First article")).unwrap();
    fs::write(input.path().join("b.pdf"), minimal_pdf("Second article")).unwrap();

    let checklist = two_item_checklist();
    let reply = r#"{"Category A": {"A1": "True"}}"#;
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&[reply, "[]"]));

    let outcome = batch::analyze_pdfs(input.path(), None, &checklist, &evaluator).await.unwrap();
    let rebuilt = batch::rebuild_summary(input.path(), &checklist.keys()).unwrap();
    assert_eq!(rebuilt, outcome.summary);
    assert!(rebuilt.contains("1 document(s) excluded"));
}

#[tokio::test]
async fn test_unreadable_pdf_is_skipped_without_model_call() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.pdf"), minimal_pdf("Readable article")).unwrap();
    fs::write(input.path().join("b.pdf"), b"%PDF-1.4 junk").unwrap();

    let checklist = two_item_checklist();
    let reply = r#"{"Category A": {"A1": "True"}, "Category B": {"B2": "True"}}"#;
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&[reply]));

    let outcome = batch::analyze_pdfs(input.path(), Some(output.path()), &checklist, &evaluator)
        .await
        .unwrap();

    assert_eq!(outcome.skipped, vec!["b.pdf".to_string()]);
    assert_eq!(*evaluator.backend().calls.lock().unwrap(), 1);
    assert!(outcome.results.get("b.pdf").is_none());
    assert_eq!(outcome.tally.evaluated_documents, 1);
    assert_eq!(outcome.tally.excluded_documents, 0);

    let results = read_json(&output.path().join(RESULTS_FILE));
    assert!(results.get("a.pdf").is_some());
    assert!(results.get("b.pdf").is_none());
}

#[tokio::test]
async fn test_backend_error_recorded_as_invalid_response() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.pdf"), minimal_pdf("First article")).unwrap();
    fs::write(input.path().join("b.pdf"), minimal_pdf("Second article")).unwrap();

    // One scripted reply: the second document hits a backend error
    let checklist = two_item_checklist();
    let reply = r#"{"Category A": {"A1": "False"}, "Category B": {"B2": "N/A"}}"#;
    let evaluator = Evaluator::new(&checklist, ScriptedBackend::new(&[reply]));

    let outcome = batch::analyze_pdfs(input.path(), Some(output.path()), &checklist, &evaluator)
        .await
        .unwrap();

    assert_eq!(*evaluator.backend().calls.lock().unwrap(), 2);
    assert_eq!(
        outcome.results.get("b.pdf"),
        Some(&DocumentRecord::Failed { error: INVALID_RESPONSE.to_string(), response: String::new() })
    );
    assert_eq!(outcome.tally.evaluated_documents, 1);
    assert_eq!(outcome.tally.excluded_documents, 1);

    let results = read_json(&output.path().join(RESULTS_FILE));
    assert_eq!(results["b.pdf"], serde_json::json!({"error": INVALID_RESPONSE, "response": ""}));

    let aggregate = read_json(&output.path().join(AGGREGATE_FILE));
    assert_eq!(aggregate["A1_false"], 1);
    assert_eq!(aggregate["A1_total"], 1);
    assert_eq!(aggregate["B2_na"], 1);
    assert_eq!(aggregate["B2_total"], 1);
}
