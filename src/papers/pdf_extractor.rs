//! PDF text extraction wrapper
//!
//! Wraps pdf-extract with error handling for:
//! - Encrypted or corrupted PDFs (including panics inside the parser)
//! - Text streams decoded as `/C<code>` markers instead of glyphs

use regex::{Captures, Regex};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::LazyLock;

/// More markers than this means the whole document was mis-decoded
const MARKER_THRESHOLD: usize = 100;

/// `/C<decimal code>` as left behind by fonts without a usable encoding
static CHAR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/C(\d+)").unwrap()
});

/// Extract the full text of a PDF on disk.
///
/// Never fails: unreadable files are logged and yield an empty string.
pub fn extract_text_from_pdf(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("[PDF] Error reading {}: {}", path.display(), e);
            return String::new();
        }
    };

    match extract_text_from_bytes(&bytes) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("[PDF] Error reading {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Extract text from PDF bytes, normalizing character-code markers
pub fn extract_text_from_bytes(pdf_bytes: &[u8]) -> Result<String, String> {
    if !pdf_bytes.starts_with(b"%PDF") {
        return Err("not a PDF file (missing %PDF header)".to_string());
    }

    // pdf-extract panics on some malformed inputs
    let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(pdf_bytes)))
        .map_err(|_| "PDF parser panicked".to_string())?;

    let text = result.map_err(|e| format!("PDF extraction failed: {}", e))?;
    Ok(normalize_char_markers(&text))
}

/// Replace `/C<digits>` markers with the characters they encode, but only when
/// the text holds more than `MARKER_THRESHOLD` of them.
pub fn normalize_char_markers(text: &str) -> String {
    let re = &*CHAR_MARKER;
    if re.find_iter(text).count() <= MARKER_THRESHOLD {
        return text.to_string();
    }

    re.replace_all(text, |caps: &Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
