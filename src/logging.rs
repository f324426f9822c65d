//! Terminal + daily log file output for the binaries
//!
//! `init_logging` opens `<data_dir>/litaudit/logs/litaudit-YYYY-MM-DD.log`
//! and removes logs older than a week. `log!`/`elog!` print to stdout/stderr
//! and append a timestamped copy to that file.

use chrono::{Datelike, Local, Timelike};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

const LOG_PREFIX: &str = "litaudit-";
const RETENTION_DAYS: i64 = 7;

/// Initialize logging in `log_dir` - creates today's log file and cleans old logs
pub fn init_logging(log_dir: &Path) -> Option<PathBuf> {
    if fs::create_dir_all(log_dir).is_err() {
        return None;
    }

    remove_old_logs(log_dir);

    let today = Local::now();
    let log_filename = format!("{}{:04}-{:02}-{:02}.log", LOG_PREFIX, today.year(), today.month(), today.day());
    let log_path = log_dir.join(&log_filename);

    let file = OpenOptions::new().create(true).append(true).open(&log_path).ok()?;
    let mut guard = LOG_FILE.lock().ok()?;
    *guard = Some(file);
    Some(log_path)
}

fn remove_old_logs(log_dir: &Path) {
    let Ok(entries) = fs::read_dir(log_dir) else { return };
    let cutoff = (Local::now() - chrono::Duration::days(RETENTION_DAYS)).date_naive();

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        // litaudit-YYYY-MM-DD.log
        if let Some(date_str) = name.strip_prefix(LOG_PREFIX).and_then(|s| s.strip_suffix(".log")) {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                if date < cutoff {
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }
}

fn timestamp() -> String {
    let now = Local::now();
    format!("[{:02}:{:02}:{:02}]", now.hour(), now.minute(), now.second())
}

fn append(line: &str) {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Log to both terminal and file
pub fn log_both(msg: &str) {
    println!("{}", msg);
    append(&format!("{} {}", timestamp(), msg));
}

/// Log error to both terminal and file
pub fn elog_both(msg: &str) {
    eprintln!("{}", msg);
    append(&format!("{} [ERROR] {}", timestamp(), msg));
}

/// Log to both terminal and file
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::logging::log_both(&format!($($arg)*))
    };
}

/// Error logging to both terminal and file
#[macro_export]
macro_rules! elog {
    ($($arg:tt)*) => {
        $crate::logging::elog_both(&format!($($arg)*))
    };
}
