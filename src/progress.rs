//! JSON-lines progress reporting on stdout.
//!
//! A parent process (GUI or script) reads one JSON object per line and can
//! drive its progress bars from it. Diagnostics go to stderr through
//! `tracing`, so stdout carries nothing but these records.

use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

use crate::pipeline::ProgressSink;

/// Which part of the run a progress record belongs to.
///
/// `Complete` and `Error` mark the single final record of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    Analyze,
    Adjust,
    Complete,
    Error,
}

/// Structured progress update, emitted as one JSON line.
#[derive(Debug, Serialize)]
pub struct Progress {
    pub pass: Pass,
    /// Items finished so far in this pass.
    pub completed: usize,
    pub total: usize,
    /// Completion percentage (0.0 - 100.0).
    pub progress: f32,
    /// "processing", "complete: ..." or "error: ..."
    pub status: String,
}

impl Progress {
    pub fn new(pass: Pass, completed: usize, total: usize, status: impl Into<String>) -> Self {
        let progress = if total == 0 {
            100.0
        } else {
            completed as f32 / total as f32 * 100.0
        };
        Progress { pass, completed, total, progress, status: status.into() }
    }

    /// Final record of a successful run.
    pub fn complete(written: usize, destination: &Path) -> Self {
        Progress::new(
            Pass::Complete,
            written,
            written,
            format!("complete: saved {written} pictures into {}", destination.display()),
        )
    }

    /// Final record of a failed run. Never reports any progress.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Progress {
            pass: Pass::Error,
            completed: 0,
            total: 0,
            progress: 0.0,
            status: format!("error: {message}"),
        }
    }

    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("could not serialize progress record: {e}"),
        }
    }
}

/// [`ProgressSink`] that prints one [`Progress`] line per completed item.
///
/// Lines are printed while holding the counter lock, so the `completed`
/// values of one pass appear in increasing order.
pub struct JsonProgress {
    pass: Pass,
    total: usize,
    completed: Mutex<usize>,
}

impl JsonProgress {
    pub fn new(pass: Pass, total: usize) -> Self {
        JsonProgress { pass, total, completed: Mutex::new(0) }
    }
}

impl ProgressSink for JsonProgress {
    fn item_completed(&self) {
        let mut completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        *completed += 1;
        Progress::new(self.pass, *completed, self.total, "processing").emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_pass_key() {
        let json = serde_json::to_value(Progress::new(Pass::Adjust, 3, 4, "processing")).unwrap();
        assert_eq!(json["pass"], "adjust");
        assert!(json.get("stage").is_none());
        assert_eq!(json["completed"], 3);
        assert_eq!(json["total"], 4);
        assert_eq!(json["progress"], 75.0);
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn complete_record() {
        let json = serde_json::to_value(Progress::complete(7, Path::new("/out"))).unwrap();
        assert_eq!(json["pass"], "complete");
        assert_eq!(json["completed"], 7);
        assert_eq!(json["progress"], 100.0);
        assert_eq!(json["status"], "complete: saved 7 pictures into /out");
    }

    #[test]
    fn complete_record_for_empty_run_is_full() {
        assert_eq!(Progress::complete(0, Path::new("/out")).progress, 100.0);
    }

    #[test]
    fn error_record_does_not_claim_progress() {
        let json = serde_json::to_value(Progress::failed("frame_002.png | corrupt")).unwrap();
        assert_eq!(json["pass"], "error");
        assert_eq!(json["progress"], 0.0);
        assert_eq!(json["status"], "error: frame_002.png | corrupt");
    }

    #[test]
    fn sink_counts_up() {
        let sink = JsonProgress::new(Pass::Analyze, 2);
        sink.item_completed();
        sink.item_completed();
        assert_eq!(*sink.completed.lock().unwrap(), 2);
    }
}
