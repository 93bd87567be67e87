//! Purpose: Stable schema for non-fatal stderr notices (e.g. skipped lines).
//! Exports: `Notice`, `notice_json`.
//! Role: Shared contract helper for CLI diagnostics that do not abort a run.
//! Invariants: Notices never alter the output document.
//! Invariants: JSON fields are additive-only once published.
use serde_json::{Map, Value, json};

use crate::extract::SkippedLine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub input: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn skipped_line(skipped: &SkippedLine, input: &str, time: String) -> Self {
        let mut details = Map::new();
        details.insert("line".to_string(), json!(skipped.line));
        details.insert("snippet".to_string(), json!(skipped.snippet));
        Self {
            kind: "skip".to_string(),
            time,
            cmd: "convert".to_string(),
            input: input.to_string(),
            message: format!("skipped line {}: {}", skipped.line, skipped.message),
            details,
        }
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    json!({
        "notice": {
            "kind": notice.kind,
            "time": notice.time,
            "cmd": notice.cmd,
            "input": notice.input,
            "message": notice.message,
            "details": Value::Object(notice.details.clone()),
        }
    })
}
