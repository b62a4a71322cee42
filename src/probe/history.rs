//! History probe implementation
//!
//! Reads the append-only prompt log.
//! Data format: ~/.claude/history.jsonl, one object per prompt with
//! `sessionId`, `project`, `timestamp` (epoch-millis) and `display`.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::info;

use super::lines::{JsonLines, LineRecord};
use super::{SourceProbe, SourceReader, HISTORY};
use crate::model::{clip, parse_timestamp, HistoryRecord};

/// Prompt excerpts retained per session
pub const MAX_RETAINED_PROMPTS: usize = 3;
/// Characters kept from each retained prompt
pub const PROMPT_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryLine {
    session_id: Option<String>,
    #[serde(default)]
    project: Value,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    display: Value,
}

/// Per-session history plus how many lines the log held
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    pub sessions: HashMap<String, HistoryRecord>,
    pub lines_read: u64,
}

impl HistoryLog {
    pub fn get(&self, session_id: &str) -> Option<&HistoryRecord> {
        self.sessions.get(session_id)
    }

    fn observe(&mut self, line: HistoryLine) {
        let Some(session_id) = line.session_id.filter(|id| !id.is_empty()) else {
            return;
        };
        let record = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| HistoryRecord::new(session_id));

        if let Some(ts) = parse_timestamp(&line.timestamp) {
            if record.first_timestamp.map_or(true, |first| ts < first) {
                record.first_timestamp = Some(ts);
            }
            if record.last_timestamp.map_or(true, |last| ts > last) {
                record.last_timestamp = Some(ts);
            }
        }
        record.prompt_count += 1;

        if let Some(display) = line.display.as_str().filter(|d| !d.is_empty()) {
            if record.prompts.len() < MAX_RETAINED_PROMPTS {
                record.prompts.push(clip(display, PROMPT_EXCERPT_CHARS));
            }
        }
        if record.project_path.is_none() {
            record.project_path = line
                .project
                .as_str()
                .filter(|p| !p.is_empty())
                .map(String::from);
        }
    }
}

/// Fold a line stream into per-session history records
fn fold_history<R: BufRead>(lines: &mut JsonLines<R, HistoryLine>) -> HistoryLog {
    let mut log = HistoryLog::default();
    for record in lines.by_ref() {
        if let LineRecord::Record(line) = record {
            log.observe(line);
        }
    }
    log.lines_read = lines.lines_read();
    log
}

#[derive(Debug, Clone)]
pub struct HistoryProbe {
    path: PathBuf,
}

impl HistoryProbe {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SourceProbe for HistoryProbe {
    fn id(&self) -> &str {
        HISTORY
    }

    fn description(&self) -> &str {
        "Prompt history log (history.jsonl)"
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceReader for HistoryProbe {
    type Output = HistoryLog;

    fn read(&self) -> Result<HistoryLog> {
        let mut lines = JsonLines::open(&self.path)?;
        let log = fold_history(&mut lines);
        info!(
            source = HISTORY,
            lines = log.lines_read,
            sessions = log.sessions.len(),
            "history loaded"
        );
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format_timestamp;
    use std::io::Cursor;

    fn fold(input: &str) -> HistoryLog {
        fold_history(&mut JsonLines::new(Cursor::new(input.to_string())))
    }

    #[test]
    fn test_history_accumulates_per_session() {
        let log = fold(concat!(
            "{\"sessionId\":\"s1\",\"project\":\"/work/app\",\"timestamp\":1735983000000,\"display\":\"fix bug\"}\n",
            "{\"sessionId\":\"s1\",\"timestamp\":1735982000000,\"display\":\"add test\"}\n",
            "garbage\n",
            "{\"sessionId\":\"s2\",\"timestamp\":1735990000000,\"display\":\"\"}\n",
            "{\"project\":\"/no/session\",\"display\":\"orphan\"}\n",
        ));

        assert_eq!(log.lines_read, 5);
        assert_eq!(log.sessions.len(), 2);

        let s1 = log.get("s1").unwrap();
        assert_eq!(s1.prompt_count, 2);
        assert_eq!(s1.prompts, vec!["fix bug", "add test"]);
        assert_eq!(s1.project_path.as_deref(), Some("/work/app"));
        assert_eq!(
            format_timestamp(&s1.first_timestamp.unwrap()),
            "2025-01-04T09:13:20.000Z"
        );
        assert_eq!(s1.duration_minutes(), Some(17));

        let s2 = log.get("s2").unwrap();
        assert_eq!(s2.prompt_count, 1);
        assert!(s2.prompts.is_empty());
    }

    #[test]
    fn test_non_string_fields_still_count_the_prompt() {
        let log = fold(concat!(
            "{\"sessionId\":\"s\",\"project\":42,\"display\":{\"text\":\"pasted\"}}\n",
            "{\"sessionId\":\"s\",\"project\":\"/work/app\",\"display\":\"second\"}\n",
        ));
        let record = log.get("s").unwrap();
        assert_eq!(record.prompt_count, 2);
        assert_eq!(record.prompts, vec!["second"]);
        assert_eq!(record.project_path.as_deref(), Some("/work/app"));
    }

    #[test]
    fn test_history_retains_three_clipped_prompts() {
        let long = "x".repeat(500);
        let input: String = (0..5)
            .map(|i| format!("{{\"sessionId\":\"s\",\"timestamp\":{},\"display\":\"{}\"}}\n", 1_000 + i, long))
            .collect();
        let log = fold(&input);
        let record = log.get("s").unwrap();
        assert_eq!(record.prompt_count, 5);
        assert_eq!(record.prompts.len(), MAX_RETAINED_PROMPTS);
        assert!(record.prompts.iter().all(|p| p.chars().count() == PROMPT_EXCERPT_CHARS));
    }

    #[test]
    fn test_missing_file_is_an_error_for_the_registry_to_absorb() {
        let probe = HistoryProbe::new(PathBuf::from("/definitely/not/here/history.jsonl"));
        assert!(!probe.is_available());
        assert!(probe.read().is_err());
    }
}
