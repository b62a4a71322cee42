//! Transcript probe implementation
//!
//! Scans full conversation transcripts from Claude Code CLI sessions.
//! Data format: JSONL files in ~/.claude/projects/<project_dir>/<session_id>.jsonl
//!
//! Each transcript is independent of every other, which makes one file the
//! unit of parallel fan-out in the registry.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::lines::{JsonLines, LineRecord};
use super::{SessionRef, SourceProbe, TRANSCRIPT};
use crate::model::{clip, parse_timestamp, TranscriptRecord};

/// Characters kept from the transcript's first prompt
pub const FIRST_PROMPT_CHARS: usize = 300;

static GIT_COMMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)git\s+commit\b").unwrap());
static AMEND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)--amend").unwrap());

/// True for a shell command that creates a new commit (amends excluded)
pub fn is_git_commit(command: &str) -> bool {
    GIT_COMMIT.is_match(command) && !AMEND.is_match(command)
}

#[derive(Debug, Clone)]
pub struct TranscriptProbe {
    base_path: PathBuf,
}

impl TranscriptProbe {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Find every transcript file, one per session id. Project directories
    /// are walked in name order and a later duplicate replaces an earlier one.
    pub fn discover(&self) -> Result<Vec<SessionRef>> {
        if !self.base_path.exists() {
            return Ok(vec![]);
        }

        let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
        for entry in WalkDir::new(&self.base_path)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file_path = entry.path();
            if !entry.file_type().is_file()
                || file_path.extension().map(|e| e != "jsonl").unwrap_or(true)
            {
                continue;
            }
            if let Some(session_id) = file_path.file_stem().and_then(|s| s.to_str()) {
                found.insert(session_id.to_string(), file_path.to_path_buf());
            }
        }

        Ok(found
            .into_iter()
            .map(|(id, source_path)| SessionRef { id, source_path })
            .collect())
    }

    /// Scan one transcript; an unopenable file counts as present but empty.
    pub fn scan_or_empty(&self, session: &SessionRef) -> TranscriptRecord {
        match JsonLines::open(&session.source_path) {
            Ok(lines) => scan_lines(session, lines),
            Err(err) => {
                debug!(session = %session.id, error = %err, "transcript unreadable");
                TranscriptRecord::empty(&session.id, session.source_path.clone())
            }
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn scan_lines<I>(session: &SessionRef, lines: I) -> TranscriptRecord
where
    I: Iterator<Item = LineRecord<Value>>,
{
    let mut meta = TranscriptRecord::empty(&session.id, session.source_path.clone());

    for json in lines.filter_map(LineRecord::into_record) {
        let entry_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if entry_type == "file-history-snapshot" {
            continue;
        }

        if let Some(ts) = json.get("timestamp").and_then(parse_timestamp) {
            if meta.first_timestamp.map_or(true, |first| ts < first) {
                meta.first_timestamp = Some(ts);
            }
            if meta.last_timestamp.map_or(true, |last| ts > last) {
                meta.last_timestamp = Some(ts);
            }
        }

        if meta.project_path.is_none() {
            meta.project_path = str_field(&json, "cwd");
        }

        match entry_type {
            "user" => observe_user(&mut meta, &json),
            "assistant" => observe_assistant(&mut meta, &json),
            _ => {}
        }
    }

    meta
}

fn observe_user(meta: &mut TranscriptRecord, json: &Value) {
    meta.user_message_count += 1;

    if meta.first_prompt.is_none() {
        meta.first_prompt = json
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|content| match content {
                Value::Null => None,
                Value::String(text) if text.is_empty() => None,
                Value::String(text) => Some(clip(text, FIRST_PROMPT_CHARS)),
                other => Some(clip(&other.to_string(), FIRST_PROMPT_CHARS)),
            });
    }

    if meta.version.is_none() {
        meta.version = str_field(json, "version");
    }
    if meta.git_branch.is_none() {
        meta.git_branch = str_field(json, "gitBranch");
    }
    if meta.permission_mode.is_none() {
        meta.permission_mode = str_field(json, "permissionMode");
    }
    if meta.slug.is_none() {
        meta.slug = str_field(json, "slug");
    }
}

fn observe_assistant(meta: &mut TranscriptRecord, json: &Value) {
    meta.assistant_message_count += 1;

    let Some(message) = json.get("message") else {
        return;
    };

    if let Some(model) = message.get("model").and_then(|v| v.as_str()) {
        meta.models.insert(model.to_string());
    }

    if let Some(usage) = message.get("usage") {
        meta.total_output_tokens += usage
            .get("output_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        meta.total_input_tokens += usage
            .get("input_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
    }

    let Some(blocks) = message.get("content").and_then(|c| c.as_array()) else {
        return;
    };
    for block in blocks {
        if block.get("type").and_then(|t| t.as_str()) != Some("tool_use") {
            continue;
        }
        let Some(name) = block.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        meta.tools_used.increment(name);

        if name.eq_ignore_ascii_case("bash") {
            let input = block.get("input");
            let command = input
                .and_then(|i| i.get("command"))
                .and_then(|v| v.as_str())
                .or_else(|| input.and_then(|i| i.get("cmd")).and_then(|v| v.as_str()))
                .unwrap_or("");
            if is_git_commit(command) {
                meta.git_commits += 1;
            }
        }
    }
}

impl SourceProbe for TranscriptProbe {
    fn id(&self) -> &str {
        TRANSCRIPT
    }

    fn description(&self) -> &str {
        "Claude Code session transcripts (<session>.jsonl)"
    }

    fn path(&self) -> &Path {
        &self.base_path
    }
}
