//! Session records, partial and unified
//!
//! Every source reader produces one partial record per session identifier.
//! Timestamps are normalized to `DateTime<Utc>` as soon as they are read, so
//! nothing downstream ever compares epoch-millis against ISO strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Index files use this literal when a session never received a prompt.
pub const NO_PROMPT_PLACEHOLDER: &str = "No prompt";

/// Ordered string-keyed counter used for tool and facet histograms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, amount: u64) {
        match self.0.get_mut(key) {
            Some(count) => *count += amount,
            None => {
                self.0.insert(key.to_string(), amount);
            }
        }
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Key-wise sum of `other` into `self`.
    pub fn merge(&mut self, other: &Counts) {
        for (key, amount) in &other.0 {
            self.add(key, *amount);
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<'a> FromIterator<(&'a str, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (key, amount) in iter {
            counts.add(key, amount);
        }
        counts
    }
}

// ============================================
// TIMESTAMPS
// ============================================

/// Normalize a JSON timestamp that may be epoch-millis or an ISO-8601 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_millis),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Parse RFC3339, bare epoch-millis digits, or a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return from_millis(ms);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// Whole minutes between two instants, rounded to nearest.
pub fn duration_minutes(
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
) -> Option<i64> {
    let (first, last) = (first?, last?);
    let millis = (last - first).num_milliseconds() as f64;
    Some((millis / 60_000.0).round() as i64)
}

/// Canonical string form: `2025-01-04T09:30:00.000Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn serialize_timestamp<S: Serializer>(
    ts: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
        None => serializer.serialize_none(),
    }
}

/// Clip to at most `max` characters (not bytes).
pub fn clip(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// ============================================
// PARTIAL RECORDS
// ============================================

/// Per-session state accumulated from the append-only history log.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub session_id: String,
    pub project_path: Option<String>,
    /// First few prompt excerpts, already clipped.
    pub prompts: Vec<String>,
    pub prompt_count: u64,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            project_path: None,
            prompts: Vec::new(),
            prompt_count: 0,
            first_timestamp: None,
            last_timestamp: None,
        }
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        duration_minutes(self.first_timestamp, self.last_timestamp)
    }
}

/// One entry of a per-project `sessions-index.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRecord {
    pub session_id: String,
    pub project_path: Option<String>,
    pub project_dir: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub message_count: u64,
    /// Raw value, possibly the "No prompt" placeholder.
    pub first_prompt: Option<String>,
    pub git_branch: Option<String>,
    pub summary: Option<String>,
}

impl IndexRecord {
    /// First prompt with the placeholder treated as absent.
    pub fn prompt(&self) -> Option<&str> {
        self.first_prompt
            .as_deref()
            .filter(|p| !p.is_empty() && *p != NO_PROMPT_PLACEHOLDER)
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        duration_minutes(self.created, self.modified)
    }
}

/// Summary produced by a full scan of one transcript file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptRecord {
    pub session_id: String,
    pub source_path: PathBuf,
    pub project_path: Option<String>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub user_message_count: u64,
    pub assistant_message_count: u64,
    pub first_prompt: Option<String>,
    pub tools_used: Counts,
    pub models: BTreeSet<String>,
    pub total_output_tokens: u64,
    pub total_input_tokens: u64,
    pub git_commits: u64,
    pub version: Option<String>,
    pub git_branch: Option<String>,
    pub permission_mode: Option<String>,
    pub slug: Option<String>,
}

impl TranscriptRecord {
    pub fn empty(session_id: impl Into<String>, source_path: PathBuf) -> Self {
        Self {
            session_id: session_id.into(),
            source_path,
            ..Default::default()
        }
    }

    pub fn has_turns(&self) -> bool {
        self.user_message_count > 0 || self.assistant_message_count > 0
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        duration_minutes(self.first_timestamp, self.last_timestamp)
    }
}

/// A qualitative annotation of one session. Fields are freeform, so the raw
/// object is kept and read through typed accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetRecord {
    pub session_id: String,
    pub data: Value,
}

impl FacetRecord {
    /// A categorical string field, e.g. `outcome`.
    pub fn category(&self, field: &str) -> Option<&str> {
        self.data
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// A field that is itself a small `{key: count}` histogram.
    pub fn histogram(&self, field: &str) -> Option<Counts> {
        let object = self.data.get(field)?.as_object()?;
        Some(
            object
                .iter()
                .map(|(k, v)| (k.as_str(), count_value(v)))
                .collect(),
        )
    }
}

/// Non-negative count from a JSON number; anything else is zero.
pub(crate) fn count_value(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
        .unwrap_or(0)
}

/// The aggregate totals record. Kept raw so it can be echoed into the report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRecord {
    pub raw: Value,
}

impl StatsRecord {
    pub fn total_sessions(&self) -> u64 {
        self.raw.get("totalSessions").map(count_value).unwrap_or(0)
    }

    pub fn total_messages(&self) -> u64 {
        self.raw.get("totalMessages").map(count_value).unwrap_or(0)
    }

    pub fn first_session_date(&self) -> Option<&str> {
        self.raw.get("firstSessionDate").and_then(|v| v.as_str())
    }

    /// Cutoff before which sessions were not tracked.
    pub fn tracking_start(&self) -> Option<DateTime<Utc>> {
        self.raw.get("firstSessionDate").and_then(parse_timestamp)
    }
}

// ============================================
// UNIFIED SESSION
// ============================================

/// Which source supplied a unified session's skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Transcript,
    Index,
    History,
    FacetOnly,
}


/// One reconciled session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedSession {
    pub session_id: String,
    pub source: SourceKind,
    #[serde(serialize_with = "serialize_timestamp")]
    pub first_timestamp: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub last_timestamp: Option<DateTime<Utc>>,
    pub user_message_count: u64,
    pub assistant_message_count: u64,
    pub first_prompt: Option<String>,
    pub tools_used: Counts,
    pub models: Vec<String>,
    pub total_output_tokens: u64,
    pub total_input_tokens: u64,
    pub git_commits: u64,
    pub duration_minutes: Option<i64>,
    pub version: Option<String>,
    pub git_branch: Option<String>,
    pub permission_mode: Option<String>,
    pub slug: Option<String>,
    pub project_path: Option<String>,
    pub index_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_prompts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_prompt_count: Option<u64>,
    pub has_facet: bool,
    pub facet: Option<Value>,
}

impl UnifiedSession {
    /// Skeleton with every counter zero and every optional field null.
    pub fn bare(session_id: impl Into<String>, source: SourceKind) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            first_timestamp: None,
            last_timestamp: None,
            user_message_count: 0,
            assistant_message_count: 0,
            first_prompt: None,
            tools_used: Counts::new(),
            models: Vec::new(),
            total_output_tokens: 0,
            total_input_tokens: 0,
            git_commits: 0,
            duration_minutes: None,
            version: None,
            git_branch: None,
            permission_mode: None,
            slug: None,
            project_path: None,
            index_summary: None,
            history_prompts: None,
            history_prompt_count: None,
            has_facet: false,
            facet: None,
        }
    }

    pub fn total_messages(&self) -> u64 {
        self.user_message_count + self.assistant_message_count
    }

    /// Prompts attributed to this session: history's count when known.
    pub fn prompt_count(&self) -> u64 {
        match self.history_prompt_count {
            Some(count) if count > 0 => count,
            _ => self.user_message_count,
        }
    }
}
