//! Merge partial per-source records into one unified session per identifier
//!
//! The skeleton comes from the highest-precedence source that applies (see
//! [`PRECEDENCE`]). Remaining sources then back-fill fields the skeleton left
//! null; they never overwrite a value the skeleton set.

use std::collections::{BTreeSet, HashMap};
use tracing::info;

use crate::model::{
    FacetRecord, HistoryRecord, IndexRecord, SourceKind, TranscriptRecord, UnifiedSession,
};
use crate::probe::SourceSet;

/// Everything known about one session identifier, borrowed from the sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionInputs<'a> {
    pub history: Option<&'a HistoryRecord>,
    pub index: Option<&'a IndexRecord>,
    pub transcript: Option<&'a TranscriptRecord>,
    pub facet: Option<&'a FacetRecord>,
}

/// Result of asking one precedence rule for a skeleton
#[derive(Debug)]
pub enum RuleOutcome {
    /// The rule applies and built the skeleton
    Build(UnifiedSession),
    /// The rule does not apply; try the next one
    Skip,
    /// The identifier produces no session at all
    Drop,
}

type Rule = fn(&str, &SessionInputs<'_>) -> RuleOutcome;

/// Skeleton precedence, highest first.
pub const PRECEDENCE: [(SourceKind, Rule); 4] = [
    (SourceKind::Transcript, from_transcript),
    (SourceKind::Index, from_index),
    (SourceKind::History, from_history),
    (SourceKind::FacetOnly, from_facet),
];

/// A transcript with turns builds the skeleton. An empty transcript falls
/// back to history when history saw at least one prompt, otherwise the
/// identifier is dropped.
fn from_transcript(session_id: &str, inputs: &SessionInputs<'_>) -> RuleOutcome {
    let Some(transcript) = inputs.transcript else {
        return RuleOutcome::Skip;
    };
    if transcript.has_turns() {
        return RuleOutcome::Build(transcript_skeleton(session_id, transcript));
    }
    match inputs.history {
        Some(history) if history.prompt_count > 0 => {
            RuleOutcome::Build(history_skeleton(session_id, history))
        }
        _ => RuleOutcome::Drop,
    }
}

fn from_index(session_id: &str, inputs: &SessionInputs<'_>) -> RuleOutcome {
    match inputs.index {
        Some(index) => RuleOutcome::Build(index_skeleton(session_id, index)),
        None => RuleOutcome::Skip,
    }
}

fn from_history(session_id: &str, inputs: &SessionInputs<'_>) -> RuleOutcome {
    match inputs.history {
        Some(history) => RuleOutcome::Build(history_skeleton(session_id, history)),
        None => RuleOutcome::Skip,
    }
}

fn from_facet(session_id: &str, inputs: &SessionInputs<'_>) -> RuleOutcome {
    match inputs.facet {
        Some(_) => RuleOutcome::Build(UnifiedSession::bare(session_id, SourceKind::FacetOnly)),
        None => RuleOutcome::Skip,
    }
}

fn transcript_skeleton(session_id: &str, t: &TranscriptRecord) -> UnifiedSession {
    UnifiedSession {
        first_timestamp: t.first_timestamp,
        last_timestamp: t.last_timestamp,
        user_message_count: t.user_message_count,
        assistant_message_count: t.assistant_message_count,
        first_prompt: t.first_prompt.clone(),
        tools_used: t.tools_used.clone(),
        models: t.models.iter().cloned().collect(),
        total_output_tokens: t.total_output_tokens,
        total_input_tokens: t.total_input_tokens,
        git_commits: t.git_commits,
        duration_minutes: t.duration_minutes(),
        version: t.version.clone(),
        git_branch: t.git_branch.clone(),
        permission_mode: t.permission_mode.clone(),
        slug: t.slug.clone(),
        ..UnifiedSession::bare(session_id, SourceKind::Transcript)
    }
}

/// Index only knows a combined message count, split between the two roles.
fn index_skeleton(session_id: &str, index: &IndexRecord) -> UnifiedSession {
    let total = index.message_count;
    UnifiedSession {
        first_timestamp: index.created,
        last_timestamp: index.modified,
        user_message_count: total / 2,
        assistant_message_count: total - total / 2,
        first_prompt: index.prompt().map(String::from),
        duration_minutes: index.duration_minutes(),
        git_branch: index.git_branch.clone(),
        index_summary: index.summary.clone(),
        ..UnifiedSession::bare(session_id, SourceKind::Index)
    }
}

/// History cannot see assistant turns, so that count stays zero.
fn history_skeleton(session_id: &str, history: &HistoryRecord) -> UnifiedSession {
    UnifiedSession {
        first_timestamp: history.first_timestamp,
        last_timestamp: history.last_timestamp,
        user_message_count: history.prompt_count,
        first_prompt: history.prompts.first().cloned(),
        duration_minutes: history.duration_minutes(),
        history_prompts: Some(history.prompts.clone()),
        history_prompt_count: Some(history.prompt_count),
        ..UnifiedSession::bare(session_id, SourceKind::History)
    }
}

/// Pick the skeleton by walking the precedence table.
pub fn select_skeleton(session_id: &str, inputs: &SessionInputs<'_>) -> Option<UnifiedSession> {
    for (_, rule) in PRECEDENCE.iter() {
        match rule(session_id, inputs) {
            RuleOutcome::Build(session) => return Some(session),
            RuleOutcome::Skip => continue,
            RuleOutcome::Drop => return None,
        }
    }
    None
}

/// Fill fields the skeleton left null from the other sources.
fn back_fill(session: &mut UnifiedSession, inputs: &SessionInputs<'_>) {
    if let Some(history) = inputs.history {
        if session.first_prompt.is_none() {
            session.first_prompt = history.prompts.first().cloned();
        }
        session.history_prompts = Some(history.prompts.clone());
        session.history_prompt_count = Some(history.prompt_count);
        if session.first_timestamp.is_none() {
            session.first_timestamp = history.first_timestamp;
        }
        if session.last_timestamp.is_none() {
            session.last_timestamp = history.last_timestamp;
        }
    }

    if let Some(index) = inputs.index {
        if session.index_summary.is_none() {
            session.index_summary = index.summary.clone();
        }
        if session.first_prompt.is_none() {
            session.first_prompt = index.prompt().map(String::from);
        }
    }

    session.has_facet = inputs.facet.is_some();
    session.facet = inputs.facet.map(|f| f.data.clone());
}

/// Project-path hint: transcript, then index, then history.
fn project_path(inputs: &SessionInputs<'_>) -> Option<String> {
    inputs
        .transcript
        .and_then(|t| t.project_path.clone())
        .or_else(|| inputs.index.and_then(|i| i.project_path.clone()))
        .or_else(|| inputs.history.and_then(|h| h.project_path.clone()))
}

/// Build the unified session for one identifier, or `None` if it is dropped.
pub fn reconcile_one(session_id: &str, inputs: &SessionInputs<'_>) -> Option<UnifiedSession> {
    let mut session = select_skeleton(session_id, inputs)?;
    back_fill(&mut session, inputs);
    session.project_path = project_path(inputs);
    Some(session)
}

/// One unified session per identifier seen in any keyed source.
pub fn reconcile(sources: &SourceSet) -> Vec<UnifiedSession> {
    let facets: HashMap<&str, &FacetRecord> = sources
        .facets
        .iter()
        .map(|f| (f.session_id.as_str(), f))
        .collect();

    let ids: BTreeSet<&str> = sources
        .history
        .sessions
        .keys()
        .chain(sources.index.keys())
        .chain(sources.transcripts.keys())
        .map(String::as_str)
        .chain(facets.keys().copied())
        .collect();

    let sessions: Vec<UnifiedSession> = ids
        .iter()
        .filter_map(|id| {
            let inputs = SessionInputs {
                history: sources.history.get(id),
                index: sources.index.get(*id),
                transcript: sources.transcripts.get(*id),
                facet: facets.get(id).copied(),
            };
            reconcile_one(id, &inputs)
        })
        .collect();

    info!(
        identifiers = ids.len(),
        sessions = sessions.len(),
        dropped = ids.len() - sessions.len(),
        "sources reconciled"
    );
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp_str;
    use serde_json::json;
    use std::path::PathBuf;

    fn history(prompts: &[&str]) -> HistoryRecord {
        HistoryRecord {
            prompts: prompts.iter().map(|p| p.to_string()).collect(),
            prompt_count: prompts.len() as u64,
            ..HistoryRecord::new("s1")
        }
    }

    fn transcript(user: u64, assistant: u64, prompt: Option<&str>) -> TranscriptRecord {
        TranscriptRecord {
            user_message_count: user,
            assistant_message_count: assistant,
            first_prompt: prompt.map(String::from),
            ..TranscriptRecord::empty("s1", PathBuf::from("s1.jsonl"))
        }
    }

    fn index(message_count: u64, prompt: &str) -> IndexRecord {
        IndexRecord {
            session_id: "s1".into(),
            message_count,
            first_prompt: Some(prompt.to_string()),
            summary: Some("index summary".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_precedence_order() {
        let kinds: Vec<SourceKind> = PRECEDENCE.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Transcript,
                SourceKind::Index,
                SourceKind::History,
                SourceKind::FacetOnly
            ]
        );
    }

    #[test]
    fn test_transcript_prompt_beats_index_prompt() {
        let t = transcript(1, 1, Some("from transcript"));
        let i = index(4, "from index");
        let inputs = SessionInputs {
            transcript: Some(&t),
            index: Some(&i),
            ..Default::default()
        };
        let session = reconcile_one("s1", &inputs).unwrap();
        assert_eq!(session.source, SourceKind::Transcript);
        assert_eq!(session.first_prompt.as_deref(), Some("from transcript"));
        // Back-fill still applies to fields the transcript does not carry
        assert_eq!(session.index_summary.as_deref(), Some("index summary"));
    }

    #[test]
    fn test_empty_transcript_without_history_is_dropped() {
        let t = transcript(0, 0, None);
        let i = index(4, "from index");
        let inputs = SessionInputs {
            transcript: Some(&t),
            index: Some(&i),
            ..Default::default()
        };
        assert!(reconcile_one("s1", &inputs).is_none());
    }

    #[test]
    fn test_empty_transcript_falls_back_to_history() {
        let t = transcript(0, 0, None);
        let h = history(&["hello"]);
        let inputs = SessionInputs {
            transcript: Some(&t),
            history: Some(&h),
            ..Default::default()
        };
        let session = reconcile_one("s1", &inputs).unwrap();
        assert_eq!(session.source, SourceKind::History);
        assert_eq!(session.user_message_count, 1);
        assert_eq!(session.assistant_message_count, 0);
    }

    #[test]
    fn test_index_placeholder_back_filled_from_history() {
        let i = index(5, "No prompt");
        let h = history(&["fix bug", "add test"]);
        let inputs = SessionInputs {
            index: Some(&i),
            history: Some(&h),
            ..Default::default()
        };
        let session = reconcile_one("s1", &inputs).unwrap();
        assert_eq!(session.source, SourceKind::Index);
        assert_eq!(session.first_prompt.as_deref(), Some("fix bug"));
        assert_eq!(session.user_message_count, 2);
        assert_eq!(session.assistant_message_count, 3);
        assert_eq!(session.history_prompt_count, Some(2));
    }

    #[test]
    fn test_history_timestamps_fill_index_gaps_only() {
        let mut i = index(2, "hi");
        i.created = parse_timestamp_str("2025-02-01T10:00:00Z");
        let mut h = history(&["hi"]);
        h.first_timestamp = parse_timestamp_str("2025-01-01T10:00:00Z");
        h.last_timestamp = parse_timestamp_str("2025-01-01T11:00:00Z");
        let inputs = SessionInputs {
            index: Some(&i),
            history: Some(&h),
            ..Default::default()
        };
        let session = reconcile_one("s1", &inputs).unwrap();
        assert_eq!(session.first_timestamp, i.created);
        assert_eq!(session.last_timestamp, h.last_timestamp);
    }

    #[test]
    fn test_facet_only_session_is_kept() {
        let facet = FacetRecord {
            session_id: "s1".into(),
            data: json!({"outcome": "achieved"}),
        };
        let inputs = SessionInputs {
            facet: Some(&facet),
            ..Default::default()
        };
        let session = reconcile_one("s1", &inputs).unwrap();
        assert_eq!(session.source, SourceKind::FacetOnly);
        assert!(session.has_facet);
        assert_eq!(session.total_messages(), 0);
        assert_eq!(session.facet, Some(json!({"outcome": "achieved"})));
    }

    #[test]
    fn test_project_path_prefers_transcript_then_index() {
        let t = transcript(1, 0, None);
        let mut i = index(2, "x");
        let mut h = history(&["x"]);
        h.project_path = Some("/from/history".into());
        i.project_path = Some("/from/index".into());
        let inputs = SessionInputs {
            transcript: Some(&t),
            index: Some(&i),
            history: Some(&h),
            ..Default::default()
        };
        assert_eq!(project_path(&inputs).as_deref(), Some("/from/index"));

        let with_cwd = TranscriptRecord {
            project_path: Some("/from/transcript".into()),
            ..t.clone()
        };
        let inputs = SessionInputs {
            transcript: Some(&with_cwd),
            ..inputs
        };
        assert_eq!(project_path(&inputs).as_deref(), Some("/from/transcript"));
    }

    #[test]
    fn test_reconcile_covers_union_of_sources() {
        let mut sources = SourceSet::default();
        sources.history.sessions.insert("h".into(), {
            let mut h = history(&["p"]);
            h.session_id = "h".into();
            h
        });
        sources.index.insert("i".into(), index(2, "x"));
        sources.transcripts.insert("empty".into(), transcript(0, 0, None));
        sources.facets.push(FacetRecord {
            session_id: "f".into(),
            data: json!({}),
        });

        let ids: Vec<String> = reconcile(&sources)
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["f", "h", "i"]);
    }
}
