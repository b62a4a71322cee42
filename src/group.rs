//! Partition unified sessions into project buckets
//!
//! A session's bucket is the label derived from its project-path hint.
//! Inside a bucket sessions are ordered by first activity, oldest first,
//! with sessions that have no timestamp at the front.

use std::collections::BTreeMap;
use std::path::Path;

use crate::model::UnifiedSession;

/// Label for sessions with no resolvable path
pub const UNKNOWN_LABEL: &str = "unknown";
/// Label for sessions run directly in the actor's home directory
pub const HOME_LABEL: &str = "home";

/// Folder names too generic to identify a project on their own
const GENERIC_SEGMENTS: [&str; 5] = ["code", "projects", "src", "dev", "repos"];

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_end_matches('/').to_string()
}

/// Derives short project labels from filesystem paths.
#[derive(Debug, Clone, Default)]
pub struct ProjectLabeler {
    home: Option<String>,
}

impl ProjectLabeler {
    pub fn new(home: Option<&Path>) -> Self {
        Self {
            home: home.map(|h| normalize(&h.to_string_lossy())),
        }
    }

    /// `/home/u/work/my-app` → `my-app`, `/home/u/code` → `u/code`
    pub fn label(&self, path: Option<&str>) -> String {
        let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
            return UNKNOWN_LABEL.to_string();
        };
        let norm = normalize(path);
        if self.home.as_deref() == Some(norm.as_str()) {
            return HOME_LABEL.to_string();
        }

        let parts: Vec<&str> = norm.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [] => UNKNOWN_LABEL.to_string(),
            [.., parent, last] if GENERIC_SEGMENTS.contains(&last.to_lowercase().as_str()) => {
                format!("{}/{}", parent, last)
            }
            [.., last] => last.to_string(),
        }
    }
}

/// A project label with its chronologically ordered sessions
#[derive(Debug, Clone)]
pub struct ProjectBucket {
    pub label: String,
    pub full_path: String,
    pub sessions: Vec<UnifiedSession>,
}

/// Group sessions by project label. Buckets come back in label order.
pub fn group_sessions(
    sessions: Vec<UnifiedSession>,
    labeler: &ProjectLabeler,
) -> Vec<ProjectBucket> {
    let mut buckets: BTreeMap<String, Vec<UnifiedSession>> = BTreeMap::new();
    for session in sessions {
        let label = labeler.label(session.project_path.as_deref());
        buckets.entry(label).or_default().push(session);
    }

    buckets
        .into_iter()
        .map(|(label, mut sessions)| {
            // stable sort; `None < Some(_)` puts untimed sessions first
            sessions.sort_by(|a, b| a.first_timestamp.cmp(&b.first_timestamp));
            let full_path = sessions
                .iter()
                .find_map(|s| s.project_path.clone())
                .unwrap_or_default();
            ProjectBucket {
                label,
                full_path,
                sessions,
            }
        })
        .collect()
}
