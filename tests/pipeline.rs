use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use insightful::config::Config;
use insightful::pipeline;

fn write_lines(path: &Path, lines: &[Value]) {
    let mut body = String::new();
    for line in lines {
        body.push_str(&line.to_string());
        body.push('\n');
    }
    fs::write(path, body).unwrap();
}

fn tool_use(name: &str, command: &str) -> Value {
    json!({"type": "tool_use", "name": name, "input": {"command": command}})
}

fn assistant(ts: &str, output_tokens: u64, content: Vec<Value>) -> Value {
    json!({
        "type": "assistant",
        "timestamp": ts,
        "message": {
            "model": "claude-sonnet-4",
            "usage": {"input_tokens": 10, "output_tokens": output_tokens},
            "content": content
        }
    })
}

fn user(ts: &str, text: &str) -> Value {
    json!({
        "type": "user",
        "timestamp": ts,
        "cwd": "/work/app",
        "version": "1.0.40",
        "gitBranch": "main",
        "message": {"role": "user", "content": text}
    })
}

/// A claude directory with one transcript session and one history-only
/// session in the same project, an index-only session elsewhere, an empty
/// transcript, a facet and a stats cache.
fn fixture(root: &Path) {
    let app = root.join("projects").join("-work-app");
    let lib = root.join("projects").join("-work-lib");
    fs::create_dir_all(&app).unwrap();
    fs::create_dir_all(&lib).unwrap();

    write_lines(
        &app.join("sess-t.jsonl"),
        &[
            json!({"type": "file-history-snapshot", "timestamp": "2025-01-01T00:00:00Z"}),
            user("2025-02-01T10:00:00Z", "wire up the parser"),
            assistant(
                "2025-02-01T10:05:00Z",
                100,
                vec![tool_use("Bash", "git commit -m 'parser'")],
            ),
            user("2025-02-01T10:10:00Z", "now the tests"),
            assistant(
                "2025-02-01T10:20:00Z",
                100,
                vec![json!({"type": "tool_use", "name": "Read", "input": {"file_path": "a.rs"}})],
            ),
            user("2025-02-01T10:30:00Z", "ship it"),
            assistant("2025-02-01T10:40:00Z", 150, vec![]),
            assistant(
                "2025-02-01T10:45:00Z",
                150,
                vec![tool_use("Bash", "git commit --amend --no-edit")],
            ),
        ],
    );
    fs::write(
        app.join("empty.jsonl"),
        "{\"type\":\"file-history-snapshot\"}\nnot json at all\n",
    )
    .unwrap();

    fs::write(
        lib.join("sessions-index.json"),
        json!({
            "entries": [{
                "sessionId": "idx1",
                "projectPath": "/work/lib",
                "created": "2024-12-01T09:00:00Z",
                "modified": "2024-12-01T09:30:00Z",
                "messageCount": 6,
                "firstPrompt": "No prompt",
                "summary": "Lib cleanup"
            }]
        })
        .to_string(),
    )
    .unwrap();

    write_lines(
        &root.join("history.jsonl"),
        &[
            json!({"sessionId": "sess-h", "project": "/work/app", "display": "first ask"}),
            json!({"sessionId": "sess-h", "project": "/work/app", "display": "second ask"}),
            json!({"sessionId": "idx1", "project": "/work/lib", "timestamp": 1733043600000_i64, "display": "fix bug"}),
            json!({"sessionId": "idx1", "project": "/work/lib", "timestamp": 1733044200000_i64, "display": "add test"}),
        ],
    );

    let facets = root.join("usage-data").join("facets");
    fs::create_dir_all(&facets).unwrap();
    fs::write(
        facets.join("sess-t.json"),
        json!({"outcome": "fully_achieved", "friction_counts": {"wrong_approach": 1}}).to_string(),
    )
    .unwrap();

    fs::write(
        root.join("stats-cache.json"),
        json!({"totalSessions": 3, "totalMessages": 40, "firstSessionDate": "2025-01-04"})
            .to_string(),
    )
    .unwrap();
}

fn config_for(root: &Path) -> Config {
    let mut config = Config {
        claude_dir: root.to_string_lossy().to_string(),
        home_dir: Some("/nonexistent-home".to_string()),
        ..Default::default()
    };
    config.scan.workers = 2;
    config
}

async fn collect(root: &Path) -> Value {
    let report = pipeline::run(&config_for(root)).await.unwrap();
    serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap()
}

#[tokio::test]
async fn test_transcript_and_history_sessions_share_a_project() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let doc = collect(dir.path()).await;

    let app = &doc["projects"]["app"];
    assert_eq!(app["session_count"], json!(2));
    assert_eq!(app["full_path"], json!("/work/app"));
    // 3 + 4 transcript turns plus one user turn per history line
    assert_eq!(app["total_messages"], json!(9));
    assert_eq!(app["total_output_tokens"], json!(500));
    assert_eq!(app["total_hours"], json!(0.8));
    assert_eq!(app["total_prompts"], json!(5));
    assert_eq!(app["total_git_commits"], json!(1));
    assert_eq!(app["tool_totals"], json!({"Bash": 2, "Read": 1}));

    let sessions = app["sessions"].as_array().unwrap();
    // untimed history session sorts first
    assert_eq!(sessions[0]["session_id"], json!("sess-h"));
    assert_eq!(sessions[0]["source"], json!("history"));
    assert_eq!(sessions[0]["first_prompt"], json!("first ask"));
    assert_eq!(sessions[0]["first_timestamp"], Value::Null);

    let transcript = &sessions[1];
    assert_eq!(transcript["source"], json!("transcript"));
    assert_eq!(transcript["first_timestamp"], json!("2025-02-01T10:00:00.000Z"));
    assert_eq!(transcript["duration_minutes"], json!(45));
    assert_eq!(transcript["first_prompt"], json!("wire up the parser"));
    assert_eq!(transcript["git_branch"], json!("main"));
    assert_eq!(transcript["has_facet"], json!(true));
    assert_eq!(app["first_session"], Value::Null);
    assert_eq!(app["last_session"], json!("2025-02-01T10:45:00.000Z"));
}

#[tokio::test]
async fn test_empty_transcript_without_history_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let doc = collect(dir.path()).await;

    assert_eq!(doc["total_sessions_found"], json!(3));
    assert_eq!(doc["data_sources"]["transcript_files"], json!(2));
    let ids: Vec<&str> = doc["projects"]
        .as_object()
        .unwrap()
        .values()
        .flat_map(|p| p["sessions"].as_array().unwrap())
        .map(|s| s["session_id"].as_str().unwrap())
        .collect();
    assert!(!ids.contains(&"empty"));
}

#[tokio::test]
async fn test_index_session_is_back_filled_from_history() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let doc = collect(dir.path()).await;

    let lib = &doc["projects"]["lib"];
    assert_eq!(lib["session_count"], json!(1));
    let session = &lib["sessions"][0];
    assert_eq!(session["source"], json!("index"));
    assert_eq!(session["first_prompt"], json!("fix bug"));
    assert_eq!(session["history_prompts"], json!(["fix bug", "add test"]));
    assert_eq!(session["history_prompt_count"], json!(2));
    assert_eq!(session["index_summary"], json!("Lib cleanup"));
    assert_eq!(session["user_message_count"], json!(3));
    assert_eq!(session["assistant_message_count"], json!(3));
}

#[tokio::test]
async fn test_global_accounting() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let doc = collect(dir.path()).await;

    let keys: Vec<&String> = doc["projects"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["app", "lib"]);
    assert_eq!(doc["total_projects"], json!(2));
    assert_eq!(doc["total_git_commits"], json!(1));
    // 45 + 30 minutes
    assert_eq!(doc["total_hours"], json!(1.3));
    assert_eq!(doc["sessions_with_facets"], json!(1));
    assert_eq!(doc["sessions_without_facets"], json!(2));
    assert_eq!(doc["facets_summary"]["outcomes"], json!({"fully_achieved": 1}));

    let accounting = &doc["message_accounting"];
    assert_eq!(accounting["tracked_messages"], json!(40));
    assert_eq!(accounting["transcript_verified_sessions"], json!(1));
    assert_eq!(accounting["transcript_verified_messages"], json!(7));
    assert_eq!(accounting["pre_tracking_sessions"], json!(1));
    assert_eq!(accounting["pre_tracking_prompts"], json!(2));
    assert_eq!(accounting["total_user_prompts"], json!(7));

    let sources = &doc["data_sources"];
    assert_eq!(sources["history_sessions"], json!(2));
    assert_eq!(sources["history_lines"], json!(4));
    assert_eq!(sources["indexed_sessions"], json!(1));
    assert_eq!(sources["facet_files"], json!(1));
}

#[tokio::test]
async fn test_missing_claude_dir_produces_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("absent"));
    let report = pipeline::run(&config).await.unwrap();

    assert_eq!(report.total_sessions_found, 0);
    assert!(report.projects.is_empty());
    assert!(report.stats_cache.is_none());

    let output = dir.path().join("out").join("report.json");
    report.write_to(&output).unwrap();
    assert!(output.exists());
}
