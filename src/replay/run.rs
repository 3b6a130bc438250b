//! Replay run assembly.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::commit::{CommitInfo, commit_from_payload};
use super::steps::{Step, decompose};

/// One complete build-and-replay cycle tied to a single commit.
///
/// Owned by the pipeline while active; everyone else sees read-only clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
    pub commit: CommitInfo,
    pub created_at: DateTime<Utc>,
    pub site_entry: String,
    pub stylesheets: Vec<String>,
    pub steps: Vec<Step>,
}

impl Run {
    /// Server-side estimate of the replay duration, before the presentation
    /// buffer: the sum of each step's display time, falling back to its
    /// scheduling delay. Independent of actual client rendering speed.
    pub fn estimated_duration_ms(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| step.estimated_ms.unwrap_or(step.delay_ms))
            .sum()
    }
}

/// Derive a run from a change notification and the entry document contents.
///
/// Returns `None` when the payload has no derivable commit - nothing to
/// replay.
pub fn build_run(payload: &Value, entry_path: &Path, html: &str) -> Option<Run> {
    let commit = commit_from_payload(payload)?;
    let plan = decompose(html);
    let created_at = Utc::now();
    let short_sha: String = commit.sha.chars().take(7).collect();

    Some(Run {
        // Time plus short sha: unique across concurrent builds in one
        // process lifetime without a central counter.
        run_id: format!("{}-{}", created_at.timestamp_millis(), short_sha),
        commit,
        created_at,
        site_entry: entry_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry_path.display().to_string()),
        stylesheets: plan.stylesheets,
        steps: plan.steps,
    })
}

/// [`build_run`] with the entry document read from disk. A missing or
/// unreadable document propagates as an error; the pipeline converts it into
/// a log line and an idle phase.
pub async fn create_replay_run(payload: &Value, entry_path: &Path) -> Result<Option<Run>> {
    if commit_from_payload(payload).is_none() {
        return Ok(None);
    }

    let html = tokio::fs::read_to_string(entry_path)
        .await
        .with_context(|| format!("failed to read site entry {}", entry_path.display()))?;

    Ok(build_run(payload, entry_path, &html))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::demo_payload;
    use serde_json::json;
    use std::io::Write;

    const HTML: &str = r#"<html><head><link rel="stylesheet" href="styles.css"></head>
<body><h1 class="title">Hi</h1><p id="p1">There</p></body></html>"#;

    #[test]
    fn test_build_run_from_demo_payload() {
        let payload = demo_payload();
        let run = build_run(&payload, Path::new("/srv/site/index.html"), HTML).unwrap();

        assert_eq!(run.site_entry, "index.html");
        assert_eq!(run.stylesheets, vec!["styles.css"]);
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.commit.branch, "main");

        // "{millis}-{7-char sha}"
        let (millis, sha) = run.run_id.split_once('-').unwrap();
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(sha.len(), 7);
        assert!(run.commit.sha.starts_with(sha));
    }

    #[test]
    fn test_build_run_without_commit_is_none() {
        let payload = json!({ "action": "ping" });
        assert!(build_run(&payload, Path::new("index.html"), HTML).is_none());
    }

    #[test]
    fn test_estimated_duration_sums_delays() {
        let payload = demo_payload();
        let mut run = build_run(&payload, Path::new("index.html"), HTML).unwrap();
        assert_eq!(run.estimated_duration_ms(), 420 + 500);

        // Explicit estimates take precedence over scheduling delays.
        run.steps[0].estimated_ms = Some(100);
        assert_eq!(run.estimated_duration_ms(), 100 + 500);
    }

    #[test]
    fn test_run_wire_format() {
        let run = build_run(&demo_payload(), Path::new("index.html"), HTML).unwrap();
        let value = serde_json::to_value(&run).unwrap();
        assert!(value["runId"].is_string());
        assert!(value["createdAt"].is_string());
        assert_eq!(value["siteEntry"], "index.html");
        assert_eq!(value["steps"][0]["delayMs"], 420);
        assert_eq!(value["commit"]["repository"], "demo/AI-Site-Builder");
    }

    #[tokio::test]
    async fn test_create_replay_run_reads_entry_document() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("index.html");
        let mut file = std::fs::File::create(&entry).unwrap();
        file.write_all(HTML.as_bytes()).unwrap();

        let run = create_replay_run(&demo_payload(), &entry).await.unwrap();
        assert_eq!(run.unwrap().steps.len(), 2);
    }

    #[tokio::test]
    async fn test_create_replay_run_missing_entry_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("nope.html");
        let result = create_replay_run(&demo_payload(), &entry).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_replay_run_without_commit_skips_file_read() {
        // No commit in the payload: absent result even though the entry
        // document does not exist.
        let payload = json!({ "hook": "ping" });
        let result = create_replay_run(&payload, Path::new("/definitely/missing.html")).await;
        assert!(result.unwrap().is_none());
    }
}
