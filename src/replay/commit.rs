//! Commit metadata extraction from change notifications.
//!
//! Payloads follow the GitHub push-event shape but arrive from untrusted
//! senders, so every field gets a fallback. A payload with no derivable
//! commit yields `None` - the "nothing to replay" sentinel, not an error.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Branch used when the payload carries no usable `ref`.
const DEFAULT_BRANCH: &str = "main";

const FALLBACK_MESSAGE: &str = "Build update";
const FALLBACK_AUTHOR: &str = "unknown";
const FALLBACK_REPOSITORY: &str = "local/site";

/// Commit summary derived from a change notification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub branch: String,
    pub repository: String,
}

/// Extract commit metadata, preferring `head_commit` and falling back to the
/// last entry of the `commits` list. Returns `None` when neither exists.
pub fn commit_from_payload(payload: &Value) -> Option<CommitInfo> {
    let commits = payload.get("commits").and_then(Value::as_array);
    let head = payload
        .get("head_commit")
        .filter(|head| !head.is_null())
        .or_else(|| commits.and_then(|list| list.last()))?;

    let branch = match payload.get("ref").and_then(Value::as_str) {
        Some(git_ref) => git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(git_ref)
            .to_string(),
        None => DEFAULT_BRANCH.to_string(),
    };

    let sha = field_string(head, "id")
        .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
    let message = field_string(head, "message").unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
    let author = payload
        .get("pusher")
        .and_then(|pusher| field_string(pusher, "name"))
        .unwrap_or_else(|| FALLBACK_AUTHOR.to_string());
    let repository = payload
        .get("repository")
        .and_then(|repo| field_string(repo, "full_name"))
        .unwrap_or_else(|| FALLBACK_REPOSITORY.to_string());

    Some(CommitInfo {
        sha,
        message,
        author,
        branch,
        repository,
    })
}

/// Read a non-empty string field, coercing numbers so numeric commit ids
/// survive.
fn field_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
