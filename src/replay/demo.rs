//! Synthetic change notification for the demo trigger.

use serde_json::{Value, json};

/// A push-shaped payload that walks the full pipeline without any real
/// repository behind it. Fixed values keep demo runs recognizable in logs.
pub fn demo_payload() -> Value {
    json!({
        "ref": "refs/heads/main",
        "repository": { "full_name": "demo/AI-Site-Builder" },
        "pusher": { "name": "demo-dev" },
        "head_commit": {
            "id": "1af64ff9c22fa09bcf61120c0b4ca49dc11e9ed1",
            "message": "Update layout and stream text fill animation",
        },
        "commits": [
            {
                "id": "1af64ff9c22fa09bcf61120c0b4ca49dc11e9ed1",
                "message": "Update layout and stream text fill animation",
                "added": [],
                "modified": ["index.html", "styles.css"],
                "removed": [],
            },
        ],
    })
}
