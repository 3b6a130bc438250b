//! Request dispatch and the plugin endpoints.

use super::{ServeContext, path, response, shutdown};
use crate::replay::demo_payload;
use crate::state::Phase;
use anyhow::Result;
use serde_json::{Value, json};
use std::io::Read;
use tiny_http::{Method, Request};

/// Whether this request opens the event stream (handled off-pool).
pub fn is_stream_request(request: &Request) -> bool {
    request.method() == &Method::Get && route_path(request.url()) == "/plugin/stream"
}

/// Handle a single HTTP request.
pub fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if shutdown::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let url = request.url().to_string();
    let path = route_path(&url);

    match (request.method().clone(), path) {
        (Method::Get, "/plugin/state") => {
            let snapshot = serde_json::to_value(ctx.store.snapshot())?;
            response::send_json(request, 200, &snapshot)
        }

        (Method::Post, "/plugin/demo") => {
            let queued = ctx.queue.enqueue(demo_payload());
            response::send_json(request, 200, &json!({ "ok": true, "queued": queued }))
        }

        (Method::Post, "/plugin/webhook") => handle_webhook(request, ctx),

        (Method::Get, "/") => {
            // The real site appears only once a replay has finished.
            if ctx.store.snapshot().phase == Phase::Ready {
                let entry = ctx.config.entry_path();
                if entry.is_file() {
                    return response::respond_file(request, &entry);
                }
            }
            response::respond_shell(request)
        }

        (Method::Get, _) => match path::resolve_static(&ctx.config.site_root, path) {
            Some(file) => response::respond_file(request, &file),
            None => response::respond_not_found(request),
        },

        _ => response::respond_not_found(request),
    }
}

/// What to do with a webhook delivery, decided from the event-type header.
#[derive(Debug, PartialEq, Eq)]
enum WebhookDisposition {
    Enqueue,
    Ignore(String),
}

/// Anything that declares itself as a non-push event is acknowledged but not
/// replayed. No header at all counts as a push (demo senders, curl).
fn webhook_disposition(event_type: Option<&str>) -> WebhookDisposition {
    match event_type {
        Some(event) if event != "push" => WebhookDisposition::Ignore(event.to_string()),
        _ => WebhookDisposition::Enqueue,
    }
}

fn handle_webhook(mut request: Request, ctx: &ServeContext) -> Result<()> {
    let event_type = header_value(&request, "x-github-event");

    match webhook_disposition(event_type.as_deref()) {
        WebhookDisposition::Ignore(event) => response::send_json(
            request,
            202,
            &json!({ "ok": true, "ignored": true, "eventType": event }),
        ),
        WebhookDisposition::Enqueue => {
            // An unreadable or non-JSON body still enqueues: the pipeline
            // maps it to the no-commit sentinel and drops it quietly.
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let payload = serde_json::from_str(&body).unwrap_or(Value::Null);

            let queued = ctx.queue.enqueue(payload);
            response::send_json(request, 200, &json!({ "ok": true, "queued": queued }))
        }
    }
}

/// Header lookup, case-insensitive per HTTP.
fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.to_string())
}

/// Strip the query string off a request URL.
fn route_path(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

// =============================================================================
// Tests
// =============================================================================
