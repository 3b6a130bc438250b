//! HTTP response helpers.

use crate::embed::SHELL_HTML;
use crate::utils::mime;
use anyhow::{Context, Result};
use serde_json::Value;
use std::{fs, path::Path};
use tiny_http::{Header, Request, Response, StatusCode};

/// Respond with a JSON body.
pub fn send_json(request: Request, status: u16, body: &Value) -> Result<()> {
    let response = Response::from_string(body.to_string())
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", mime::types::JSON));
    request.respond(response)?;
    Ok(())
}

/// Respond with a static file from disk.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);
    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Respond with the embedded replay shell.
pub fn respond_shell(request: Request) -> Result<()> {
    let response = Response::from_string(SHELL_HTML)
        .with_header(make_header("Content-Type", mime::types::HTML));
    request.respond(response)?;
    Ok(())
}

/// Respond with 404.
pub fn respond_not_found(request: Request) -> Result<()> {
    send_body(request, 404, mime::types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(
        request,
        503,
        mime::types::PLAIN,
        b"503 Service Unavailable".to_vec(),
    )
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}
