//! Server-sent event streaming.
//!
//! Each stream client gets a store subscription whose packets are serialized
//! into SSE frames and pushed through a channel; a blocking `Read` adapter
//! feeds them to tiny_http's chunked writer. The connection stays open until
//! the client goes away, which tiny_http only notices on the next write -
//! an idle stream's thread parks until then. Disconnects are expected churn,
//! not errors.

use super::ServeContext;
use crate::debug;
use crate::state::Packet;
use crate::utils::mime;
use crossbeam::channel::{Receiver, unbounded};
use serde_json::Value;
use std::io::Read;
use tiny_http::{Header, Request, Response, StatusCode};

/// Serve one stream connection. Blocks until the client disconnects.
pub fn stream(request: Request, ctx: &ServeContext) {
    let (tx, rx) = unbounded::<Vec<u8>>();

    // Connect packet first, then live updates in emission order.
    let snapshot = serde_json::to_value(ctx.store.snapshot()).unwrap_or(Value::Null);
    let _ = tx.send(frame("state", &snapshot));

    let subscription = ctx
        .store
        .subscribe(move |packet: &Packet| {
            let _ = tx.send(frame(packet.name(), &packet.payload()));
        });

    let response = Response::new(
        StatusCode(200),
        vec![
            Header::from_bytes("Content-Type", mime::types::EVENT_STREAM).unwrap(),
            Header::from_bytes("Cache-Control", "no-cache").unwrap(),
        ],
        FrameReader::new(rx),
        None,
        None,
    );

    // Blocks for the lifetime of the connection.
    let result = request.respond(response);
    subscription.unsubscribe();
    debug!("serve"; "stream client disconnected ({:?})", result.err());
}

/// One SSE frame: named event plus JSON data.
fn frame(name: &str, payload: &Value) -> Vec<u8> {
    format!("event: {name}\ndata: {payload}\n\n").into_bytes()
}

/// Blocking bridge from the packet channel into tiny_http's body reader.
struct FrameReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl FrameReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
        }
    }
}

impl Read for FrameReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(next) => self.pending = next,
                // Channel closed: end the stream.
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

// =============================================================================
// Tests
// =============================================================================
