//! Shared pipeline state with synchronous subscriber fan-out.
//!
//! The store holds the single `State` snapshot (phase, current run, queue
//! depth) and an explicit observer registry. Every mutation stamps
//! `updatedAt` and notifies all subscribers, in registration order, with a
//! fully-formed copy of the new state; out-of-band packets (run
//! announcements, log lines) go through the same registry without touching
//! the state.
//!
//! The store is constructed once at startup and passed around behind an
//! `Arc`; it performs no I/O of its own.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::replay::Run;

// =============================================================================
// Phase
// =============================================================================

/// Coarse lifecycle stage of the build/replay pipeline.
///
/// `ready` persists until the next queued notification pulls the pipeline
/// back into `building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Building,
    Replaying,
    Ready,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Building => "building",
            Phase::Replaying => "replaying",
            Phase::Ready => "ready",
        };
        f.write_str(name)
    }
}

// =============================================================================
// State
// =============================================================================

/// Snapshot of the pipeline state, safe to retain after the store moves on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub phase: Phase,
    pub current_run: Option<Run>,
    pub queued_runs: usize,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Packet
// =============================================================================

/// One notification delivered to subscribers. Maps 1:1 onto an SSE event.
#[derive(Debug, Clone)]
pub enum Packet {
    /// The state changed; carries the full new snapshot.
    State(State),
    /// A new run was published.
    Run(Run),
    /// A free-form log line (build output, pipeline failures).
    Log { line: String },
}

impl Packet {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::State(_) => "state",
            Packet::Run(_) => "run",
            Packet::Log { .. } => "log",
        }
    }

    /// Event payload on the wire.
    pub fn payload(&self) -> Value {
        match self {
            Packet::State(state) => serde_json::to_value(state).unwrap_or(Value::Null),
            Packet::Run(run) => serde_json::to_value(run).unwrap_or(Value::Null),
            Packet::Log { line } => json!({ "line": line }),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

type Callback = Arc<dyn Fn(&Packet) + Send + Sync>;

struct Subscriber {
    active: Arc<AtomicBool>,
    notify: Callback,
}

struct Inner {
    state: State,
    subscribers: Vec<Subscriber>,
}

/// The process-wide state store. One instance per server.
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State {
                    phase: Phase::Idle,
                    current_run: None,
                    queued_runs: 0,
                    updated_at: Utc::now(),
                },
                subscribers: Vec::new(),
            }),
        }
    }

    /// Deep-copied snapshot of the current state.
    pub fn snapshot(&self) -> State {
        self.inner.lock().state.clone()
    }

    pub fn set_phase(&self, phase: Phase) {
        self.mutate(|state| state.phase = phase);
    }

    pub fn set_current_run(&self, run: Option<Run>) {
        self.mutate(|state| state.current_run = run);
    }

    pub fn set_queue_size(&self, count: usize) {
        self.mutate(|state| state.queued_runs = count);
    }

    /// Announce a published run without mutating state.
    pub fn push_run(&self, run: Run) {
        self.emit(&Packet::Run(run));
    }

    /// Forward a log line to subscribers without mutating state.
    pub fn push_log(&self, line: impl Into<String>) {
        self.emit(&Packet::Log { line: line.into() });
    }

    /// Register a callback invoked for every emitted packet.
    ///
    /// Delivery is synchronous and in registration order. The returned
    /// handle deactivates the subscriber; calling it more than once, or from
    /// within the callback itself, is fine.
    pub fn subscribe(&self, notify: impl Fn(&Packet) + Send + Sync + 'static) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        self.inner.lock().subscribers.push(Subscriber {
            active: Arc::clone(&active),
            notify: Arc::new(notify),
        });
        Subscription { active }
    }

    /// Apply a state mutation, stamp the timestamp, broadcast the snapshot.
    fn mutate(&self, apply: impl FnOnce(&mut State)) {
        let (packet, targets) = {
            let mut inner = self.inner.lock();
            apply(&mut inner.state);
            inner.state.updated_at = Utc::now();
            // Reap subscribers that unsubscribed since the last mutation.
            inner
                .subscribers
                .retain(|sub| sub.active.load(Ordering::Acquire));
            (Packet::State(inner.state.clone()), collect_targets(&inner))
        };
        deliver(&targets, &packet);
    }

    fn emit(&self, packet: &Packet) {
        let targets = collect_targets(&self.inner.lock());
        deliver(&targets, packet);
    }
}

/// Handle returned by [`StateStore::subscribe`].
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Stop delivery to this subscriber. Idempotent.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
    }
}

fn collect_targets(inner: &Inner) -> Vec<(Arc<AtomicBool>, Callback)> {
    inner
        .subscribers
        .iter()
        .map(|sub| (Arc::clone(&sub.active), Arc::clone(&sub.notify)))
        .collect()
}

/// Invoke callbacks outside the store lock so a callback may subscribe or
/// unsubscribe without deadlocking. The active flag is re-checked right
/// before each delivery, so an unsubscribe issued from an earlier callback
/// in the same broadcast still wins.
fn deliver(targets: &[(Arc<AtomicBool>, Callback)], packet: &Packet) {
    for (active, notify) in targets {
        if active.load(Ordering::Acquire) {
            notify(packet);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
