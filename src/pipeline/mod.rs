//! Single-flight build/replay pipeline.
//!
//! Change notifications land in a FIFO queue; one coordinator task drains it,
//! driving each payload through the phase machine:
//!
//! ```text
//! idle -> building -> replaying -> ready
//!            ^                       |
//!            +--- next notification -+
//! ```
//!
//! Single-flight by construction: the coordinator is the queue's only
//! consumer, so two runs can never interleave. A notification arriving
//! mid-run only extends the queue; there is no cancellation. After every run
//! (success or failure) the drain loop re-checks the queue before sleeping,
//! so nudges coalesced away while busy are never lost.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::Config;
use crate::replay;
use crate::runner::{self, LogSink};
use crate::state::{Phase, StateStore};
use crate::{debug, log};

const CHANNEL_BUFFER: usize = 32;

type SharedQueue = Arc<Mutex<VecDeque<Value>>>;

/// Nudge sent to the coordinator when the queue grows.
#[derive(Debug)]
enum QueueMsg {
    Enqueue,
}

/// Create the queue and its coordinator. The handle is cheap to clone and
/// hands payloads to the coordinator from any thread; the coordinator must
/// be driven on a tokio runtime via [`Coordinator::run`].
pub fn channel(store: Arc<StateStore>, config: Arc<Config>) -> (QueueHandle, Coordinator) {
    let (tx, rx) = mpsc::channel::<QueueMsg>(CHANNEL_BUFFER);
    let queue: SharedQueue = Arc::new(Mutex::new(VecDeque::new()));

    let handle = QueueHandle {
        queue: Arc::clone(&queue),
        tx,
        store: Arc::clone(&store),
    };
    let coordinator = Coordinator {
        rx,
        queue,
        store,
        config,
    };
    (handle, coordinator)
}

/// Producer side of the pipeline, held by the HTTP handlers.
#[derive(Clone)]
pub struct QueueHandle {
    queue: SharedQueue,
    tx: mpsc::Sender<QueueMsg>,
    store: Arc<StateStore>,
}

impl QueueHandle {
    /// Append a change notification and publish the new queue depth.
    /// Returns the depth for the HTTP response.
    pub fn enqueue(&self, payload: Value) -> usize {
        let depth = {
            let mut queue = self.queue.lock();
            queue.push_back(payload);
            queue.len()
        };
        self.store.set_queue_size(depth);

        // A full channel means nudges are already pending; the drain loop
        // will pick this payload up on its next pass.
        let _ = self.tx.try_send(QueueMsg::Enqueue);
        depth
    }
}

/// Consumer side: owns the drain loop.
pub struct Coordinator {
    rx: mpsc::Receiver<QueueMsg>,
    queue: SharedQueue,
    store: Arc<StateStore>,
    config: Arc<Config>,
}

impl Coordinator {
    /// Run until every [`QueueHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(QueueMsg::Enqueue) = self.rx.recv().await {
            self.drain().await;
        }
        debug!("pipeline"; "queue closed, coordinator stopping");
    }

    /// Process queued payloads strictly FIFO until the queue is empty.
    async fn drain(&self) {
        loop {
            let payload = self.queue.lock().pop_front();
            let Some(payload) = payload else { break };
            self.store.set_queue_size(self.queue.lock().len());

            if let Err(error) = self.process(payload).await {
                // Pipeline errors never escape: log, fall back to idle,
                // keep draining.
                self.store.set_phase(Phase::Idle);
                self.store.push_log(format!("build flow failed: {error:#}"));
                log!("pipeline"; "build flow failed: {error:#}");
            }
        }
    }

    /// One full build-and-replay cycle for a single payload.
    async fn process(&self, payload: Value) -> Result<()> {
        self.store.set_phase(Phase::Building);
        self.store.set_current_run(None);

        if let Some(command) = &self.config.build_command {
            debug!("pipeline"; "running build command: {command}");
            let sink: Arc<dyn LogSink> = self.store.clone();
            runner::run_build_command(command, &self.config.build_cwd(), sink).await?;
        }

        // Build tools may keep flushing output files briefly after exit.
        sleep(Duration::from_millis(self.config.settle_ms)).await;

        let entry = self.config.entry_path();
        let Some(run) = replay::create_replay_run(&payload, &entry).await? else {
            // Non-push or malformed payload: nothing to replay, drop it.
            debug!("pipeline"; "payload had no derivable commit, skipping");
            self.store.set_phase(Phase::Idle);
            return Ok(());
        };

        debug!("pipeline"; "replaying {} ({} steps)", run.run_id, run.steps.len());
        self.store.set_current_run(Some(run.clone()));
        self.store.set_phase(Phase::Replaying);
        self.store.push_run(run.clone());

        // Server-side timer: the estimate does not depend on any client
        // actually finishing its animation.
        let wait = run.estimated_duration_ms() + self.config.buffer_ms;
        sleep(Duration::from_millis(wait)).await;

        self.store.set_phase(Phase::Ready);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::demo_payload;
    use crate::state::Packet;
    use serde_json::json;
    use std::path::Path;

    const TWO_STEP_HTML: &str =
        r#"<html><body><h1 class="title">Hi</h1><p id="p1">There</p></body></html>"#;
    const EMPTY_BODY_HTML: &str = "<html><body></body></html>";

    fn test_config(site_root: &Path) -> Config {
        Config {
            site_root: site_root.to_path_buf(),
            settle_ms: 0,
            buffer_ms: 0,
            ..Config::default()
        }
    }

    fn write_entry(dir: &tempfile::TempDir, html: &str) {
        std::fs::write(dir.path().join("index.html"), html).unwrap();
    }

    /// Record every packet as a compact tag for ordering assertions.
    fn record_events(store: &StateStore) -> Arc<Mutex<Vec<String>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let sub = store.subscribe(move |packet| {
            let tag = match packet {
                Packet::State(state) => format!("state:{}", state.phase),
                Packet::Run(run) => format!("run:{}", run.commit.sha),
                Packet::Log { line } => format!("log:{line}"),
            };
            sink.lock().push(tag);
        });
        // Keep the subscription alive for the store's lifetime.
        std::mem::forget(sub);
        events
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 5s");
    }

    fn position(events: &[String], tag: &str) -> Option<usize> {
        events.iter().position(|e| e == tag)
    }

    #[tokio::test]
    async fn test_demo_trigger_walks_phase_sequence() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(&dir, TWO_STEP_HTML);

        let store = Arc::new(StateStore::new());
        let events = record_events(&store);
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(test_config(dir.path())));
        tokio::spawn(coordinator.run());

        assert_eq!(handle.enqueue(demo_payload()), 1);
        wait_until(|| store.snapshot().phase == Phase::Ready).await;

        let events = events.lock().clone();
        let building = position(&events, "state:building").unwrap();
        let replaying = position(&events, "state:replaying").unwrap();
        let ready = position(&events, "state:ready").unwrap();
        let run = events.iter().position(|e| e.starts_with("run:")).unwrap();

        // idle -> building -> replaying -> ready, run inside the replay window.
        assert!(building < replaying);
        assert!(replaying < run);
        assert!(run < ready);

        let state = store.snapshot();
        assert_eq!(state.queued_runs, 0);
        assert_eq!(state.current_run.unwrap().steps.len(), 2);
    }

    #[tokio::test]
    async fn test_queue_depth_tracks_pending_payloads() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(&dir, EMPTY_BODY_HTML);

        let store = Arc::new(StateStore::new());
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(test_config(dir.path())));

        // Coordinator not driven yet: depths are exact.
        assert_eq!(handle.enqueue(json!({ "head_commit": { "id": "c1" } })), 1);
        assert_eq!(handle.enqueue(json!({ "head_commit": { "id": "c2" } })), 2);
        assert_eq!(handle.enqueue(json!({ "head_commit": { "id": "c3" } })), 3);
        assert_eq!(store.snapshot().queued_runs, 3);

        let events = record_events(&store);
        tokio::spawn(coordinator.run());
        wait_until(|| events.lock().iter().filter(|e| e.starts_with("run:")).count() == 3).await;
        assert_eq!(store.snapshot().queued_runs, 0);
    }

    #[tokio::test]
    async fn test_fifo_order_without_overlap() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(&dir, EMPTY_BODY_HTML);

        let store = Arc::new(StateStore::new());
        let events = record_events(&store);
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(test_config(dir.path())));
        tokio::spawn(coordinator.run());

        for sha in ["c1", "c2", "c3"] {
            handle.enqueue(json!({ "head_commit": { "id": sha } }));
        }
        wait_until(|| events.lock().iter().filter(|e| e.starts_with("run:")).count() == 3).await;

        let events = events.lock().clone();
        let runs: Vec<&String> = events.iter().filter(|e| e.starts_with("run:")).collect();
        assert_eq!(runs, ["run:c1", "run:c2", "run:c3"]);

        // Strictly sequential: each run reaches ready before the next starts.
        let first_run = events.iter().position(|e| e == "run:c1").unwrap();
        let second_run = events.iter().position(|e| e == "run:c2").unwrap();
        let ready_between = events[first_run..second_run]
            .iter()
            .any(|e| e == "state:ready");
        assert!(ready_between);
    }

    #[tokio::test]
    async fn test_payload_without_commit_ends_idle_without_run() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(&dir, TWO_STEP_HTML);

        let store = Arc::new(StateStore::new());
        let events = record_events(&store);
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(test_config(dir.path())));
        tokio::spawn(coordinator.run());

        handle.enqueue(json!({ "action": "ping" }));
        wait_until(|| {
            let events = events.lock();
            let building = position(&events, "state:building");
            let idle = position(&events, "state:idle");
            matches!((building, idle), (Some(b), Some(i)) if b < i)
        })
        .await;

        assert!(!events.lock().iter().any(|e| e.starts_with("run:")));
        assert_eq!(store.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_build_failure_logs_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(&dir, EMPTY_BODY_HTML);

        let mut config = test_config(dir.path());
        config.build_command = Some("exit 3".into());

        let store = Arc::new(StateStore::new());
        let events = record_events(&store);
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(config));
        tokio::spawn(coordinator.run());

        handle.enqueue(demo_payload());
        wait_until(|| {
            events
                .lock()
                .iter()
                .any(|e| e.starts_with("log:build flow failed"))
        })
        .await;

        assert_eq!(store.snapshot().phase, Phase::Idle);
        assert!(!events.lock().iter().any(|e| e.starts_with("run:")));
    }

    #[tokio::test]
    async fn test_missing_entry_document_logs_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        // No index.html written.

        let store = Arc::new(StateStore::new());
        let events = record_events(&store);
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(test_config(dir.path())));
        tokio::spawn(coordinator.run());

        handle.enqueue(demo_payload());
        wait_until(|| {
            events
                .lock()
                .iter()
                .any(|e| e.starts_with("log:build flow failed"))
        })
        .await;
        assert_eq!(store.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_payload_still_drains_next_queued_item() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(&dir, EMPTY_BODY_HTML);

        let store = Arc::new(StateStore::new());
        let events = record_events(&store);
        let (handle, coordinator) = channel(Arc::clone(&store), Arc::new(test_config(dir.path())));

        // First payload has no commit (dropped); second must still run.
        handle.enqueue(json!({ "action": "ping" }));
        handle.enqueue(json!({ "head_commit": { "id": "after" } }));
        tokio::spawn(coordinator.run());

        wait_until(|| events.lock().iter().any(|e| e == "run:after")).await;
        assert_eq!(store.snapshot().phase, Phase::Ready);
    }
}
