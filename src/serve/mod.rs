//! HTTP transport: routes, stream fan-out, static files.
//!
//! # Module Structure
//!
//! - `lifecycle` - binding, pipeline thread, shutdown coordination
//! - `routes` - request dispatch and the plugin endpoints
//! - `response` - tiny_http response helpers
//! - `sse` - server-sent event streaming
//! - `path` - static file path resolution
//! - `shutdown` - Ctrl+C handling

mod lifecycle;
mod path;
mod response;
mod routes;
mod sse;
pub mod shutdown;

use std::sync::Arc;

use anyhow::Result;
use tiny_http::Server;

use crate::config::Config;
use crate::pipeline::{self, QueueHandle};
use crate::state::StateStore;
use crate::{debug, log};

/// Everything a request handler needs, cloned per long-lived connection.
#[derive(Clone)]
pub struct ServeContext {
    pub config: Arc<Config>,
    pub store: Arc<StateStore>,
    pub queue: QueueHandle,
}

/// Bind the server, start the pipeline, run the request loop until shutdown.
pub fn serve(config: Config) -> Result<()> {
    let config = Arc::new(config);
    debug!("serve"; "config: {}", serde_json::to_string(config.as_ref()).unwrap_or_default());
    let store = Arc::new(StateStore::new());

    let (server, addr) = lifecycle::bind_with_retry(config.interface, config.port)?;
    let server = Arc::new(server);
    shutdown::register_server(Arc::clone(&server));

    let (queue, coordinator) = pipeline::channel(Arc::clone(&store), Arc::clone(&config));
    let pipeline_handle = lifecycle::spawn_pipeline(coordinator);

    log!("serve"; "http://{addr}");
    if config.build_command.is_none() {
        log!("serve"; "no build command configured, replays skip the build step");
    }

    let ctx = ServeContext {
        config,
        store,
        queue,
    };
    run_request_loop(&server, &ctx);

    // Close the queue so the coordinator can wind down.
    drop(ctx);
    lifecycle::wait_for_shutdown(pipeline_handle);
    Ok(())
}

fn run_request_loop(server: &Server, ctx: &ServeContext) {
    // Thread pool keeps slow static reads from blocking other requests.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("failed to create thread pool");

    for request in server.incoming_requests() {
        // Stream connections are held open for their whole lifetime; give
        // each one its own thread instead of starving the pool.
        if routes::is_stream_request(&request) {
            let ctx = ctx.clone();
            std::thread::spawn(move || sse::stream(request, &ctx));
            continue;
        }

        let ctx = ctx.clone();
        pool.spawn(move || {
            if let Err(e) = routes::handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}
