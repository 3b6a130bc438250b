//! Runtime configuration for the replay server.
//!
//! Every option is environment-provided (the server usually runs as a
//! webhook target on a box nobody shells into) with a CLI flag override:
//!
//! | Option          | Env             | Default        |
//! |-----------------|-----------------|----------------|
//! | port            | `PORT`          | `8787`         |
//! | site root       | `SITE_ROOT`     | `example-site` |
//! | entry document  | `SITE_ENTRY`    | `index.html`   |
//! | build command   | `BUILD_COMMAND` | none (skip)    |
//!
//! The two pipeline timing constants are exposed as flags so they can be
//! tuned without a behavior change elsewhere: `settle_ms` covers build tools
//! that keep writing output files briefly after the process exits, and
//! `buffer_ms` pads the replay duration estimate before the ready phase.

use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8787;

/// Default settling delay after the build command exits (milliseconds).
pub const DEFAULT_SETTLE_MS: u64 = 450;

/// Default presentation buffer added to the replay estimate (milliseconds).
pub const DEFAULT_BUFFER_MS: u64 = 650;

/// Server settings assembled from CLI flags and environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Directory holding the built site.
    pub site_root: PathBuf,

    /// Entry document name inside the site root.
    pub site_entry: String,

    /// External build command, run before every replay. `None` skips the
    /// build step entirely.
    pub build_command: Option<String>,

    /// Settling delay after the build command exits, in milliseconds.
    pub settle_ms: u64,

    /// Presentation buffer added to the replay duration estimate, in
    /// milliseconds.
    pub buffer_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: DEFAULT_PORT,
            site_root: PathBuf::from("example-site"),
            site_entry: "index.html".to_string(),
            build_command: None,
            settle_ms: DEFAULT_SETTLE_MS,
            buffer_ms: DEFAULT_BUFFER_MS,
        }
    }
}

impl Config {
    /// Absolute-or-relative path of the site entry document.
    pub fn entry_path(&self) -> PathBuf {
        self.site_root.join(&self.site_entry)
    }

    /// Working directory for the build command: the parent of the site root,
    /// matching the layout where the build tool regenerates the site root
    /// from sources next to it.
    pub fn build_cwd(&self) -> PathBuf {
        self.site_root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf()
    }
}

// ============================================================================
// Tests
// ============================================================================
