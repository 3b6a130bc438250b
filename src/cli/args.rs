//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::{Config, DEFAULT_BUFFER_MS, DEFAULT_PORT, DEFAULT_SETTLE_MS};

/// Livebuild replay server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the replay server
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Print the replay plan derived from the current site entry document
    #[command(visible_alias = "p")]
    Plan {
        #[command(flatten)]
        site: SiteArgs,
    },
}

/// Site location arguments, shared by Serve and Plan.
#[derive(clap::Args, Debug, Clone)]
pub struct SiteArgs {
    /// Directory holding the built site
    #[arg(long, env = "SITE_ROOT", default_value = "example-site", value_hint = clap::ValueHint::DirPath)]
    pub site_root: PathBuf,

    /// Entry document name inside the site root
    #[arg(long, env = "SITE_ENTRY", default_value = "index.html")]
    pub site_entry: String,
}

/// Serve command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long, default_value = "127.0.0.1")]
    pub interface: IpAddr,

    /// Port number to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Build command run before each replay (skipped when unset)
    #[arg(long, env = "BUILD_COMMAND")]
    pub build_command: Option<String>,

    /// Settling delay after the build command exits, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,

    /// Presentation buffer added to the replay duration estimate, in milliseconds
    #[arg(long, default_value_t = DEFAULT_BUFFER_MS)]
    pub buffer_ms: u64,
}

impl From<ServeArgs> for Config {
    fn from(args: ServeArgs) -> Self {
        Self {
            interface: args.interface,
            port: args.port,
            site_root: args.site.site_root,
            site_entry: args.site.site_entry,
            build_command: args.build_command.filter(|cmd| !cmd.trim().is_empty()),
            settle_ms: args.settle_ms,
            buffer_ms: args.buffer_ms,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
