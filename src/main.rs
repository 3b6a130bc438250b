//! Livebuild - replays site rebuilds into a typewriter shell, then swaps to
//! the real site.

mod cli;
mod config;
mod embed;
mod logger;
mod pipeline;
mod replay;
mod runner;
mod serve;
mod state;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    serve::shutdown::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match cli.command {
        Commands::Serve { args } => serve::serve(Config::from(args)),
        Commands::Plan { site } => cli::plan::run_plan(&site),
    }
}
