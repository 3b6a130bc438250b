//! Command-line interface module.

mod args;
pub mod plan;

pub use args::{Cli, Commands, ServeArgs, SiteArgs};
