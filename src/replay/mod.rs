//! Replay run construction.
//!
//! Turns a change notification (webhook body or synthetic demo trigger) plus
//! the built site's entry document into a [`Run`]: a commit summary, the
//! stylesheets the shell must load, and the ordered list of typewriter steps.
//!
//! # Module Structure
//!
//! - `commit` - commit metadata extraction with fallbacks
//! - `steps` - entry-document decomposition into paced steps
//! - `run` - run assembly and identity
//! - `demo` - synthetic change notification for the demo trigger

mod commit;
mod demo;
mod run;
mod steps;

pub use commit::{CommitInfo, commit_from_payload};
pub use demo::demo_payload;
pub use run::{Run, build_run, create_replay_run};
pub use steps::{STEP_BASE_DELAY_MS, STEP_DELAY_INCREMENT_MS, Step, decompose};
