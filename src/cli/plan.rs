//! `plan` command: show the replay derived from the entry document.
//!
//! Dry-runs the run builder against a synthetic push so pacing and step
//! extraction can be checked without starting the server or sending a
//! webhook.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use super::SiteArgs;
use crate::log;
use crate::replay::{build_run, demo_payload};

pub fn run_plan(site: &SiteArgs) -> Result<()> {
    let entry = site.site_root.join(&site.site_entry);
    let html = std::fs::read_to_string(&entry)
        .with_context(|| format!("failed to read site entry {}", entry.display()))?;

    let payload = demo_payload();
    let Some(run) = build_run(&payload, &entry, &html) else {
        anyhow::bail!("demo payload had no derivable commit");
    };

    log!("plan"; "{} ({} steps, {} stylesheets)",
        run.site_entry, run.steps.len(), run.stylesheets.len());

    for href in &run.stylesheets {
        println!("  {} {}", "css".dimmed(), href);
    }

    for step in &run.steps {
        let target = match (step.id_attr.is_empty(), step.class_attr.is_empty()) {
            (false, _) => format!("#{}", step.id_attr),
            (true, false) => format!(".{}", step.class_attr),
            (true, true) => String::new(),
        };
        let preview: String = step.text.chars().take(48).collect();
        println!(
            "  {:>6}ms <{}>{} {}",
            step.delay_ms,
            step.tag,
            target.dimmed(),
            preview
        );
    }

    let total: u64 = run.steps.iter().map(|s| s.delay_ms).sum();
    log!("plan"; "estimated replay: {}ms", total);
    Ok(())
}
