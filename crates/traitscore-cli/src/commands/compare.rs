//! The `traitscore compare` command.

use std::path::PathBuf;

use anyhow::Result;

use traitscore_core::report::ScoreRecord;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_drift: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = ScoreRecord::load_json(&baseline_path)?;
    let current = ScoreRecord::load_json(&current_path)?;

    if baseline.session_id != current.session_id {
        eprintln!(
            "Warning: comparing different sessions ({} vs {})",
            baseline.session_id, current.session_id
        );
    }

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            // text format
            println!(
                "Comparison: {} drifted, {} unchanged",
                report.drifted.len(),
                report.unchanged
            );

            if !report.drifted.is_empty() {
                println!("\nDrifted:");
                for d in &report.drifted {
                    println!(
                        "  {} {} {:.1} -> {:.1} ({:+.1}){}",
                        d.instrument,
                        d.trait_code,
                        d.baseline_score,
                        d.current_score,
                        d.delta,
                        if d.label_changed { " [label changed]" } else { "" }
                    );
                }
            }

            for c in &report.completeness_changes {
                println!(
                    "\n{}: {} -> {}",
                    c.instrument,
                    if c.baseline { "complete" } else { "incomplete" },
                    if c.current { "complete" } else { "incomplete" }
                );
            }

            if let Some((before, after)) = &report.profile_change {
                println!(
                    "\nProfile code: {} -> {}",
                    before.as_deref().unwrap_or("-"),
                    after.as_deref().unwrap_or("-")
                );
            }
        }
    }

    if fail_on_drift && report.has_drift() {
        std::process::exit(1);
    }

    Ok(())
}
