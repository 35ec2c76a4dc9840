//! The `traitscore score` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use traitscore_core::config::load_config_from;
use traitscore_core::engine::{ProgressReporter, ScoringEngine};
use traitscore_core::error::ScoringError;
use traitscore_core::parser;
use traitscore_core::report::ScoreRecord;
use traitscore_core::store::{DirectoryScoreStore, ScoreStore, UpsertOutcome};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_session_scored(&self, record: &ScoreRecord) {
        let complete: Vec<String> = record
            .instruments
            .iter()
            .filter(|(_, r)| r.complete)
            .map(|(i, _)| i.to_string())
            .collect();
        eprintln!(
            "  Scored: {} (complete: {})",
            record.session_id,
            if complete.is_empty() {
                "none".to_string()
            } else {
                complete.join(", ")
            }
        );
    }

    fn on_session_error(&self, session_id: &str, error: &ScoringError) {
        eprintln!("  ERROR: {session_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, scored: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {scored}/{total} scored, {failed} failed ({:.2}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    bank_path: PathBuf,
    session_path: PathBuf,
    out: Option<PathBuf>,
    format: String,
    parallelism: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "table" | "json"),
        "unknown format '{format}', expected table or json"
    );
    if let Some(p) = parallelism {
        anyhow::ensure!(p >= 1, "parallelism must be at least 1");
    }

    let config = load_config_from(config_path.as_deref())?;
    let parallelism = parallelism.unwrap_or(config.parallelism);
    let output = out.unwrap_or_else(|| config.output_dir.clone());

    let bank = parser::parse_bank(&bank_path)?;
    let engine = ScoringEngine::with_interpretation(bank, config.interpretation)
        .with_context(|| format!("question bank {} cannot be scored", bank_path.display()))?;
    let engine = Arc::new(engine);

    let sessions = if session_path.is_dir() {
        parser::load_session_directory(&session_path)?
    } else {
        vec![parser::load_session(&session_path)?]
    };
    anyhow::ensure!(!sessions.is_empty(), "no sessions found in {}", session_path.display());

    eprintln!(
        "traitscore v{}: scoring {} session(s) against bank '{}'",
        env!("CARGO_PKG_VERSION"),
        sessions.len(),
        engine.bank().id
    );
    eprintln!();

    let outcome = engine.score_batch(sessions, parallelism, &ConsoleReporter).await?;

    let store = DirectoryScoreStore::open(output.clone())?;
    for record in outcome.records.values() {
        let verb = match store.upsert(record)? {
            UpsertOutcome::Inserted => "Saved",
            UpsertOutcome::Replaced => "Replaced",
        };
        tracing::debug!("{verb} score record for {}", record.session_id);
    }
    if !outcome.records.is_empty() {
        eprintln!("Score records saved to: {}", store.root().display());
    }

    match format.as_str() {
        "json" => {
            let records: Vec<&ScoreRecord> = outcome.records.values().collect();
            let json = if let [single] = records.as_slice() {
                serde_json::to_string_pretty(single)?
            } else {
                serde_json::to_string_pretty(&records)?
            };
            println!("{json}");
        }
        _ => print_summary(outcome.records.values()),
    }

    if !outcome.failures.is_empty() {
        anyhow::bail!("{} session(s) could not be scored", outcome.failures.len());
    }

    Ok(())
}

fn print_summary<'a>(records: impl Iterator<Item = &'a ScoreRecord>) {
    let mut table = Table::new();
    let mut profiles = Vec::new();
    table.set_header(vec!["Session", "Instrument", "Trait", "Score", "Interpretation"]);

    for record in records {
        for (instrument, result) in &record.instruments {
            if !result.complete {
                let status = if result.required == 0 {
                    "not administered".to_string()
                } else {
                    format!("incomplete ({}/{})", result.answered, result.required)
                };
                table.add_row(vec![
                    Cell::new(&record.session_id),
                    Cell::new(instrument),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(status),
                ]);
                continue;
            }
            for (trait_code, score) in &result.traits {
                table.add_row(vec![
                    Cell::new(&record.session_id),
                    Cell::new(instrument),
                    Cell::new(trait_code),
                    Cell::new(format!("{:.1}", score.score)),
                    Cell::new(&score.label),
                ]);
            }
        }
        if let Some(code) = record.profile_code() {
            profiles.push(format!("{}: RIASEC profile {code}", record.session_id));
        }
    }

    println!("{table}");
    for line in profiles {
        println!("{line}");
    }
}
