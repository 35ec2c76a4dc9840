//! The `traitscore validate` command.

use std::path::PathBuf;

use anyhow::Result;

use traitscore_core::engine::ScoringEngine;
use traitscore_core::model::Instrument;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = if bank_path.is_dir() {
        traitscore_core::parser::load_bank_directory(&bank_path)?
    } else {
        vec![traitscore_core::parser::parse_bank(&bank_path)?]
    };

    let mut total_warnings = 0;
    let mut unscorable = 0;

    for bank in &banks {
        let counts: Vec<String> = Instrument::ALL
            .iter()
            .map(|&i| format!("{i} {}", bank.questions_for(i).count()))
            .collect();
        println!(
            "Question bank: {} ({} questions: {})",
            bank.name,
            bank.questions.len(),
            counts.join(", ")
        );

        let warnings = traitscore_core::parser::validate_bank(bank);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();

        if let Err(e) = ScoringEngine::new(bank.clone()) {
            println!("  ERROR: {e}");
            unscorable += 1;
        }
    }

    if total_warnings == 0 && unscorable == 0 {
        println!("All question banks valid.");
    } else if total_warnings > 0 {
        println!("\n{total_warnings} warning(s) found.");
    }

    if unscorable > 0 {
        anyhow::bail!("{unscorable} question bank(s) cannot be scored");
    }

    Ok(())
}
