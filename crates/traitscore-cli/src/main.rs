//! Command-line front end for scoring, validating and comparing assessment results.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "traitscore", version, about = "Bilingual psychometric scoring engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score completed response sessions
    Score {
        /// Question bank TOML file
        #[arg(long)]
        bank: PathBuf,

        /// Session JSON file or directory of session files
        #[arg(long)]
        session: PathBuf,

        /// Output directory for score records (default: from config)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Max sessions scored concurrently (default: from config)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Compare two score records of the same session
    Compare {
        /// Baseline score record JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current score record JSON
        #[arg(long)]
        current: PathBuf,

        /// Score points a trait may move before it counts as drift
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Exit code 1 if drift is found
        #[arg(long)]
        fail_on_drift: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print a question bank in one language
    Show {
        /// Question bank TOML file
        #[arg(long)]
        bank: PathBuf,

        /// Language code, e.g. "en" or "ar"
        #[arg(long)]
        lang: Option<String>,
    },

    /// Create starter config, sample bank, and sample session
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("traitscore=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            bank,
            session,
            out,
            format,
            parallelism,
            config,
        } => commands::score::execute(bank, session, out, format, parallelism, config).await,
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_drift,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_drift, format),
        Commands::Show { bank, lang } => commands::show::execute(bank, lang),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
