//! Question bank and response session loading.
//!
//! Banks are TOML files, sessions are JSON. Banks can be loaded from single
//! files or whole directories, and validated for authoring mistakes that do
//! not prevent scoring.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::classify::InterpretationScheme;
use crate::model::{
    ChoiceOption, FormatWeights, Instrument, InstrumentConfig, Page, Question, QuestionBank,
    QuestionType, ResponseSession, ScaleBounds, ScoringPolicyKind,
};

/// Intermediate TOML structure for parsing question bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    instruments: Vec<TomlInstrument>,
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlInstrument {
    instrument: String,
    #[serde(default = "default_policy")]
    policy: ScoringPolicyKind,
    #[serde(default = "default_working_scale")]
    working_scale: f64,
    traits: Vec<String>,
    #[serde(default)]
    weights: FormatWeights,
    #[serde(default)]
    interpretation: Option<InterpretationScheme>,
}

fn default_policy() -> ScoringPolicyKind {
    ScoringPolicyKind::WeightedComposite
}

fn default_working_scale() -> f64 {
    4.0
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(rename = "type")]
    question_type: String,
    text: String,
    #[serde(default)]
    text_ar: Option<String>,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    instrument: Option<String>,
    #[serde(default, rename = "trait")]
    trait_code: Option<String>,
    #[serde(default)]
    reverse_keyed: Option<bool>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    options: Vec<TomlOption>,
    #[serde(default)]
    options_ar: Option<Vec<String>>,
    #[serde(default)]
    multi_select: bool,
}

/// Options are either a bare label or a table with weights/trait.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlOption {
    Label(String),
    Full(ChoiceOption),
}

impl From<TomlOption> for ChoiceOption {
    fn from(option: TomlOption) -> Self {
        match option {
            TomlOption::Label(label) => ChoiceOption::labelled(label),
            TomlOption::Full(option) => option,
        }
    }
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let instruments = parsed
        .instruments
        .into_iter()
        .map(|i| {
            let instrument: Instrument = i
                .instrument
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}", e))?;
            Ok(InstrumentConfig {
                instrument,
                policy: i.policy,
                working_scale: i.working_scale,
                traits: i.traits,
                weights: i.weights,
                interpretation: i.interpretation,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;
            let instrument = q
                .instrument
                .map(|i| {
                    i.parse::<Instrument>()
                        .map_err(|e| anyhow::anyhow!("question {}: {}", q.id, e))
                })
                .transpose()?;
            let bounds = match (q.min, q.max) {
                (Some(min), Some(max)) => Some(ScaleBounds::new(min, max)),
                (None, None) => None,
                _ => anyhow::bail!("question {}: min and max must be given together", q.id),
            };

            Ok(Question {
                id: q.id,
                page: q.page,
                instrument,
                trait_code: q.trait_code,
                question_type,
                reverse_keyed: q.reverse_keyed,
                bounds,
                options: q.options.into_iter().map(ChoiceOption::from).collect(),
                multi_select: q.multi_select,
                text: q.text,
                text_ar: q.text_ar,
                options_ar: q.options_ar,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        instruments,
        pages: parsed.pages,
        questions,
    })
}

/// Recursively load all `.toml` question banks from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// Load one response session from a JSON file.
pub fn load_session(path: &Path) -> Result<ResponseSession> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse session JSON: {}", path.display()))
}

/// Load every `.json` session in a directory (not recursive), sorted by file name.
pub fn load_session_directory(dir: &Path) -> Result<Vec<ResponseSession>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
    paths.sort();

    paths.iter().map(|p| load_session(p)).collect()
}

/// A warning from question bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

fn is_blank(s: Option<&str>) -> bool {
    s.is_some_and(|s| s.trim().is_empty())
}

/// Validate a question bank for authoring issues.
///
/// Problems that make scoring impossible are reported by building a
/// [`crate::engine::ScoringEngine`]; these are the ones it tolerates.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for question in &bank.questions {
        if !seen_ids.insert(&question.id) {
            warnings.push(ValidationWarning::question(
                &question.id,
                format!("duplicate question ID: {}", question.id),
            ));
        }
    }

    let mut seen_pages = HashSet::new();
    for page in &bank.pages {
        if !seen_pages.insert(page.id.as_str()) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!("duplicate page ID: {}", page.id),
            });
        }
        if is_blank(page.title_ar.as_deref()) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "page {} has a blank Arabic title; English is shown instead",
                    page.id
                ),
            });
        }
    }

    let mut seen_instruments = HashSet::new();
    for config in &bank.instruments {
        if !seen_instruments.insert(config.instrument) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "instrument {} is configured more than once; the first wins",
                    config.instrument
                ),
            });
        }
        if bank.questions_for(config.instrument).next().is_none() {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "instrument {} has no questions and will be reported as not administered",
                    config.instrument
                ),
            });
        }
    }

    for question in &bank.questions {
        let id = question.id.as_str();

        if question.text.trim().is_empty() {
            warnings.push(ValidationWarning::question(id, "question text is empty"));
        }
        if is_blank(question.text_ar.as_deref()) {
            warnings.push(ValidationWarning::question(
                id,
                "Arabic text is blank; English is shown instead",
            ));
        }
        if let Some(page) = &question.page {
            if bank.page(page).is_none() {
                warnings.push(ValidationWarning::question(id, format!("unknown page: {page}")));
            }
        }
        if let Some(labels) = &question.options_ar {
            if !labels.is_empty() && labels.len() != question.options.len() {
                warnings.push(ValidationWarning::question(
                    id,
                    format!(
                        "{} Arabic option labels for {} options",
                        labels.len(),
                        question.options.len()
                    ),
                ));
            }
        }

        let Some(instrument) = question.instrument else {
            continue;
        };
        let Some(config) = bank.instrument_config(instrument) else {
            warnings.push(ValidationWarning::question(
                id,
                format!("tagged to unconfigured instrument {instrument}"),
            ));
            continue;
        };
        let declared = |t: &str| config.traits.iter().any(|d| d == t);

        match question.question_type {
            QuestionType::Slider | QuestionType::Likert => {
                if let Some(t) = question.trait_code.as_deref().filter(|t| !declared(*t)) {
                    warnings.push(ValidationWarning::question(
                        id,
                        format!("trait '{t}' is not declared by {instrument}"),
                    ));
                }
            }
            QuestionType::Mcq | QuestionType::ForcedChoice => {
                if question.options.iter().all(|o| o.weights.is_empty()) {
                    warnings.push(ValidationWarning::question(
                        id,
                        "no option carries trait weights; answers add nothing",
                    ));
                }
                for t in question.options.iter().flat_map(|o| o.weights.keys()) {
                    if !declared(t.as_str()) {
                        warnings.push(ValidationWarning::question(
                            id,
                            format!("option weight for undeclared trait '{t}'"),
                        ));
                    }
                }
            }
            QuestionType::Ordering => {
                if question.options.iter().all(|o| o.trait_code.is_none()) {
                    warnings.push(ValidationWarning::question(
                        id,
                        "no option is tagged with a trait; rankings add nothing",
                    ));
                }
            }
            QuestionType::Essay => {
                warnings.push(ValidationWarning::question(
                    id,
                    format!("essays are never scored but count toward {instrument} completeness"),
                ));
            }
        }
    }

    warnings
}
