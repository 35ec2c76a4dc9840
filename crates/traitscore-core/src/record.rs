//! Score record assembly.
//!
//! Determines per-instrument completeness, runs the aggregator and classifier
//! for complete instruments, and assembles the [`ScoreRecord`].

use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{build_policy, InstrumentScoringPolicy};
use crate::classify::{riasec_profile_code, InterpretationScheme, InterpretationTable};
use crate::error::{ConfigError, ScoringError};
use crate::model::{Instrument, InstrumentConfig, Question, QuestionBank, ResponseSession};
use crate::normalize::{normalize_answer, NormalizedAnswer, TraitContribution};
use crate::report::{InstrumentResult, ScoreRecord, TraitScore};

/// Everything needed to score one instrument, derived once from the bank.
#[derive(Debug)]
pub struct InstrumentBlueprint {
    pub config: InstrumentConfig,
    /// Questions tagged to the instrument, in bank order.
    pub questions: Vec<Question>,
    pub policy: Box<dyn InstrumentScoringPolicy>,
    pub interpretation: InterpretationTable,
}

impl InstrumentBlueprint {
    /// Build the blueprint for `config`.
    ///
    /// The instrument's own interpretation scheme wins over `default_scheme`.
    pub fn build(
        config: &InstrumentConfig,
        questions: &[&Question],
        default_scheme: InterpretationScheme,
    ) -> Result<Self, ConfigError> {
        let policy = build_policy(config, questions)?;
        let interpretation = config.interpretation.unwrap_or(default_scheme).table();
        Ok(Self {
            config: config.clone(),
            questions: questions.iter().map(|q| (*q).clone()).collect(),
            policy,
            interpretation,
        })
    }
}

/// Build the blueprint of every instrument the bank has questions for.
///
/// Answers are keyed by question id, so every id in the bank must be unique.
pub fn build_blueprints(
    bank: &QuestionBank,
    default_scheme: InterpretationScheme,
) -> Result<BTreeMap<Instrument, InstrumentBlueprint>, ConfigError> {
    let mut seen = BTreeSet::new();
    let duplicate = bank.questions.iter().find(|q| !seen.insert(q.id.as_str()));
    if let Some(dup) = duplicate {
        return Err(ConfigError::DuplicateQuestion(dup.id.clone()));
    }

    let mut blueprints = BTreeMap::new();
    for instrument in Instrument::ALL {
        let questions: Vec<&Question> = bank.questions_for(instrument).collect();
        if questions.is_empty() {
            continue;
        }
        let config = bank
            .instrument_config(instrument)
            .ok_or(ConfigError::MissingInstrument(instrument))?;
        blueprints.insert(
            instrument,
            InstrumentBlueprint::build(config, &questions, default_scheme)?,
        );
    }
    Ok(blueprints)
}

/// Assembles score records for one bank.
pub struct ScoreRecordBuilder<'a> {
    bank: &'a QuestionBank,
    blueprints: &'a BTreeMap<Instrument, InstrumentBlueprint>,
}

impl<'a> ScoreRecordBuilder<'a> {
    pub fn new(
        bank: &'a QuestionBank,
        blueprints: &'a BTreeMap<Instrument, InstrumentBlueprint>,
    ) -> Self {
        Self { bank, blueprints }
    }

    /// Score a completed session.
    ///
    /// Rebuilding from the same answers always yields an identical record.
    pub fn build(&self, session: &ResponseSession) -> Result<ScoreRecord, ScoringError> {
        let completed_at = session
            .completed_at
            .ok_or_else(|| ScoringError::SessionNotComplete(session.id.clone()))?;

        let unknown = session
            .answers
            .keys()
            .find(|id| self.bank.question(id).is_none());
        if let Some(unknown) = unknown {
            return Err(ConfigError::UnknownQuestion(unknown.clone()).into());
        }

        let mut instruments = BTreeMap::new();
        for instrument in Instrument::ALL {
            let result = match self.blueprints.get(&instrument) {
                Some(blueprint) => self.score_instrument(instrument, blueprint, session)?,
                None => InstrumentResult::not_administered(),
            };
            tracing::debug!(
                session = %session.id,
                %instrument,
                complete = result.complete,
                answered = result.answered,
                required = result.required,
                "instrument scored"
            );
            instruments.insert(instrument, result);
        }

        Ok(ScoreRecord {
            session_id: session.id.clone(),
            bank_id: self.bank.id.clone(),
            completed_at,
            instruments,
        })
    }

    fn score_instrument(
        &self,
        instrument: Instrument,
        blueprint: &InstrumentBlueprint,
        session: &ResponseSession,
    ) -> Result<InstrumentResult, ScoringError> {
        let mut contributions: Vec<TraitContribution> = Vec::new();
        let mut answered = 0usize;
        let mut malformed = Vec::new();

        for question in &blueprint.questions {
            let Some(answer) = session.answer(&question.id) else {
                continue;
            };
            match normalize_answer(question, answer, blueprint.config.working_scale)? {
                NormalizedAnswer::Scored(c) => {
                    contributions.extend(c);
                    answered += 1;
                }
                NormalizedAnswer::Unscored => answered += 1,
                NormalizedAnswer::Malformed(reason) => malformed.push(reason),
            }
        }

        let required = blueprint.questions.len();
        let complete = answered == required;
        let mut result = InstrumentResult {
            complete,
            answered,
            required,
            policy: Some(blueprint.policy.kind()),
            traits: BTreeMap::new(),
            profile_code: None,
            malformed,
        };
        if !complete {
            return Ok(result);
        }

        result.traits = blueprint
            .policy
            .score(&contributions)
            .into_iter()
            .map(|(trait_code, aggregate)| {
                let label = blueprint
                    .interpretation
                    .classify(aggregate.score)
                    .to_string();
                (
                    trait_code,
                    TraitScore {
                        score: aggregate.score,
                        raw: aggregate.raw,
                        label,
                    },
                )
            })
            .collect();

        if instrument == Instrument::Riasec {
            let scores: BTreeMap<String, f64> = result
                .traits
                .iter()
                .map(|(t, s)| (t.clone(), s.score))
                .collect();
            result.profile_code = Some(riasec_profile_code(&scores));
        }

        Ok(result)
    }
}
