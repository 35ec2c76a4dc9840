//! Trait aggregation.
//!
//! Each instrument picks one [`InstrumentScoringPolicy`] from its
//! configuration. Policies are built once per question bank, so theoretical
//! bounds come from instrument configuration and never from observed answers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{FormatWeights, InstrumentConfig, Question, QuestionType, ScoringPolicyKind};
use crate::normalize::{rank_weight, scale_metadata, ItemFormat, TraitContribution};

/// Aggregated value for one trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitAggregate {
    /// Policy-specific raw value before rescaling.
    pub raw: f64,
    /// Score in `[0, 100]`, one decimal.
    pub score: f64,
}

/// Theoretical raw range of one trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitRange {
    pub min: f64,
    pub max: f64,
}

impl TraitRange {
    const EMPTY: TraitRange = TraitRange { min: 0.0, max: 0.0 };

    fn add(&mut self, lo: f64, hi: f64) {
        self.min += lo.min(hi);
        self.max += lo.max(hi);
    }

    fn rescale(&self, raw: f64) -> f64 {
        ((raw - self.min) / (self.max - self.min) * 100.0).clamp(0.0, 100.0)
    }
}

/// Turns one session's contributions for an instrument into 0-100 trait scores.
///
/// Only called for complete instruments, so every declared trait has evidence.
pub trait InstrumentScoringPolicy: Send + Sync + fmt::Debug {
    fn kind(&self) -> ScoringPolicyKind;

    /// Score every declared trait, keyed by trait code.
    fn score(&self, contributions: &[TraitContribution]) -> BTreeMap<String, TraitAggregate>;
}

/// Round to the one decimal place scores are reported at.
pub fn round_score(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Build the policy named by `config` for the instrument's `questions`.
pub fn build_policy(
    config: &InstrumentConfig,
    questions: &[&Question],
) -> Result<Box<dyn InstrumentScoringPolicy>, ConfigError> {
    if !(config.working_scale.is_finite() && config.working_scale > 0.0) {
        return Err(ConfigError::InvalidWorkingScale {
            instrument: config.instrument,
            scale: config.working_scale,
        });
    }

    Ok(match config.policy {
        ScoringPolicyKind::WeightedComposite => {
            Box::new(WeightedCompositePolicy::new(config, questions)?)
        }
        ScoringPolicyKind::DirectSum => Box::new(DirectSumPolicy::new(config, questions)?),
        ScoringPolicyKind::MeanScaled => Box::new(MeanScaledPolicy::new(config, questions)?),
    })
}

fn ensure_declared(
    config: &InstrumentConfig,
    question: &Question,
    trait_code: &str,
) -> Result<(), ConfigError> {
    if config.traits.iter().any(|t| t == trait_code) {
        Ok(())
    } else {
        Err(ConfigError::UndeclaredTrait {
            question_id: question.id.clone(),
            instrument: config.instrument,
            trait_code: trait_code.to_string(),
        })
    }
}

/// Raw `(lo, hi)` attainable by one question for each trait it can credit.
fn question_ranges(
    config: &InstrumentConfig,
    question: &Question,
) -> Result<BTreeMap<String, (f64, f64)>, ConfigError> {
    let mut ranges: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    match question.question_type {
        QuestionType::Essay => {}
        QuestionType::Slider | QuestionType::Likert => {
            let (trait_code, _, _) = scale_metadata(question)?;
            ensure_declared(config, question, trait_code)?;
            ranges.insert(trait_code.to_string(), (0.0, config.working_scale));
        }
        QuestionType::ForcedChoice | QuestionType::Mcq => {
            let mut traits: Vec<&String> = question
                .options
                .iter()
                .flat_map(|o| o.weights.keys())
                .collect();
            traits.sort();
            traits.dedup();
            for trait_code in traits {
                ensure_declared(config, question, trait_code)?;
                let weights = question
                    .options
                    .iter()
                    .map(|o| o.weights.get(trait_code).copied().unwrap_or(0.0));
                // only a multi-select mcq can credit several options at once
                let additive = question.question_type == QuestionType::Mcq && question.multi_select;
                let range = if additive {
                    weights.fold((0.0, 0.0), |(lo, hi), w| (lo + w.min(0.0), hi + w.max(0.0)))
                } else {
                    weights.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), w| {
                        (lo.min(w), hi.max(w))
                    })
                };
                ranges.insert(trait_code.clone(), range);
            }
        }
        QuestionType::Ordering => {
            let n = question.options.len();
            let mut per_trait: BTreeMap<&str, usize> = BTreeMap::new();
            for option in &question.options {
                if let Some(trait_code) = option.trait_code.as_deref() {
                    ensure_declared(config, question, trait_code)?;
                    *per_trait.entry(trait_code).or_default() += 1;
                }
            }
            for (trait_code, k) in per_trait {
                let hi: f64 = (0..k).map(|p| rank_weight(n, p)).sum();
                let lo: f64 = (0..k).map(|p| rank_weight(n, n - 1 - p)).sum();
                ranges.insert(trait_code.to_string(), (lo, hi));
            }
        }
    }

    Ok(ranges)
}

fn format_weight(weights: &FormatWeights, format: ItemFormat) -> f64 {
    match format {
        ItemFormat::Likert => weights.likert,
        ItemFormat::ForcedChoice => weights.forced_choice,
        ItemFormat::Ranking => weights.ranking,
    }
}

/// Shared state of the bounded-sum policies.
#[derive(Debug, Clone)]
struct BoundedSum {
    traits: Vec<String>,
    weights: FormatWeights,
    ranges: BTreeMap<String, TraitRange>,
}

impl BoundedSum {
    fn new(
        config: &InstrumentConfig,
        questions: &[&Question],
        weights: FormatWeights,
    ) -> Result<Self, ConfigError> {
        let mut ranges: BTreeMap<String, TraitRange> = config
            .traits
            .iter()
            .map(|t| (t.clone(), TraitRange::EMPTY))
            .collect();
        let mut item_counts: BTreeMap<&str, usize> = BTreeMap::new();

        for question in questions {
            let Some(format) = ItemFormat::of(question.question_type) else {
                continue;
            };
            let w = format_weight(&weights, format);
            for (trait_code, (lo, hi)) in question_ranges(config, question)? {
                if let Some(range) = ranges.get_mut(&trait_code) {
                    range.add(w * lo, w * hi);
                }
                if let Some(t) = config.traits.iter().find(|t| **t == trait_code) {
                    *item_counts.entry(t.as_str()).or_default() += 1;
                }
            }
        }

        for (trait_code, range) in &ranges {
            if !item_counts.contains_key(trait_code.as_str()) {
                return Err(ConfigError::EmptyTrait {
                    instrument: config.instrument,
                    trait_code: trait_code.clone(),
                });
            }
            if !(range.max > range.min) {
                return Err(ConfigError::DegenerateTrait {
                    instrument: config.instrument,
                    trait_code: trait_code.clone(),
                    min: range.min,
                    max: range.max,
                });
            }
        }

        Ok(Self {
            traits: config.traits.clone(),
            weights,
            ranges,
        })
    }

    fn score(&self, contributions: &[TraitContribution]) -> BTreeMap<String, TraitAggregate> {
        let mut raw: BTreeMap<&str, f64> = self.traits.iter().map(|t| (t.as_str(), 0.0)).collect();
        for contribution in contributions {
            if let Some(sum) = raw.get_mut(contribution.trait_code.as_str()) {
                *sum += format_weight(&self.weights, contribution.format) * contribution.value;
            }
        }

        raw.into_iter()
            .filter_map(|(trait_code, raw)| {
                let range = self.ranges.get(trait_code)?;
                Some((
                    trait_code.to_string(),
                    TraitAggregate {
                        raw,
                        score: round_score(range.rescale(raw)),
                    },
                ))
            })
            .collect()
    }
}

/// Legacy RIASEC scoring: format-weighted sum rescaled by theoretical bounds.
#[derive(Debug, Clone)]
pub struct WeightedCompositePolicy {
    inner: BoundedSum,
}

impl WeightedCompositePolicy {
    pub fn new(config: &InstrumentConfig, questions: &[&Question]) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: BoundedSum::new(config, questions, config.weights)?,
        })
    }

    /// Theoretical raw range of `trait_code`, if declared.
    pub fn range(&self, trait_code: &str) -> Option<TraitRange> {
        self.inner.ranges.get(trait_code).copied()
    }
}

impl InstrumentScoringPolicy for WeightedCompositePolicy {
    fn kind(&self) -> ScoringPolicyKind {
        ScoringPolicyKind::WeightedComposite
    }

    fn score(&self, contributions: &[TraitContribution]) -> BTreeMap<String, TraitAggregate> {
        self.inner.score(contributions)
    }
}

/// Current scoring: plain sum of item points rescaled by theoretical bounds.
#[derive(Debug, Clone)]
pub struct DirectSumPolicy {
    inner: BoundedSum,
}

impl DirectSumPolicy {
    pub fn new(config: &InstrumentConfig, questions: &[&Question]) -> Result<Self, ConfigError> {
        let unit = FormatWeights {
            likert: 1.0,
            forced_choice: 1.0,
            ranking: 1.0,
        };
        Ok(Self {
            inner: BoundedSum::new(config, questions, unit)?,
        })
    }

    pub fn range(&self, trait_code: &str) -> Option<TraitRange> {
        self.inner.ranges.get(trait_code).copied()
    }
}

impl InstrumentScoringPolicy for DirectSumPolicy {
    fn kind(&self) -> ScoringPolicyKind {
        ScoringPolicyKind::DirectSum
    }

    fn score(&self, contributions: &[TraitContribution]) -> BTreeMap<String, TraitAggregate> {
        self.inner.score(contributions)
    }
}

/// Big Five / Work Rhythm scoring: mean item value times `100 / working_scale`.
#[derive(Debug, Clone)]
pub struct MeanScaledPolicy {
    traits: Vec<String>,
    multiplier: f64,
}

impl MeanScaledPolicy {
    pub fn new(config: &InstrumentConfig, questions: &[&Question]) -> Result<Self, ConfigError> {
        let mut item_counts: BTreeMap<&str, usize> = BTreeMap::new();

        for question in questions {
            match question.question_type {
                QuestionType::Essay => {}
                QuestionType::Slider | QuestionType::Likert => {
                    let (trait_code, _, _) = scale_metadata(question)?;
                    ensure_declared(config, question, trait_code)?;
                    *item_counts.entry(trait_code).or_default() += 1;
                }
                other => {
                    return Err(ConfigError::UnsupportedQuestionType {
                        question_id: question.id.clone(),
                        question_type: other,
                        policy: "mean_scaled",
                    })
                }
            }
        }

        let missing = config
            .traits
            .iter()
            .find(|t| !item_counts.contains_key(t.as_str()));
        if let Some(missing) = missing {
            return Err(ConfigError::EmptyTrait {
                instrument: config.instrument,
                trait_code: missing.clone(),
            });
        }

        Ok(Self {
            traits: config.traits.clone(),
            multiplier: 100.0 / config.working_scale,
        })
    }

    /// Factor applied to the item mean, derived from the working scale.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl InstrumentScoringPolicy for MeanScaledPolicy {
    fn kind(&self) -> ScoringPolicyKind {
        ScoringPolicyKind::MeanScaled
    }

    fn score(&self, contributions: &[TraitContribution]) -> BTreeMap<String, TraitAggregate> {
        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for contribution in contributions
            .iter()
            .filter(|c| c.format == ItemFormat::Likert)
        {
            let entry = sums
                .entry(contribution.trait_code.as_str())
                .or_insert((0.0, 0));
            entry.0 += contribution.value;
            entry.1 += 1;
        }

        self.traits
            .iter()
            .filter_map(|trait_code| {
                let (sum, count) = sums.get(trait_code.as_str()).copied()?;
                if count == 0 {
                    return None;
                }
                let mean = sum / count as f64;
                Some((
                    trait_code.clone(),
                    TraitAggregate {
                        raw: mean,
                        score: round_score((mean * self.multiplier).clamp(0.0, 100.0)),
                    },
                ))
            })
            .collect()
    }
}
