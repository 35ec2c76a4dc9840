//! Response normalization.
//!
//! Turns one raw answer into the trait contributions the aggregator sums.
//! Stray values are clamped or coerced where a safe reading exists; anything
//! else is reported as malformed so the caller can treat the answer as absent.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Answer, AnswerValue, Question, QuestionType, ScaleBounds};

/// Item format a contribution came from, used by format-weighted policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFormat {
    /// Slider and Likert items.
    Likert,
    /// Forced-choice and mcq items.
    ForcedChoice,
    /// Ordering items.
    Ranking,
}

impl ItemFormat {
    pub fn of(question_type: QuestionType) -> Option<ItemFormat> {
        match question_type {
            QuestionType::Slider | QuestionType::Likert => Some(ItemFormat::Likert),
            QuestionType::Mcq | QuestionType::ForcedChoice => Some(ItemFormat::ForcedChoice),
            QuestionType::Ordering => Some(ItemFormat::Ranking),
            QuestionType::Essay => None,
        }
    }
}

/// One unit of evidence for a trait.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitContribution {
    pub trait_code: String,
    pub format: ItemFormat,
    pub value: f64,
}

/// Outcome of normalizing one answer.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedAnswer {
    /// The answer yields these contributions (possibly none, e.g. an empty multi-select).
    Scored(Vec<TraitContribution>),
    /// The question is answered but carries no score (essays, untagged items).
    Unscored,
    /// No safe interpretation exists; treat the answer as absent.
    Malformed(String),
}

impl NormalizedAnswer {
    pub fn is_malformed(&self) -> bool {
        matches!(self, NormalizedAnswer::Malformed(_))
    }

    pub fn contributions(&self) -> &[TraitContribution] {
        match self {
            NormalizedAnswer::Scored(contributions) => contributions,
            _ => &[],
        }
    }
}

/// Normalize `answer` against its `question`.
///
/// `working_scale` is the upper end `N` of the `[0, N]` range that slider and
/// Likert values are mapped into. Returns a [`ConfigError`] only when the
/// question metadata itself is unusable.
pub fn normalize_answer(
    question: &Question,
    answer: &Answer,
    working_scale: f64,
) -> Result<NormalizedAnswer, ConfigError> {
    if question.instrument.is_none() {
        return Ok(NormalizedAnswer::Unscored);
    }

    match question.question_type {
        QuestionType::Essay => Ok(NormalizedAnswer::Unscored),
        QuestionType::Slider | QuestionType::Likert => {
            normalize_scale(question, &answer.value, working_scale)
        }
        QuestionType::ForcedChoice => Ok(normalize_forced_choice(question, &answer.value)),
        QuestionType::Mcq => Ok(normalize_mcq(question, &answer.value)),
        QuestionType::Ordering => Ok(normalize_ordering(question, &answer.value)),
    }
}

/// Check that a scale item has everything needed to score it.
pub(crate) fn scale_metadata(
    question: &Question,
) -> Result<(&str, ScaleBounds, bool), ConfigError> {
    let trait_code = question
        .trait_code
        .as_deref()
        .ok_or_else(|| ConfigError::MissingTrait {
            question_id: question.id.clone(),
        })?;
    let bounds = question.bounds.ok_or_else(|| ConfigError::MissingBounds {
        question_id: question.id.clone(),
    })?;
    if !(bounds.min.is_finite() && bounds.max.is_finite()) || bounds.min >= bounds.max {
        return Err(ConfigError::InvalidBounds {
            question_id: question.id.clone(),
            min: bounds.min,
            max: bounds.max,
        });
    }
    let reverse_keyed = question
        .reverse_keyed
        .ok_or_else(|| ConfigError::MissingReverseKey {
            question_id: question.id.clone(),
        })?;
    Ok((trait_code, bounds, reverse_keyed))
}

/// Map a raw scale value into `[0, working_scale]`.
///
/// The value is clamped into `bounds` first, then inverted within the same
/// bounds when `reverse_keyed` is set.
pub fn scale_value(bounds: ScaleBounds, reverse_keyed: bool, raw: f64, working_scale: f64) -> f64 {
    let clamped = bounds.clamp(raw);
    let keyed = if reverse_keyed {
        bounds.max - (clamped - bounds.min)
    } else {
        clamped
    };
    (keyed - bounds.min) / bounds.span() * working_scale
}

fn normalize_scale(
    question: &Question,
    value: &AnswerValue,
    working_scale: f64,
) -> Result<NormalizedAnswer, ConfigError> {
    let (trait_code, bounds, reverse_keyed) = scale_metadata(question)?;

    let raw = match value {
        AnswerValue::Numeric(v) => Some(*v),
        AnswerValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(raw) = raw.filter(|v| v.is_finite()) else {
        return Ok(malformed(question, "expected a numeric value"));
    };

    Ok(NormalizedAnswer::Scored(vec![TraitContribution {
        trait_code: trait_code.to_string(),
        format: ItemFormat::Likert,
        value: scale_value(bounds, reverse_keyed, raw, working_scale),
    }]))
}

fn as_index(value: f64) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as usize)
    } else {
        None
    }
}

fn single_index(value: &AnswerValue) -> Option<usize> {
    match value {
        AnswerValue::Choice(i) => Some(*i),
        AnswerValue::Numeric(v) => as_index(*v),
        AnswerValue::Choices(v) if v.len() == 1 => Some(v[0]),
        AnswerValue::Text(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

fn option_weights(question: &Question, index: usize, into: &mut Vec<TraitContribution>) {
    if let Some(option) = question.options.get(index) {
        into.extend(option.weights.iter().map(|(trait_code, weight)| TraitContribution {
            trait_code: trait_code.clone(),
            format: ItemFormat::ForcedChoice,
            value: *weight,
        }));
    }
}

fn normalize_forced_choice(question: &Question, value: &AnswerValue) -> NormalizedAnswer {
    let Some(index) = single_index(value) else {
        return malformed(question, "expected exactly one selected option");
    };
    if index >= question.options.len() {
        return malformed(question, &format!("option {index} does not exist"));
    }

    let mut contributions = Vec::new();
    option_weights(question, index, &mut contributions);
    NormalizedAnswer::Scored(contributions)
}

fn normalize_mcq(question: &Question, value: &AnswerValue) -> NormalizedAnswer {
    let mut selected: Vec<usize> = match value {
        AnswerValue::Choices(v) => v.clone(),
        other => match single_index(other) {
            Some(i) => vec![i],
            None => return malformed(question, "expected selected option indices"),
        },
    };
    selected.sort_unstable();
    selected.dedup();

    if !question.multi_select && selected.len() != 1 {
        return malformed(question, "single-select question needs exactly one selection");
    }
    if let Some(bad) = selected.iter().find(|&&i| i >= question.options.len()) {
        return malformed(question, &format!("option {bad} does not exist"));
    }

    let mut contributions = Vec::new();
    for index in selected {
        option_weights(question, index, &mut contributions);
    }
    NormalizedAnswer::Scored(contributions)
}

fn normalize_ordering(question: &Question, value: &AnswerValue) -> NormalizedAnswer {
    let order = match value {
        AnswerValue::Order(v) | AnswerValue::Choices(v) => v,
        _ => return malformed(question, "expected an ordering of option indices"),
    };

    let n = question.options.len();
    let mut seen = vec![false; n];
    for &index in order {
        if index >= n || seen[index] {
            return malformed(question, "ordering is not a permutation of the options");
        }
        seen[index] = true;
    }
    if order.len() != n {
        return malformed(question, "ordering does not rank every option");
    }

    let contributions = order
        .iter()
        .enumerate()
        .filter_map(|(position, &index)| {
            question.options[index]
                .trait_code
                .as_ref()
                .map(|trait_code| TraitContribution {
                    trait_code: trait_code.clone(),
                    format: ItemFormat::Ranking,
                    value: rank_weight(n, position),
                })
        })
        .collect();
    NormalizedAnswer::Scored(contributions)
}

/// Weight earned by the item at 0-based `position` out of `n`; first place earns `n - 1`.
pub fn rank_weight(n: usize, position: usize) -> f64 {
    n.saturating_sub(position + 1) as f64
}

fn malformed(question: &Question, reason: &str) -> NormalizedAnswer {
    tracing::warn!(question = %question.id, "treating answer as absent: {reason}");
    NormalizedAnswer::Malformed(format!("{}: {reason}", question.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChoiceOption, Instrument};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn likert(reverse_keyed: Option<bool>) -> Question {
        Question {
            id: "bf1".into(),
            page: None,
            instrument: Some(Instrument::BigFive),
            trait_code: Some("O".into()),
            question_type: QuestionType::Likert,
            reverse_keyed,
            bounds: Some(ScaleBounds::new(1.0, 5.0)),
            options: vec![],
            multi_select: false,
            text: "I have a vivid imagination.".into(),
            text_ar: None,
            options_ar: None,
        }
    }

    fn weighted(label: &str, weights: &[(&str, f64)]) -> ChoiceOption {
        ChoiceOption {
            label: label.into(),
            trait_code: None,
            weights: weights
                .iter()
                .map(|(t, w)| (t.to_string(), *w))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn ranked(label: &str, trait_code: &str) -> ChoiceOption {
        ChoiceOption {
            label: label.into(),
            trait_code: Some(trait_code.into()),
            weights: BTreeMap::new(),
        }
    }

    fn answer(value: AnswerValue) -> Answer {
        Answer::new("q", value, Utc::now())
    }

    fn single_value(result: NormalizedAnswer) -> f64 {
        match result {
            NormalizedAnswer::Scored(c) => {
                assert_eq!(c.len(), 1);
                c[0].value
            }
            other => panic!("expected a scored answer, got {other:?}"),
        }
    }

    fn scored(q: &Question, value: AnswerValue, working_scale: f64) -> f64 {
        single_value(normalize_answer(q, &answer(value), working_scale).unwrap())
    }

    #[test]
    fn likert_scales_into_working_range() {
        let q = likert(Some(false));
        assert_eq!(scored(&q, AnswerValue::Numeric(1.0), 2.0), 0.0);
        assert_eq!(scored(&q, AnswerValue::Numeric(3.0), 2.0), 1.0);
        assert_eq!(scored(&q, AnswerValue::Numeric(5.0), 2.0), 2.0);
    }

    #[test]
    fn reverse_key_symmetry() {
        let reversed = likert(Some(true));
        let forward = likert(Some(false));
        for v in [1.0, 1.5, 2.0, 3.0, 4.0, 4.25, 5.0] {
            let a = scored(&reversed, AnswerValue::Numeric(v), 4.0);
            let b = scored(&forward, AnswerValue::Numeric(1.0 + 5.0 - v), 4.0);
            assert!((a - b).abs() < 1e-12, "v={v}: {a} vs {b}");
        }
    }

    #[test]
    fn out_of_bounds_values_are_clamped() {
        let q = likert(Some(false));
        assert_eq!(scored(&q, AnswerValue::Numeric(9.0), 4.0), 4.0);
        assert_eq!(scored(&q, AnswerValue::Numeric(-3.0), 4.0), 0.0);
    }

    #[test]
    fn numeric_text_is_coerced_and_garbage_is_malformed() {
        let q = likert(Some(false));
        assert_eq!(scored(&q, AnswerValue::Text(" 5 ".into()), 4.0), 4.0);
        assert!(normalize_answer(&q, &answer(AnswerValue::Text("often".into())), 4.0)
            .unwrap()
            .is_malformed());
        assert!(normalize_answer(&q, &answer(AnswerValue::Numeric(f64::NAN)), 4.0)
            .unwrap()
            .is_malformed());
    }

    #[test]
    fn missing_scale_metadata_is_a_config_error() {
        let q = likert(None);
        assert_eq!(
            normalize_answer(&q, &answer(AnswerValue::Numeric(3.0)), 4.0).unwrap_err(),
            ConfigError::MissingReverseKey {
                question_id: "bf1".into()
            }
        );

        let mut q = likert(Some(false));
        q.bounds = None;
        assert!(matches!(
            normalize_answer(&q, &answer(AnswerValue::Numeric(3.0)), 4.0),
            Err(ConfigError::MissingBounds { .. })
        ));

        let mut q = likert(Some(false));
        q.bounds = Some(ScaleBounds::new(5.0, 1.0));
        assert!(matches!(
            normalize_answer(&q, &answer(AnswerValue::Numeric(3.0)), 4.0),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn forced_choice_is_a_lookup() {
        let mut q = likert(None);
        q.question_type = QuestionType::ForcedChoice;
        q.instrument = Some(Instrument::Riasec);
        q.bounds = None;
        q.options = vec![
            weighted("Fix an engine", &[("R", 2.0)]),
            weighted("Paint", &[("A", 2.0), ("S", 1.0)]),
        ];

        let result = normalize_answer(&q, &answer(AnswerValue::Choice(1)), 4.0).unwrap();
        let contributions = result.contributions();
        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[0].trait_code, "A");
        assert_eq!(contributions[0].value, 2.0);
        assert_eq!(contributions[1].format, ItemFormat::ForcedChoice);

        let coerced = normalize_answer(&q, &answer(AnswerValue::Numeric(0.0)), 4.0).unwrap();
        assert_eq!(coerced.contributions()[0].trait_code, "R");

        assert!(normalize_answer(&q, &answer(AnswerValue::Choice(2)), 4.0)
            .unwrap()
            .is_malformed());
        assert!(normalize_answer(&q, &answer(AnswerValue::Numeric(0.5)), 4.0)
            .unwrap()
            .is_malformed());
    }

    #[test]
    fn multi_select_counts_each_selection_once() {
        let mut q = likert(None);
        q.question_type = QuestionType::Mcq;
        q.instrument = Some(Instrument::Riasec);
        q.multi_select = true;
        q.options = vec![
            weighted("Camping", &[("R", 1.0)]),
            weighted("Debating", &[("E", 1.0)]),
            weighted("Filing", &[("C", 1.0)]),
        ];

        let result =
            normalize_answer(&q, &answer(AnswerValue::Choices(vec![2, 0, 2])), 4.0).unwrap();
        let traits: Vec<&str> = result
            .contributions()
            .iter()
            .map(|c| c.trait_code.as_str())
            .collect();
        assert_eq!(traits, vec!["R", "C"]);

        let none = normalize_answer(&q, &answer(AnswerValue::Choices(vec![])), 4.0).unwrap();
        assert_eq!(none, NormalizedAnswer::Scored(vec![]));

        q.multi_select = false;
        assert!(normalize_answer(&q, &answer(AnswerValue::Choices(vec![0, 1])), 4.0)
            .unwrap()
            .is_malformed());
    }

    #[test]
    fn ordering_earlier_rank_weighs_more() {
        let mut q = likert(None);
        q.question_type = QuestionType::Ordering;
        q.instrument = Some(Instrument::Riasec);
        q.options = vec![ranked("Build", "R"), ranked("Research", "I"), ranked("Design", "A")];

        let result = normalize_answer(&q, &answer(AnswerValue::Order(vec![2, 0, 1])), 4.0).unwrap();
        let got: Vec<(&str, f64)> = result
            .contributions()
            .iter()
            .map(|c| (c.trait_code.as_str(), c.value))
            .collect();
        assert_eq!(got, vec![("A", 2.0), ("R", 1.0), ("I", 0.0)]);

        for broken in [vec![0, 0, 1], vec![0, 1], vec![0, 1, 3]] {
            assert!(normalize_answer(&q, &answer(AnswerValue::Order(broken)), 4.0)
                .unwrap()
                .is_malformed());
        }
    }

    #[test]
    fn essays_and_untagged_questions_are_unscored() {
        let mut q = likert(None);
        q.question_type = QuestionType::Essay;
        assert_eq!(
            normalize_answer(&q, &answer(AnswerValue::Text("I like robots".into())), 4.0).unwrap(),
            NormalizedAnswer::Unscored
        );

        let mut q = likert(None);
        q.instrument = None;
        assert_eq!(
            normalize_answer(&q, &answer(AnswerValue::Numeric(3.0)), 4.0).unwrap(),
            NormalizedAnswer::Unscored
        );
    }

    #[test]
    fn rank_weights() {
        assert_eq!(rank_weight(6, 0), 5.0);
        assert_eq!(rank_weight(6, 5), 0.0);
    }
}
