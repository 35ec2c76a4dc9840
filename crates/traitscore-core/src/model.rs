//! Core data model types for traitscore.
//!
//! Questions, pages, and instrument configuration make up a question bank;
//! answers belong to exactly one response session.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::InterpretationScheme;
use crate::error::SessionError;

/// One complete assessment module with its own question set and policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    Riasec,
    BigFive,
    WorkRhythm,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [
        Instrument::Riasec,
        Instrument::BigFive,
        Instrument::WorkRhythm,
    ];
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Riasec => write!(f, "riasec"),
            Instrument::BigFive => write!(f, "big_five"),
            Instrument::WorkRhythm => write!(f, "work_rhythm"),
        }
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "riasec" => Ok(Instrument::Riasec),
            "big_five" | "bigfive" | "ocean" => Ok(Instrument::BigFive),
            "work_rhythm" | "workrhythm" => Ok(Instrument::WorkRhythm),
            other => Err(format!("unknown instrument: {other}")),
        }
    }
}

/// Question formats a student can be asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Essay,
    Slider,
    Mcq,
    Ordering,
    Likert,
    ForcedChoice,
}

impl QuestionType {
    /// Slider and Likert items carry a numeric scale.
    pub fn is_scale(&self) -> bool {
        matches!(self, QuestionType::Slider | QuestionType::Likert)
    }

    /// Items whose answer selects one or more options.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::ForcedChoice)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Essay => write!(f, "essay"),
            QuestionType::Slider => write!(f, "slider"),
            QuestionType::Mcq => write!(f, "mcq"),
            QuestionType::Ordering => write!(f, "ordering"),
            QuestionType::Likert => write!(f, "likert"),
            QuestionType::ForcedChoice => write!(f, "forced_choice"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "essay" => Ok(QuestionType::Essay),
            "slider" => Ok(QuestionType::Slider),
            "mcq" => Ok(QuestionType::Mcq),
            "ordering" | "ranking" => Ok(QuestionType::Ordering),
            "likert" => Ok(QuestionType::Likert),
            "forced_choice" | "forcedchoice" => Ok(QuestionType::ForcedChoice),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// Declared numeric range of a slider or Likert item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// One selectable option of an mcq, forced-choice, or ordering question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// English label.
    pub label: String,
    /// Trait credited by rank position (ordering questions).
    #[serde(default, rename = "trait")]
    pub trait_code: Option<String>,
    /// Trait weights credited when the option is selected (choice questions).
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl ChoiceOption {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            trait_code: None,
            weights: BTreeMap::new(),
        }
    }
}

/// One assessment item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Page the question is displayed on.
    #[serde(default)]
    pub page: Option<String>,
    /// Instrument this question belongs to; `None` for unscored survey items.
    #[serde(default)]
    pub instrument: Option<Instrument>,
    /// Trait credited by a scale item.
    #[serde(default, rename = "trait")]
    pub trait_code: Option<String>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Whether higher raw values indicate lower standing on the trait.
    #[serde(default)]
    pub reverse_keyed: Option<bool>,
    #[serde(default)]
    pub bounds: Option<ScaleBounds>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    /// Allows more than one selection on an mcq item.
    #[serde(default)]
    pub multi_select: bool,
    pub text: String,
    #[serde(default)]
    pub text_ar: Option<String>,
    #[serde(default)]
    pub options_ar: Option<Vec<String>>,
}

/// A group of questions shown together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub title_ar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_ar: Option<String>,
}

/// How an instrument turns contributions into 0-100 trait scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicyKind {
    /// Legacy weighted composite across item formats.
    WeightedComposite,
    /// Current direct sum of integer item points.
    DirectSum,
    /// Mean of normalized items times `100 / working_scale`.
    MeanScaled,
}

impl fmt::Display for ScoringPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringPolicyKind::WeightedComposite => write!(f, "weighted_composite"),
            ScoringPolicyKind::DirectSum => write!(f, "direct_sum"),
            ScoringPolicyKind::MeanScaled => write!(f, "mean_scaled"),
        }
    }
}

/// Per-format weights of the weighted composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatWeights {
    #[serde(default = "default_likert_weight")]
    pub likert: f64,
    #[serde(default = "default_forced_choice_weight")]
    pub forced_choice: f64,
    #[serde(default = "default_ranking_weight")]
    pub ranking: f64,
}

impl Default for FormatWeights {
    fn default() -> Self {
        Self {
            likert: default_likert_weight(),
            forced_choice: default_forced_choice_weight(),
            ranking: default_ranking_weight(),
        }
    }
}

fn default_likert_weight() -> f64 {
    0.5
}

fn default_forced_choice_weight() -> f64 {
    0.3
}

fn default_ranking_weight() -> f64 {
    0.2
}

/// Scoring configuration for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub instrument: Instrument,
    pub policy: ScoringPolicyKind,
    /// Upper end `N` of the `[0, N]` scale that slider/Likert answers map into.
    pub working_scale: f64,
    /// Declared traits in canonical order.
    pub traits: Vec<String>,
    #[serde(default)]
    pub weights: FormatWeights,
    /// Overrides the default interpretation bands for this instrument.
    #[serde(default)]
    pub interpretation: Option<InterpretationScheme>,
}

/// A full question bank: instruments, pages, and questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn instrument_config(&self, instrument: Instrument) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|c| c.instrument == instrument)
    }

    /// Questions tagged to `instrument`, in bank order.
    pub fn questions_for(&self, instrument: Instrument) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .filter(move |q| q.instrument == Some(instrument))
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }
}

/// Raw answer payload, shaped by the question type it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Numeric(f64),
    Choice(usize),
    Choices(Vec<usize>),
    /// Option indices, highest rank first.
    Order(Vec<usize>),
    Text(String),
}

/// One student's response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub value: AnswerValue,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(
        question_id: impl Into<String>,
        value: AnswerValue,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            value,
            answered_at,
        }
    }
}

/// Demographic fields collected at session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
}

/// One student's full submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSession {
    pub id: String,
    #[serde(default)]
    pub student: Demographics,
    /// Preferred display language of the student.
    #[serde(default)]
    pub language: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Answers keyed by question id.
    #[serde(default, with = "answer_list")]
    pub answers: BTreeMap<String, Answer>,
}

impl ResponseSession {
    pub fn new(id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            student: Demographics::default(),
            language: None,
            started_at,
            completed_at: None,
            answers: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Record an answer, replacing any earlier answer to the same question.
    ///
    /// Returns the replaced answer, if there was one.
    pub fn record_answer(&mut self, answer: Answer) -> Result<Option<Answer>, SessionError> {
        if self.is_complete() {
            return Err(SessionError::AlreadyCompleted(self.id.clone()));
        }
        Ok(self.answers.insert(answer.question_id.clone(), answer))
    }

    /// Mark the session complete; no further answers are accepted.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::AlreadyCompleted(self.id.clone()));
        }
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }
}

/// Answers travel as a JSON list; a later entry for the same question wins.
mod answer_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::Answer;

    pub fn serialize<S>(
        answers: &BTreeMap<String, Answer>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(answers.values())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Answer>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<Answer>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|answer| (answer.question_id.clone(), answer))
            .collect())
    }
}
