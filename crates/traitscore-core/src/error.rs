//! Scoring error types.
//!
//! Configuration errors describe problems with the question bank itself and
//! are kept apart from ordinary incompleteness, which is never an error.

use thiserror::Error;

use crate::model::{Instrument, QuestionType};

/// The question bank is missing or contradicting metadata needed for scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An answer references a question the bank does not define.
    #[error("answer references unknown question: {0}")]
    UnknownQuestion(String),

    /// Two questions share an id, so answers cannot be attributed.
    #[error("question id {0} is defined more than once")]
    DuplicateQuestion(String),

    /// A scored scale item has no trait tag.
    #[error("question {question_id} has no trait tag")]
    MissingTrait { question_id: String },

    /// A slider or Likert item has no min/max bounds.
    #[error("question {question_id} has no scale bounds")]
    MissingBounds { question_id: String },

    /// A slider or Likert item has no reverse-key flag.
    #[error("question {question_id} has no reverse-key flag")]
    MissingReverseKey { question_id: String },

    /// Scale bounds where `min >= max`.
    #[error("question {question_id} has invalid bounds [{min}, {max}]")]
    InvalidBounds {
        question_id: String,
        min: f64,
        max: f64,
    },

    /// A question names a trait its instrument does not declare.
    #[error("question {question_id} uses trait '{trait_code}' not declared by {instrument}")]
    UndeclaredTrait {
        question_id: String,
        instrument: Instrument,
        trait_code: String,
    },

    /// A question is tagged to an instrument with no configuration.
    #[error("no configuration for instrument {0}")]
    MissingInstrument(Instrument),

    /// The instrument's scoring policy cannot consume this question type.
    #[error("{policy} policy cannot score {question_type} question {question_id}")]
    UnsupportedQuestionType {
        question_id: String,
        question_type: QuestionType,
        policy: &'static str,
    },

    /// A declared trait has no items feeding it.
    #[error("trait '{trait_code}' of {instrument} has no scored items")]
    EmptyTrait {
        instrument: Instrument,
        trait_code: String,
    },

    /// The theoretical minimum equals the maximum, so no rescaling is possible.
    #[error("trait '{trait_code}' of {instrument} has a degenerate range [{min}, {max}]")]
    DegenerateTrait {
        instrument: Instrument,
        trait_code: String,
        min: f64,
        max: f64,
    },

    /// The working scale must be a positive, finite number.
    #[error("{instrument} working scale must be positive, got {scale}")]
    InvalidWorkingScale { instrument: Instrument, scale: f64 },
}

/// Errors that stop a session from being scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// Scoring only runs against sessions marked complete.
    #[error("session {0} is not marked complete")]
    SessionNotComplete(String),

    /// The bank is broken; the session itself may be fine.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The scoring task for this session died before returning a result.
    #[error("scoring task for session {session_id} failed: {message}")]
    TaskFailed { session_id: String, message: String },
}

impl ScoringError {
    /// Returns `true` if the failure points at the question bank rather than the session.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScoringError::Config(_))
    }
}

/// Errors raised while mutating a response session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Completed sessions are immutable.
    #[error("session {0} is already complete")]
    AlreadyCompleted(String),
}

/// Errors raised by score stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed score record: {0}")]
    Serde(#[from] serde_json::Error),

    /// Session ids become file names, so path separators are rejected.
    #[error("invalid session id for storage: '{0}'")]
    InvalidSessionId(String),
}
