//! Central scoring engine.
//!
//! Built once per question bank and shared across sessions. Scoring a single
//! session is synchronous; batches score independent sessions in parallel.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::classify::InterpretationScheme;
use crate::error::{ConfigError, ScoringError};
use crate::model::{Instrument, QuestionBank, ResponseSession};
use crate::record::{build_blueprints, InstrumentBlueprint, ScoreRecordBuilder};
use crate::report::ScoreRecord;

/// Progress reporting trait for batch scoring.
pub trait ProgressReporter: Send + Sync {
    fn on_session_scored(&self, record: &ScoreRecord);
    fn on_session_error(&self, session_id: &str, error: &ScoringError);
    fn on_batch_complete(&self, total: usize, scored: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_session_scored(&self, _: &ScoreRecord) {}
    fn on_session_error(&self, _: &str, _: &ScoringError) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Outcome of scoring many sessions.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Records keyed by session id.
    pub records: BTreeMap<String, ScoreRecord>,
    /// Failures keyed by session id.
    pub failures: BTreeMap<String, ScoringError>,
    pub duration_ms: u64,
}

/// Scores response sessions against one question bank.
#[derive(Debug)]
pub struct ScoringEngine {
    bank: QuestionBank,
    blueprints: BTreeMap<Instrument, InstrumentBlueprint>,
}

impl ScoringEngine {
    /// Build an engine with the legacy three-band interpretation as default.
    pub fn new(bank: QuestionBank) -> Result<Self, ConfigError> {
        Self::with_interpretation(bank, InterpretationScheme::default())
    }

    /// Build an engine whose instruments fall back to `default_scheme`.
    pub fn with_interpretation(
        bank: QuestionBank,
        default_scheme: InterpretationScheme,
    ) -> Result<Self, ConfigError> {
        let blueprints = build_blueprints(&bank, default_scheme)?;
        Ok(Self { bank, blueprints })
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn blueprint(&self, instrument: Instrument) -> Option<&InstrumentBlueprint> {
        self.blueprints.get(&instrument)
    }

    /// Score one completed session.
    pub fn score(&self, session: &ResponseSession) -> Result<ScoreRecord, ScoringError> {
        ScoreRecordBuilder::new(&self.bank, &self.blueprints).build(session)
    }

    /// Score independent sessions in parallel, at most `parallelism` at a time.
    ///
    /// A failing session never aborts the batch; it is reported in
    /// [`BatchOutcome::failures`].
    pub async fn score_batch(
        self: &Arc<Self>,
        sessions: Vec<ResponseSession>,
        parallelism: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchOutcome> {
        let engine = Arc::clone(self);
        run_batch(sessions, parallelism, progress, move |session: &ResponseSession| {
            engine.score(session)
        })
        .await
    }
}

/// Run `score` for each session on the blocking pool, at most `parallelism` at a time.
async fn run_batch<F>(
    sessions: Vec<ResponseSession>,
    parallelism: usize,
    progress: &dyn ProgressReporter,
    score: F,
) -> Result<BatchOutcome>
where
    F: Fn(&ResponseSession) -> Result<ScoreRecord, ScoringError> + Send + Sync + 'static,
{
    let start = Instant::now();
    let score = Arc::new(score);
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut futures = FuturesUnordered::new();

    for session in sessions {
        let score = Arc::clone(&score);
        let semaphore = Arc::clone(&semaphore);
        futures.push(async move {
            let session_id = session.id.clone();
            let _permit = semaphore.acquire_owned().await?;
            let result = tokio::task::spawn_blocking(move || (*score)(&session))
                .await
                .unwrap_or_else(|e| {
                    Err(ScoringError::TaskFailed {
                        session_id: session_id.clone(),
                        message: e.to_string(),
                    })
                });
            Ok::<_, anyhow::Error>((session_id, result))
        });
    }

    let total = futures.len();
    let mut outcome = BatchOutcome::default();

    while let Some(next) = futures.next().await {
        let (session_id, result) = next?;
        match result {
            Ok(record) => {
                progress.on_session_scored(&record);
                outcome.records.insert(session_id, record);
            }
            Err(e) => {
                tracing::error!("scoring failed for session {session_id}: {e}");
                progress.on_session_error(&session_id, &e);
                outcome.failures.insert(session_id, e);
            }
        }
    }

    let elapsed = start.elapsed();
    let (scored, failed) = (outcome.records.len(), outcome.failures.len());
    progress.on_batch_complete(total, scored, failed, elapsed);
    tracing::info!(total, scored, failed, "batch scoring complete");
    outcome.duration_ms = elapsed.as_millis() as u64;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Answer, AnswerValue, ChoiceOption, FormatWeights, InstrumentConfig, Question, QuestionType,
        ScaleBounds, ScoringPolicyKind,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn scale(id: &str, instrument: Instrument, trait_code: &str, reverse: bool) -> Question {
        Question {
            id: id.into(),
            page: None,
            instrument: Some(instrument),
            trait_code: Some(trait_code.into()),
            question_type: QuestionType::Likert,
            reverse_keyed: Some(reverse),
            bounds: Some(ScaleBounds::new(1.0, 5.0)),
            options: vec![],
            multi_select: false,
            text: id.into(),
            text_ar: None,
            options_ar: None,
        }
    }

    fn bank() -> QuestionBank {
        let mut questions = vec![
            scale("o1", Instrument::BigFive, "O", false),
            scale("o2", Instrument::BigFive, "O", true),
            scale("c1", Instrument::BigFive, "C", false),
        ];
        let mut ranking = scale("rk", Instrument::Riasec, "R", false);
        ranking.question_type = QuestionType::Ordering;
        ranking.trait_code = None;
        ranking.bounds = None;
        ranking.reverse_keyed = None;
        ranking.options = ["R", "I", "A", "S", "E", "C"]
            .iter()
            .map(|t| ChoiceOption {
                label: t.to_string(),
                trait_code: Some(t.to_string()),
                weights: Default::default(),
            })
            .collect();
        questions.push(ranking);

        QuestionBank {
            id: "unit".into(),
            name: "Unit bank".into(),
            description: String::new(),
            instruments: vec![
                InstrumentConfig {
                    instrument: Instrument::BigFive,
                    policy: ScoringPolicyKind::MeanScaled,
                    working_scale: 4.0,
                    traits: vec!["O".into(), "C".into()],
                    weights: FormatWeights::default(),
                    interpretation: None,
                },
                InstrumentConfig {
                    instrument: Instrument::Riasec,
                    policy: ScoringPolicyKind::DirectSum,
                    working_scale: 4.0,
                    traits: ["R", "I", "A", "S", "E", "C"].iter().map(|t| t.to_string()).collect(),
                    weights: FormatWeights::default(),
                    interpretation: None,
                },
            ],
            pages: vec![],
            questions,
        }
    }

    fn session(id: &str, answers: Vec<(&str, AnswerValue)>) -> ResponseSession {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        let mut session = ResponseSession::new(id, start);
        for (question_id, value) in answers {
            session
                .record_answer(Answer::new(question_id, value, start))
                .unwrap();
        }
        session
            .complete(start + chrono::Duration::minutes(20))
            .unwrap();
        session
    }

    fn full_session(id: &str) -> ResponseSession {
        session(
            id,
            vec![
                ("o1", AnswerValue::Numeric(5.0)),
                ("o2", AnswerValue::Numeric(1.0)),
                ("c1", AnswerValue::Numeric(3.0)),
                ("rk", AnswerValue::Order(vec![3, 0, 1, 2, 4, 5])),
            ],
        )
    }

    #[test]
    fn scores_complete_instruments() {
        let engine = ScoringEngine::new(bank()).unwrap();
        let record = engine.score(&full_session("s1")).unwrap();

        assert!(record.is_complete(Instrument::BigFive));
        assert_eq!(record.trait_score(Instrument::BigFive, "O").unwrap().score, 100.0);
        assert_eq!(record.trait_score(Instrument::BigFive, "C").unwrap().score, 50.0);
        assert_eq!(
            record.trait_score(Instrument::BigFive, "O").unwrap().label,
            "High / strength area"
        );

        // ranked S, R, I, A, E, C on a single six-option item
        assert_eq!(record.trait_score(Instrument::Riasec, "S").unwrap().score, 100.0);
        assert_eq!(record.trait_score(Instrument::Riasec, "C").unwrap().score, 0.0);
        assert_eq!(record.profile_code(), Some("SRI"));

        assert!(!record.is_complete(Instrument::WorkRhythm));
        assert_eq!(record.instrument(Instrument::WorkRhythm).unwrap().required, 0);
    }

    #[test]
    fn rescoring_is_deterministic() {
        let engine = ScoringEngine::new(bank()).unwrap();
        let session = full_session("s1");
        assert_eq!(engine.score(&session).unwrap(), engine.score(&session).unwrap());
    }

    #[test]
    fn malformed_answer_degrades_only_its_instrument() {
        let engine = ScoringEngine::new(bank()).unwrap();
        let record = engine
            .score(&session(
                "s2",
                vec![
                    ("o1", AnswerValue::Numeric(5.0)),
                    ("o2", AnswerValue::Text("sometimes".into())),
                    ("c1", AnswerValue::Numeric(3.0)),
                    ("rk", AnswerValue::Order(vec![0, 1, 2, 3, 4, 5])),
                ],
            ))
            .unwrap();

        let big_five = record.instrument(Instrument::BigFive).unwrap();
        assert!(!big_five.complete);
        assert!(big_five.traits.is_empty());
        assert_eq!(big_five.malformed.len(), 1);
        assert!(record.is_complete(Instrument::Riasec));
        assert_eq!(record.profile_code(), Some("RIA"));
    }

    #[test]
    fn incomplete_session_is_rejected() {
        let engine = ScoringEngine::new(bank()).unwrap();
        let open = ResponseSession::new("s3", Utc::now());
        assert_eq!(
            engine.score(&open).unwrap_err(),
            ScoringError::SessionNotComplete("s3".into())
        );
    }

    #[test]
    fn unknown_question_is_a_config_error() {
        let engine = ScoringEngine::new(bank()).unwrap();
        let err = engine
            .score(&session("s4", vec![("ghost", AnswerValue::Numeric(1.0))]))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn missing_instrument_config_fails_engine_build() {
        let mut bank = bank();
        bank.instruments.retain(|c| c.instrument != Instrument::Riasec);
        assert_eq!(
            ScoringEngine::new(bank).unwrap_err(),
            ConfigError::MissingInstrument(Instrument::Riasec)
        );
    }

    #[test]
    fn duplicate_question_ids_fail_engine_build() {
        let mut bank = bank();
        bank.questions.push(scale("o1", Instrument::WorkRhythm, "pace", false));
        assert_eq!(
            ScoringEngine::new(bank).unwrap_err(),
            ConfigError::DuplicateQuestion("o1".into())
        );
    }

    #[test]
    fn instrument_scheme_overrides_default() {
        let mut bank = bank();
        bank.instruments[0].interpretation = Some(InterpretationScheme::FourBand);
        let engine = ScoringEngine::new(bank).unwrap();
        let record = engine.score(&full_session("s5")).unwrap();
        assert_eq!(record.trait_score(Instrument::BigFive, "O").unwrap().label, "Very High");
        assert_eq!(
            record.trait_score(Instrument::Riasec, "S").unwrap().label,
            "High / strength area"
        );
    }

    struct CountingReporter {
        scored: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
    }

    impl ProgressReporter for CountingReporter {
        fn on_session_scored(&self, record: &ScoreRecord) {
            self.scored.lock().unwrap().push(record.session_id.clone());
        }
        fn on_session_error(&self, session_id: &str, _: &ScoringError) {
            self.failed.lock().unwrap().push(session_id.to_string());
        }
        fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
    }

    #[tokio::test]
    async fn batch_scores_sessions_independently() {
        let engine = Arc::new(ScoringEngine::new(bank()).unwrap());
        let sessions = vec![
            full_session("a"),
            full_session("b"),
            ResponseSession::new("open", Utc::now()),
            full_session("c"),
        ];
        let reporter = CountingReporter {
            scored: Mutex::new(vec![]),
            failed: Mutex::new(vec![]),
        };

        let outcome = engine.score_batch(sessions, 2, &reporter).await.unwrap();
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures.contains_key("open"));
        assert_eq!(reporter.scored.lock().unwrap().len(), 3);
        assert_eq!(reporter.failed.lock().unwrap().as_slice(), ["open".to_string()]);
        assert_eq!(outcome.records["a"], engine.score(&full_session("a")).unwrap());
    }

    #[tokio::test]
    async fn panicking_session_does_not_abort_batch() {
        let engine = Arc::new(ScoringEngine::new(bank()).unwrap());
        let scorer = Arc::clone(&engine);
        let sessions = vec![full_session("a"), full_session("boom"), full_session("b")];

        let outcome = run_batch(sessions, 2, &NoopReporter, move |session: &ResponseSession| {
            if session.id == "boom" {
                panic!("scoring blew up");
            }
            scorer.score(session)
        })
        .await
        .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.contains_key("a"));
        assert!(outcome.records.contains_key("b"));
        assert!(matches!(
            &outcome.failures["boom"],
            ScoringError::TaskFailed { session_id, .. } if session_id == "boom"
        ));
    }
}
