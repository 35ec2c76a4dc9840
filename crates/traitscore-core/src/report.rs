//! Score record types with JSON persistence and drift detection.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Instrument, ScoringPolicyKind};

/// Score and interpretation of one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    /// 0-100, one decimal.
    pub score: f64,
    /// Policy-specific raw value the score was rescaled from.
    pub raw: f64,
    pub label: String,
}

/// Result of one instrument for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentResult {
    /// Every question of the instrument has a usable answer.
    pub complete: bool,
    /// Questions with a usable answer.
    pub answered: usize,
    /// Questions tagged to the instrument in the bank.
    pub required: usize,
    #[serde(default)]
    pub policy: Option<ScoringPolicyKind>,
    /// Empty unless `complete`.
    #[serde(default)]
    pub traits: BTreeMap<String, TraitScore>,
    /// Top-three RIASEC code; only set for a complete RIASEC result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_code: Option<String>,
    /// Answers that were discarded as malformed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed: Vec<String>,
}

impl InstrumentResult {
    /// An instrument the bank defines no questions for.
    pub fn not_administered() -> Self {
        Self {
            complete: false,
            answered: 0,
            required: 0,
            policy: None,
            traits: BTreeMap::new(),
            profile_code: None,
            malformed: Vec::new(),
        }
    }
}

/// Computed output for one response session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub session_id: String,
    /// Bank the session was scored against.
    pub bank_id: String,
    /// Completion time of the scored session.
    pub completed_at: DateTime<Utc>,
    pub instruments: BTreeMap<Instrument, InstrumentResult>,
}

impl ScoreRecord {
    pub fn instrument(&self, instrument: Instrument) -> Option<&InstrumentResult> {
        self.instruments.get(&instrument)
    }

    pub fn is_complete(&self, instrument: Instrument) -> bool {
        self.instrument(instrument).is_some_and(|r| r.complete)
    }

    /// Score of `trait_code`, present only for complete instruments.
    pub fn trait_score(&self, instrument: Instrument, trait_code: &str) -> Option<&TraitScore> {
        self.instrument(instrument)?.traits.get(trait_code)
    }

    pub fn profile_code(&self) -> Option<&str> {
        self.instrument(Instrument::Riasec)?.profile_code.as_deref()
    }

    /// Save the record as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize score record")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write score record to {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read score record from {}", path.display()))?;
        let record: ScoreRecord =
            serde_json::from_str(&content).context("failed to parse score record JSON")?;
        Ok(record)
    }

    /// Compare this record against a baseline, e.g. after re-scoring with an edited bank.
    ///
    /// A trait drifts when its score moved by more than `threshold` points.
    pub fn compare(&self, baseline: &ScoreRecord, threshold: f64) -> DriftReport {
        let mut drifted = Vec::new();
        let mut unchanged = 0usize;
        let mut completeness_changes = Vec::new();
        let mut profile_change = None;

        for instrument in Instrument::ALL {
            let before = baseline.instrument(instrument);
            let after = self.instrument(instrument);
            let was_complete = before.is_some_and(|r| r.complete);
            let is_complete = after.is_some_and(|r| r.complete);

            if was_complete != is_complete {
                completeness_changes.push(CompletenessChange {
                    instrument,
                    baseline: was_complete,
                    current: is_complete,
                });
                continue;
            }

            let (Some(before), Some(after)) = (before, after) else {
                continue;
            };
            for (trait_code, current) in &after.traits {
                let Some(previous) = before.traits.get(trait_code) else {
                    continue;
                };
                let delta = current.score - previous.score;
                if delta.abs() > threshold {
                    drifted.push(TraitDrift {
                        instrument,
                        trait_code: trait_code.clone(),
                        baseline_score: previous.score,
                        current_score: current.score,
                        delta,
                        label_changed: previous.label != current.label,
                    });
                } else {
                    unchanged += 1;
                }
            }
        }

        if baseline.profile_code() != self.profile_code() {
            profile_change = Some((
                baseline.profile_code().map(String::from),
                self.profile_code().map(String::from),
            ));
        }

        DriftReport {
            session_id: self.session_id.clone(),
            drifted,
            unchanged,
            completeness_changes,
            profile_change,
        }
    }
}

/// Result of comparing two score records for the same session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub session_id: String,
    /// Traits whose score moved beyond the threshold.
    pub drifted: Vec<TraitDrift>,
    /// Traits within the threshold.
    pub unchanged: usize,
    /// Instruments whose completeness flipped.
    pub completeness_changes: Vec<CompletenessChange>,
    /// Baseline and current RIASEC codes, when they differ.
    pub profile_change: Option<(Option<String>, Option<String>)>,
}

/// A trait score that moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDrift {
    pub instrument: Instrument,
    pub trait_code: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
    pub label_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessChange {
    pub instrument: Instrument,
    pub baseline: bool,
    pub current: bool,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.drifted.is_empty()
            || !self.completeness_changes.is_empty()
            || self.profile_change.is_some()
    }

    /// Format the drift report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Session {}:** {} drifted, {} unchanged\n\n",
            self.session_id,
            self.drifted.len(),
            self.unchanged
        ));

        if !self.drifted.is_empty() {
            md.push_str("### Drifted traits\n\n");
            md.push_str("| Instrument | Trait | Baseline | Current | Delta |\n");
            md.push_str("|------------|-------|----------|---------|-------|\n");
            for d in &self.drifted {
                md.push_str(&format!(
                    "| {} | {} | {:.1} | {:.1} | {:+.1} |\n",
                    d.instrument, d.trait_code, d.baseline_score, d.current_score, d.delta
                ));
            }
            md.push('\n');
        }

        if !self.completeness_changes.is_empty() {
            md.push_str("### Completeness changes\n\n");
            for c in &self.completeness_changes {
                md.push_str(&format!("- {}: {} -> {}\n", c.instrument, c.baseline, c.current));
            }
            md.push('\n');
        }

        if let Some((before, after)) = &self.profile_change {
            md.push_str(&format!(
                "Profile code: {} -> {}\n",
                before.as_deref().unwrap_or("-"),
                after.as_deref().unwrap_or("-")
            ));
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trait_score(score: f64, label: &str) -> TraitScore {
        TraitScore {
            score,
            raw: score,
            label: label.into(),
        }
    }

    fn make_record(riasec: &[(&str, f64)], profile: &str, big_five_complete: bool) -> ScoreRecord {
        let mut instruments = BTreeMap::new();
        instruments.insert(
            Instrument::Riasec,
            InstrumentResult {
                complete: true,
                answered: 6,
                required: 6,
                policy: Some(ScoringPolicyKind::WeightedComposite),
                traits: riasec
                    .iter()
                    .map(|(t, s)| (t.to_string(), trait_score(*s, "Moderate / typical range")))
                    .collect(),
                profile_code: Some(profile.into()),
                malformed: vec![],
            },
        );
        instruments.insert(
            Instrument::BigFive,
            InstrumentResult {
                complete: big_five_complete,
                answered: if big_five_complete { 10 } else { 9 },
                required: 10,
                policy: Some(ScoringPolicyKind::MeanScaled),
                traits: BTreeMap::new(),
                profile_code: None,
                malformed: vec![],
            },
        );
        ScoreRecord {
            session_id: "s1".into(),
            bank_id: "bank".into(),
            completed_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            instruments,
        }
    }

    #[test]
    fn compare_identical_records() {
        let record = make_record(&[("R", 50.0), ("I", 40.0)], "RI", true);
        let report = record.compare(&record.clone(), 0.5);
        assert!(!report.has_drift());
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn compare_detects_trait_drift_and_profile_change() {
        let baseline = make_record(&[("R", 50.0), ("I", 40.0)], "RI", true);
        let current = make_record(&[("R", 38.0), ("I", 40.2)], "IR", true);

        let report = current.compare(&baseline, 0.5);
        assert_eq!(report.drifted.len(), 1);
        assert_eq!(report.drifted[0].trait_code, "R");
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.profile_change, Some((Some("RI".into()), Some("IR".into()))));
        assert!(report.to_markdown().contains("Drifted traits"));
    }

    #[test]
    fn compare_reports_completeness_flip() {
        let baseline = make_record(&[("R", 50.0)], "R", true);
        let current = make_record(&[("R", 50.0)], "R", false);
        let report = current.compare(&baseline, 0.5);
        assert_eq!(report.completeness_changes.len(), 1);
        assert_eq!(report.completeness_changes[0].instrument, Instrument::BigFive);
        assert!(report.has_drift());
    }

    #[test]
    fn json_roundtrip() {
        let record = make_record(&[("R", 50.0)], "R", true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/record.json");

        record.save_json(&path).unwrap();
        let loaded = ScoreRecord::load_json(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.profile_code(), Some("R"));
    }
}
