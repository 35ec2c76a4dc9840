//! Interpretation labels and RIASEC profile codes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical RIASEC order, also the tie-break order for profile codes.
pub const RIASEC_ORDER: [char; 6] = ['R', 'I', 'A', 'S', 'E', 'C'];

/// Number of letters in a RIASEC profile code.
pub const PROFILE_CODE_LEN: usize = 3;

/// Named banding schemes an instrument can select.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationScheme {
    /// Low / Moderate / High at 30 and 70.
    #[default]
    ThreeBand,
    /// Low / Medium / High / Very High at 25, 50, and 75.
    FourBand,
}

impl InterpretationScheme {
    pub fn table(self) -> InterpretationTable {
        match self {
            InterpretationScheme::ThreeBand => InterpretationTable::three_band(),
            InterpretationScheme::FourBand => InterpretationTable::four_band(),
        }
    }
}

/// One band: scores at or above `lower` (and below the next band) get `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: f64,
    pub label: String,
}

/// Immutable score-to-label table.
///
/// Bands are sorted by lower bound; the top band includes 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationTable {
    bands: Vec<Band>,
}

impl InterpretationTable {
    /// Build a table from `(lower bound, label)` pairs in any order.
    ///
    /// The lowest band is extended down to 0 so every valid score has a label.
    pub fn new(bands: impl IntoIterator<Item = (f64, String)>) -> Self {
        let mut bands: Vec<Band> = bands
            .into_iter()
            .map(|(lower, label)| Band { lower, label })
            .collect();
        bands.sort_by(|a, b| a.lower.total_cmp(&b.lower));
        if let Some(first) = bands.first_mut() {
            first.lower = first.lower.min(0.0);
        }
        Self { bands }
    }

    /// Legacy labels used by every instrument unless it opts into finer bands.
    pub fn three_band() -> Self {
        Self::new([
            (0.0, "Low / area for development".to_string()),
            (30.0, "Moderate / typical range".to_string()),
            (70.0, "High / strength area".to_string()),
        ])
    }

    pub fn four_band() -> Self {
        Self::new([
            (0.0, "Low".to_string()),
            (25.0, "Medium".to_string()),
            (50.0, "High".to_string()),
            (75.0, "Very High".to_string()),
        ])
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Label for a 0-100 score.
    pub fn classify(&self, score: f64) -> &str {
        let score = score.clamp(0.0, 100.0);
        self.bands
            .iter()
            .rev()
            .find(|band| score >= band.lower)
            .or_else(|| self.bands.first())
            .map(|band| band.label.as_str())
            .unwrap_or("")
    }
}

impl Default for InterpretationTable {
    fn default() -> Self {
        Self::three_band()
    }
}

fn canonical_rank(trait_code: &str) -> usize {
    trait_code
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .and_then(|c| RIASEC_ORDER.iter().position(|&r| r == c))
        .unwrap_or(RIASEC_ORDER.len())
}

/// Top-three RIASEC initials, highest score first.
///
/// Ties are broken by canonical R, I, A, S, E, C order, so the result is
/// fully determined by the scores.
pub fn riasec_profile_code(scores: &BTreeMap<String, f64>) -> String {
    let mut ranked: Vec<(&str, f64)> = scores.iter().map(|(t, s)| (t.as_str(), *s)).collect();
    ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => canonical_rank(a.0)
            .cmp(&canonical_rank(b.0))
            .then_with(|| a.0.cmp(b.0)),
        other => other,
    });

    ranked
        .into_iter()
        .take(PROFILE_CODE_LEN)
        .filter_map(|(trait_code, _)| trait_code.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
