//! # ICAO Scoring
//!
//! Fixed-point scores and the ICAO level lookup.
//!
//! Scores are stored in tenths so the CORE never touches floating point:
//! `Score(45)` is 4.5. The overall rating is the mean of the six criteria,
//! rounded half up to one decimal, and the level is a threshold lookup:
//!
//! | overall   | level | name            |
//! |-----------|-------|-----------------|
//! | >= 5.5    | 6     | Expert          |
//! | >= 4.5    | 5     | Extended        |
//! | >= 3.5    | 4     | Operational     |
//! | >= 2.5    | 3     | Pre-operational |
//! | >= 1.5    | 2     | Elementary      |
//! | otherwise | 1     | Pre-elementary  |

use crate::EpsimError;
use crate::primitives::{CRITERIA_COUNT, MAX_SCORE_TENTHS};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// SCORE
// =============================================================================

/// A rating between 0.0 and 6.0, stored in tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// The lowest score (0.0).
    pub const ZERO: Score = Score(0);

    /// The highest score (6.0).
    pub const MAX: Score = Score(MAX_SCORE_TENTHS);

    /// Create a score from tenths, rejecting values above 6.0.
    pub fn from_tenths(tenths: u32) -> Result<Self, EpsimError> {
        if tenths > u32::from(MAX_SCORE_TENTHS) {
            return Err(EpsimError::ScoreOutOfRange(tenths));
        }
        Ok(Self(tenths as u8))
    }

    /// Create a score from a whole band (0..=6).
    pub fn from_band(band: u8) -> Result<Self, EpsimError> {
        Self::from_tenths(u32::from(band).saturating_mul(10))
    }

    /// Raw tenths value.
    #[must_use]
    pub const fn tenths(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = EpsimError;

    fn try_from(tenths: u8) -> Result<Self, Self::Error> {
        Self::from_tenths(u32::from(tenths))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl FromStr for Score {
    type Err = EpsimError;

    /// Parse `"4"`, `"4.5"` or `"4.50"`. At most one significant decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || EpsimError::InvalidInput(format!("Invalid score '{}'", s));

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let mut digits = fraction.bytes();
        let tenth = digits.next().map_or(0, |b| u32::from(b - b'0'));
        if digits.any(|b| b != b'0') {
            return Err(invalid());
        }

        Self::from_tenths(whole.saturating_mul(10).saturating_add(tenth))
    }
}

/// Mean of a list of scores, rounded half up to one decimal.
///
/// Returns `None` for an empty list.
#[must_use]
pub fn mean_score(scores: &[Score]) -> Option<Score> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as u64;
    let sum: u64 = scores.iter().map(|s| u64::from(s.0)).sum();
    // round half up: (2*sum + n) / (2*n)
    let mean = (sum * 2 + n) / (n * 2);
    // the mean of in-range values is always in range
    Some(Score(mean.min(u64::from(MAX_SCORE_TENTHS)) as u8))
}

// =============================================================================
// ICAO LEVEL
// =============================================================================

/// ICAO language proficiency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IcaoLevel {
    /// Level 1
    PreElementary,
    /// Level 2
    Elementary,
    /// Level 3
    PreOperational,
    /// Level 4, the minimum for licensing
    Operational,
    /// Level 5
    Extended,
    /// Level 6
    Expert,
}

impl IcaoLevel {
    /// Map an overall score to its level.
    #[must_use]
    pub fn from_score(score: Score) -> Self {
        match score.tenths() {
            55.. => Self::Expert,
            45..=54 => Self::Extended,
            35..=44 => Self::Operational,
            25..=34 => Self::PreOperational,
            15..=24 => Self::Elementary,
            _ => Self::PreElementary,
        }
    }

    /// Numeric level 1..=6.
    #[must_use]
    pub fn number(&self) -> u8 {
        match self {
            Self::PreElementary => 1,
            Self::Elementary => 2,
            Self::PreOperational => 3,
            Self::Operational => 4,
            Self::Extended => 5,
            Self::Expert => 6,
        }
    }

    /// Descriptor name as used on rating scales.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreElementary => "Pre-elementary",
            Self::Elementary => "Elementary",
            Self::PreOperational => "Pre-operational",
            Self::Operational => "Operational",
            Self::Extended => "Extended",
            Self::Expert => "Expert",
        }
    }

    /// Level 4 and above meet the licensing requirement.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        *self >= Self::Operational
    }
}

impl std::fmt::Display for IcaoLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

// =============================================================================
// CRITERIA & SCORE SHEET
// =============================================================================

/// The six ICAO rating criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Pronunciation,
    Structure,
    Vocabulary,
    Fluency,
    Comprehension,
    Interaction,
}

impl Criterion {
    /// All criteria in rating-scale order.
    pub const ALL: [Criterion; CRITERIA_COUNT] = [
        Criterion::Pronunciation,
        Criterion::Structure,
        Criterion::Vocabulary,
        Criterion::Fluency,
        Criterion::Comprehension,
        Criterion::Interaction,
    ];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pronunciation => "pronunciation",
            Self::Structure => "structure",
            Self::Vocabulary => "vocabulary",
            Self::Fluency => "fluency",
            Self::Comprehension => "comprehension",
            Self::Interaction => "interaction",
        }
    }
}

impl FromStr for Criterion {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Criterion::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| EpsimError::InvalidInput(format!("Unknown criterion '{}'", s)))
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One optional score per criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub pronunciation: Option<Score>,
    pub structure: Option<Score>,
    pub vocabulary: Option<Score>,
    pub fluency: Option<Score>,
    pub comprehension: Option<Score>,
    pub interaction: Option<Score>,
}

impl ScoreSheet {
    /// Empty sheet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Score for a single criterion.
    #[must_use]
    pub fn get(&self, criterion: Criterion) -> Option<Score> {
        match criterion {
            Criterion::Pronunciation => self.pronunciation,
            Criterion::Structure => self.structure,
            Criterion::Vocabulary => self.vocabulary,
            Criterion::Fluency => self.fluency,
            Criterion::Comprehension => self.comprehension,
            Criterion::Interaction => self.interaction,
        }
    }

    /// Set (or clear) the score for a single criterion.
    pub fn set(&mut self, criterion: Criterion, score: Option<Score>) {
        let slot = match criterion {
            Criterion::Pronunciation => &mut self.pronunciation,
            Criterion::Structure => &mut self.structure,
            Criterion::Vocabulary => &mut self.vocabulary,
            Criterion::Fluency => &mut self.fluency,
            Criterion::Comprehension => &mut self.comprehension,
            Criterion::Interaction => &mut self.interaction,
        };
        *slot = score;
    }

    /// Overlay every score present in `other`.
    pub fn merge(&mut self, other: &ScoreSheet) {
        for criterion in Criterion::ALL {
            if let Some(score) = other.get(criterion) {
                self.set(criterion, Some(score));
            }
        }
    }

    /// Scores that are present, in criterion order.
    #[must_use]
    pub fn present(&self) -> Vec<Score> {
        Criterion::ALL.iter().filter_map(|c| self.get(*c)).collect()
    }

    /// True when all six criteria are rated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        Criterion::ALL.iter().all(|c| self.get(*c).is_some())
    }

    /// Mean of the six criteria, or `None` until every criterion is rated.
    #[must_use]
    pub fn overall(&self) -> Option<Score> {
        if !self.is_complete() {
            return None;
        }
        mean_score(&self.present())
    }

    /// Level derived from `overall()`.
    #[must_use]
    pub fn level(&self) -> Option<IcaoLevel> {
        self.overall().map(IcaoLevel::from_score)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn s(tenths: u32) -> Score {
        Score::from_tenths(tenths).expect("valid score")
    }

    #[test]
    fn score_rejects_above_six() {
        assert!(Score::from_tenths(60).is_ok());
        assert!(matches!(
            Score::from_tenths(61),
            Err(EpsimError::ScoreOutOfRange(61))
        ));
    }

    #[test]
    fn score_parses_decimal_text() {
        assert_eq!("4.5".parse::<Score>().expect("parse"), s(45));
        assert_eq!("4".parse::<Score>().expect("parse"), s(40));
        assert_eq!("  3.0 ".parse::<Score>().expect("parse"), s(30));
        assert_eq!("5.50".parse::<Score>().expect("parse"), s(55));
    }

    #[test]
    fn score_rejects_malformed_text() {
        for bad in ["", ".5", "4.55", "-1", "abc", "4.x", "7"] {
            assert!(bad.parse::<Score>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn score_display_uses_one_decimal() {
        assert_eq!(s(45).to_string(), "4.5");
        assert_eq!(s(0).to_string(), "0.0");
        assert_eq!(s(60).to_string(), "6.0");
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(IcaoLevel::from_score(s(60)), IcaoLevel::Expert);
        assert_eq!(IcaoLevel::from_score(s(55)), IcaoLevel::Expert);
        assert_eq!(IcaoLevel::from_score(s(54)), IcaoLevel::Extended);
        assert_eq!(IcaoLevel::from_score(s(45)), IcaoLevel::Extended);
        assert_eq!(IcaoLevel::from_score(s(44)), IcaoLevel::Operational);
        assert_eq!(IcaoLevel::from_score(s(35)), IcaoLevel::Operational);
        assert_eq!(IcaoLevel::from_score(s(34)), IcaoLevel::PreOperational);
        assert_eq!(IcaoLevel::from_score(s(25)), IcaoLevel::PreOperational);
        assert_eq!(IcaoLevel::from_score(s(24)), IcaoLevel::Elementary);
        assert_eq!(IcaoLevel::from_score(s(15)), IcaoLevel::Elementary);
        assert_eq!(IcaoLevel::from_score(s(14)), IcaoLevel::PreElementary);
        assert_eq!(IcaoLevel::from_score(s(0)), IcaoLevel::PreElementary);
    }

    #[test]
    fn operational_is_level_four_and_up() {
        assert!(!IcaoLevel::PreOperational.is_operational());
        assert!(IcaoLevel::Operational.is_operational());
        assert!(IcaoLevel::Expert.is_operational());
    }

    #[test]
    fn overall_requires_all_six() {
        let mut sheet = ScoreSheet::new();
        sheet.set(Criterion::Pronunciation, Some(s(40)));
        assert_eq!(sheet.overall(), None);
        assert_eq!(sheet.level(), None);
    }

    #[test]
    fn overall_is_rounded_mean() {
        let mut sheet = ScoreSheet::new();
        // 4 + 4 + 5 + 4 + 5 + 4 = 26 -> 4.333 -> 4.3
        for (criterion, tenths) in Criterion::ALL.into_iter().zip([40, 40, 50, 40, 50, 40]) {
            sheet.set(criterion, Some(s(tenths)));
        }
        assert_eq!(sheet.overall(), Some(s(43)));
        assert_eq!(sheet.level(), Some(IcaoLevel::Operational));
    }

    #[test]
    fn mean_rounds_half_up() {
        // 4.2 and 4.3 -> 4.25 -> 4.3
        assert_eq!(mean_score(&[s(42), s(43)]), Some(s(43)));
        // 3.4 and 3.5 -> 3.45 -> 3.5 (crosses into Operational)
        assert_eq!(mean_score(&[s(34), s(35)]), Some(s(35)));
        assert_eq!(mean_score(&[]), None);
    }

    #[test]
    fn merge_overlays_present_scores() {
        let mut base = ScoreSheet::new();
        base.set(Criterion::Fluency, Some(s(30)));
        base.set(Criterion::Structure, Some(s(30)));

        let mut update = ScoreSheet::new();
        update.set(Criterion::Fluency, Some(s(50)));

        base.merge(&update);
        assert_eq!(base.fluency, Some(s(50)));
        assert_eq!(base.structure, Some(s(30)));
    }

    #[test]
    fn criterion_parses_case_insensitively() {
        assert_eq!(
            "Pronunciation".parse::<Criterion>().expect("parse"),
            Criterion::Pronunciation
        );
        assert!("grammar".parse::<Criterion>().is_err());
    }

    #[test]
    fn score_serde_rejects_out_of_range() {
        let ok: Score = decode_tenths(45).expect("in range");
        assert_eq!(ok, s(45));
        assert!(decode_tenths(70).is_err());
    }

    /// Deserialize through postcard to exercise the `try_from` path.
    fn decode_tenths(tenths: u8) -> Result<Score, postcard::Error> {
        let bytes = postcard::to_stdvec(&tenths)?;
        postcard::from_bytes(&bytes)
    }
}
