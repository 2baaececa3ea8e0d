//! # Rater Text Parsing
//!
//! Extract ICAO sub-scores from free-text evaluations such as
//!
//! ```text
//! - Pronunciation: 4 - generally intelligible, some L1 influence
//! - Fluency: 3.5 with frequent fillers
//! ```
//!
//! Each line is split at its first colon. The label must name a criterion;
//! the first word after the colon that reads as a score in `1.0..=6.0`
//! becomes that criterion's score.

use crate::score::{Criterion, Score, ScoreSheet, mean_score};
use serde::{Deserialize, Serialize};

/// Scores recovered from a rater's text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaterScores {
    pub sheet: ScoreSheet,
    /// Mean of the criteria that were found.
    pub overall: Option<Score>,
}

/// Parse `Criterion: ... <number> ...` lines.
///
/// Later lines for the same criterion overwrite earlier ones.
#[must_use]
pub fn parse_rater_scores(text: &str) -> RaterScores {
    let mut sheet = ScoreSheet::new();
    for line in text.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        let Ok(criterion) = label
            .trim_matches(|c: char| !c.is_alphabetic())
            .parse::<Criterion>()
        else {
            continue;
        };
        if let Some(score) = rest.split_whitespace().find_map(read_band) {
            sheet.set(criterion, Some(score));
        }
    }

    let overall = mean_score(&sheet.present());
    RaterScores { sheet, overall }
}

fn read_band(word: &str) -> Option<Score> {
    let trimmed = word.trim_matches(|c: char| !c.is_ascii_digit());
    let score = trimmed.parse::<Score>().ok()?;
    (10..=60).contains(&score.tenths()).then_some(score)
}
