//! # Property-Based Tests
//!
//! Scoring and text-heuristic invariants checked with proptest.

use epsim_core::{
    Criterion, IcaoLevel, Score, ScoreSheet, mean_score, pronunciation_score, word_overlap,
};
use proptest::collection::vec;
use proptest::prelude::*;

fn score() -> impl Strategy<Value = Score> {
    (0u32..=60).prop_map(|t| Score::from_tenths(t).expect("in range"))
}

proptest! {
    /// Every value in 0..=60 constructs; every value above fails.
    #[test]
    fn score_range_is_enforced(tenths in 0u32..1000) {
        prop_assert_eq!(Score::from_tenths(tenths).is_ok(), tenths <= 60);
    }

    /// Display then parse gives the same score back.
    #[test]
    fn score_text_round_trip(s in score()) {
        let parsed: Score = s.to_string().parse().expect("parse");
        prop_assert_eq!(parsed, s);
    }

    /// The mean lies between the smallest and largest input.
    #[test]
    fn mean_is_bounded(scores in vec(score(), 1..20)) {
        let mean = mean_score(&scores).expect("non-empty");
        let lo = scores.iter().min().expect("non-empty");
        let hi = scores.iter().max().expect("non-empty");
        prop_assert!(*lo <= mean && mean <= *hi);
    }

    /// The mean does not depend on input order.
    #[test]
    fn mean_is_order_independent(mut scores in vec(score(), 1..20)) {
        let before = mean_score(&scores);
        scores.reverse();
        prop_assert_eq!(mean_score(&scores), before);
    }

    /// Overall exists exactly when all six criteria are set, and the level
    /// always follows from the overall.
    #[test]
    fn overall_requires_complete_sheet(values in vec(proptest::option::of(score()), 6)) {
        let mut sheet = ScoreSheet::new();
        for (c, v) in Criterion::ALL.iter().zip(values.iter()) {
            sheet.set(*c, *v);
        }
        let complete = values.iter().all(Option::is_some);
        prop_assert_eq!(sheet.overall().is_some(), complete);
        prop_assert_eq!(sheet.level(), sheet.overall().map(IcaoLevel::from_score));
    }

    /// Levels never decrease as the score grows.
    #[test]
    fn level_is_monotonic(a in score(), b in score()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(IcaoLevel::from_score(lo).number() <= IcaoLevel::from_score(hi).number());
    }

    /// A transcript identical to the expected text scores the maximum.
    #[test]
    fn identical_text_scores_max(words in vec("[a-z]{1,8}", 1..12)) {
        let text = words.join(" ");
        prop_assert_eq!(word_overlap(&text, &text), 1000);
        prop_assert_eq!(pronunciation_score(&text, &text), Score::MAX);
    }

    /// Overlap stays within per-mille bounds for arbitrary text.
    #[test]
    fn overlap_is_bounded(expected in ".{0,80}", transcript in ".{0,80}") {
        prop_assert!(word_overlap(&expected, &transcript) <= 1000);
    }
}
