//! # Lifecycle Tier Tests (L0-L3)
//!
//! End-to-end checks through the public `Registry` API.
//!
//! ## Tiers
//! - L0: Records and validation
//! - L1: Status transitions
//! - L2: Scoring and aggregation
//! - L3: Persistence across backends

use epsim_core::{
    AssessmentFilter, AssessmentStatus, Criterion, EpsimError, IcaoLevel, NewAssessment,
    NewQuestion, NewRecording, NewUser, QuestionType, Registry, Role, Score, ScoreSheet,
    Timestamp, UserId,
};

fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn tenths(t: u32) -> Score {
    Score::from_tenths(t).expect("score")
}

/// Registry with an examiner (id 1) and a candidate (id 2).
fn seeded() -> Registry {
    let mut reg = Registry::new();
    reg.create_user(NewUser::new("examiner@ep.sim", "Examiner", Role::Examiner), at(1))
        .expect("examiner");
    reg.create_user(NewUser::new("candidate@ep.sim", "Candidate", Role::Candidate), at(2))
        .expect("candidate");
    reg
}

const EXAMINER: UserId = UserId(1);
const CANDIDATE: UserId = UserId(2);

// =============================================================================
// TIER L0: RECORDS AND VALIDATION
// =============================================================================

mod l0_records {
    use super::*;

    /// L0.1: A new assessment is a draft owned by its creator.
    #[test]
    fn new_assessment_is_owned_draft() {
        let mut reg = seeded();
        let a = reg
            .create_assessment(CANDIDATE, NewAssessment::titled("Intro"), at(10))
            .expect("create");
        assert_eq!(a.status, AssessmentStatus::Draft);
        assert_eq!(a.created_by, CANDIDATE);
        assert_eq!(reg.assessment(a.id).expect("load"), a);
    }

    /// L0.2: Unknown actors are rejected before anything is stored.
    #[test]
    fn unknown_actor_rejected() {
        let mut reg = seeded();
        let result = reg.create_assessment(UserId(77), NewAssessment::titled("x"), at(10));
        assert!(matches!(result, Err(EpsimError::UserNotFound(UserId(77)))));
        assert!(reg.assessments(&AssessmentFilter::default()).expect("list").is_empty());
    }

    /// L0.3: Recordings can be linked to a question.
    #[test]
    fn recording_links_question() {
        let mut reg = seeded();
        let a = reg
            .create_assessment(CANDIDATE, NewAssessment::titled("Audio"), at(10))
            .expect("create");
        let (_, q) = reg
            .add_question(
                CANDIDATE,
                a.id,
                NewQuestion::new(QuestionType::PictureDescription, "Describe the picture"),
                at(11),
            )
            .expect("question");
        let mut rec = NewRecording::new("a.wav", "a.wav", 5_000);
        rec.question = Some(q);
        let (a, r) = reg.add_recording(CANDIDATE, a.id, rec, at(12)).expect("recording");
        assert_eq!(a.questions[q].audio_recording, Some(r));
    }
}

// =============================================================================
// TIER L1: STATUS TRANSITIONS
// =============================================================================

mod l1_transitions {
    use super::*;

    /// L1.1: Draft -> InProgress -> UnderReview -> Completed -> Archived.
    #[test]
    fn happy_path() {
        let mut reg = seeded();
        let a = reg
            .create_assessment(CANDIDATE, NewAssessment::titled("Path"), at(10))
            .expect("create");
        reg.start(CANDIDATE, a.id, at(20)).expect("start");
        reg.submit_for_review(CANDIDATE, a.id, at(30)).expect("submit");
        reg.complete(CANDIDATE, a.id, at(40)).expect("complete");
        let a = reg.archive(CANDIDATE, a.id, at(50)).expect("archive");
        assert_eq!(a.status, AssessmentStatus::Archived);
        assert_eq!(a.progress, 100);
        assert_eq!(a.completed_at, Some(at(40)));
    }

    /// L1.2: Completed assessments cannot be cancelled.
    #[test]
    fn completed_cannot_cancel() {
        let mut reg = seeded();
        let a = reg
            .create_assessment(CANDIDATE, NewAssessment::titled("Done"), at(10))
            .expect("create");
        reg.start(CANDIDATE, a.id, at(20)).expect("start");
        reg.complete(CANDIDATE, a.id, at(30)).expect("complete");
        assert!(matches!(
            reg.cancel(CANDIDATE, a.id, at(40)),
            Err(EpsimError::InvalidTransition {
                from: AssessmentStatus::Completed,
                ..
            })
        ));
    }

    /// L1.3: Time limit sets the expiry on start.
    #[test]
    fn expiry_from_time_limit() {
        let mut reg = seeded();
        let input = NewAssessment {
            time_limit_minutes: Some(20),
            ..NewAssessment::titled("Timed")
        };
        let a = reg.create_assessment(CANDIDATE, input, at(10)).expect("create");
        let a = reg.start(CANDIDATE, a.id, at(100)).expect("start");
        assert_eq!(a.expires_at, Some(at(100 + 20 * 60)));
        assert!(a.is_expired(at(100 + 20 * 60 + 1)));
    }
}

// =============================================================================
// TIER L2: SCORING
// =============================================================================

mod l2_scoring {
    use super::*;

    /// L2.1: Six sub-scores give overall and level.
    #[test]
    fn sheet_aggregation() {
        let mut reg = seeded();
        let a = reg
            .create_assessment(CANDIDATE, NewAssessment::titled("Scored"), at(10))
            .expect("create");
        reg.assign(EXAMINER, a.id, EXAMINER, at(11)).expect("assign");
        reg.start(CANDIDATE, a.id, at(20)).expect("start");

        let mut sheet = ScoreSheet::new();
        let values = [40, 35, 40, 30, 45, 40];
        for (c, v) in Criterion::ALL.iter().zip(values) {
            sheet.set(*c, Some(tenths(v)));
        }
        let a = reg.set_scores(EXAMINER, a.id, &sheet, at(30)).expect("scores");

        // 230 / 6 = 38.33 -> 3.8
        assert_eq!(a.overall_score, Some(tenths(38)));
        assert_eq!(a.icao_level, Some(IcaoLevel::Operational));
        assert!(a.is_scored());
    }

    /// L2.2: A partial sheet leaves the assessment unscored.
    #[test]
    fn partial_sheet_unscored() {
        let mut reg = seeded();
        let a = reg
            .create_assessment(CANDIDATE, NewAssessment::titled("Partial"), at(10))
            .expect("create");
        reg.start(CANDIDATE, a.id, at(20)).expect("start");
        let mut sheet = ScoreSheet::new();
        sheet.set(Criterion::Fluency, Some(tenths(50)));
        let a = reg.set_scores(EXAMINER, a.id, &sheet, at(30)).expect("scores");
        assert_eq!(a.overall_score, None);
        assert!(!a.is_scored());
    }

    /// L2.3: Boundary 5.5 is Expert; 5.4 is Extended.
    #[test]
    fn level_boundaries() {
        assert_eq!(IcaoLevel::from_score(tenths(55)), IcaoLevel::Expert);
        assert_eq!(IcaoLevel::from_score(tenths(54)), IcaoLevel::Extended);
        assert_eq!(IcaoLevel::from_score(tenths(14)), IcaoLevel::PreElementary);
    }
}

// =============================================================================
// TIER L3: PERSISTENCE
// =============================================================================

mod l3_persistence {
    use super::*;
    use epsim_core::{snapshot_from_bytes, snapshot_to_bytes};

    /// L3.1: redb registry survives reopen, including completion side effects.
    #[test]
    fn redb_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("epsim.redb");
        let id = {
            let mut reg = Registry::with_redb(&path).expect("open");
            reg.create_user(NewUser::new("examiner@ep.sim", "Examiner", Role::Examiner), at(1))
                .expect("examiner");
            reg.create_user(NewUser::new("candidate@ep.sim", "Candidate", Role::Candidate), at(2))
                .expect("candidate");
            let a = reg
                .create_assessment(CANDIDATE, NewAssessment::titled("Durable"), at(10))
                .expect("create");
            reg.assign(EXAMINER, a.id, EXAMINER, at(11)).expect("assign");
            reg.start(CANDIDATE, a.id, at(12)).expect("start");
            reg.complete(CANDIDATE, a.id, at(13)).expect("complete");
            a.id
        };

        let reg = Registry::with_redb(&path).expect("reopen");
        assert!(reg.is_persistent());
        assert_eq!(reg.assessment(id).expect("load").status, AssessmentStatus::Completed);
        assert_eq!(reg.unread_count(EXAMINER).expect("unread"), 1);
        assert_eq!(reg.user(CANDIDATE).expect("user").completed_assessments, vec![id]);
    }

    /// L3.2: Export from memory, import into redb.
    #[test]
    fn export_import_across_backends() {
        let mut source = seeded();
        source
            .create_assessment(CANDIDATE, NewAssessment::titled("Moved"), at(10))
            .expect("create");
        let bytes = snapshot_to_bytes(&source.snapshot().expect("snapshot")).expect("encode");

        let dir = tempfile::tempdir().expect("tempdir");
        let mut target = Registry::with_redb(dir.path().join("epsim.redb")).expect("open");
        target.restore(snapshot_from_bytes(&bytes).expect("decode")).expect("restore");

        assert_eq!(target.snapshot().expect("snapshot"), source.snapshot().expect("snapshot"));
    }
}
