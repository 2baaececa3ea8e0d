//! # CLI Command Implementations

use super::{AssessmentCommand, Context, QuestionCommand, RecordingCommand, UserCommand};
use crate::api::{self, AppState, AssessmentJson, NotificationJson, StatusResponse, UserJson};
use crate::clock::{format_timestamp, now};
use crate::config::Backend;
use crate::pipeline::{AnalysisJob, Pipeline, is_audio_path};
use epsim_core::{
    Assessment, AssessmentFilter, AssessmentId, Criterion, EpsimError, ExaminerNotes, NewQuestion,
    NewRecording, NewUser, NotificationId, Registry, ScoreSheet, UserId,
    formats::MAX_SNAPSHOT_SIZE, parse_rater_scores, snapshot_digest, snapshot_from_bytes,
    snapshot_to_bytes,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Rater text files above this size are refused.
const MAX_RATER_TEXT_SIZE: u64 = 1024 * 1024;

// =============================================================================
// PATH VALIDATION
// =============================================================================

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), EpsimError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| EpsimError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(EpsimError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, EpsimError> {
    let canonical = path.canonicalize().map_err(|e| {
        EpsimError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(EpsimError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path; the file itself may not exist yet.
fn validate_output_path(path: &Path) -> Result<PathBuf, EpsimError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        EpsimError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(EpsimError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| EpsimError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// REGISTRY LOADING
// =============================================================================

/// Open the registry for a database path.
///
/// The file backend reads a snapshot into memory; a missing file yields an
/// empty registry.
pub fn open_registry(db_path: &Path, backend: Backend) -> Result<Registry, EpsimError> {
    match backend {
        Backend::Redb => Registry::with_redb(db_path),
        Backend::File => {
            if !db_path.exists() {
                return Ok(Registry::new());
            }
            validate_file_size(db_path, MAX_SNAPSHOT_SIZE as u64)?;
            let data = std::fs::read(db_path)
                .map_err(|e| EpsimError::IoError(format!("Read db: {}", e)))?;
            let mut registry = Registry::new();
            registry.restore(snapshot_from_bytes(&data)?)?;
            Ok(registry)
        }
    }
}

/// Persist an in-memory registry as a snapshot file. No-op for redb.
pub fn save_registry(registry: &Registry, db_path: &Path) -> Result<(), EpsimError> {
    if registry.is_persistent() {
        return Ok(());
    }
    let data = snapshot_to_bytes(&registry.snapshot()?)?;
    std::fs::write(db_path, &data)
        .map_err(|e| EpsimError::IoError(format!("Write db: {}", e)))
}

fn load(ctx: &Context) -> Result<Registry, EpsimError> {
    open_registry(ctx.database(), ctx.backend())
}

fn store(ctx: &Context, registry: &Registry) -> Result<(), EpsimError> {
    save_registry(registry, ctx.database())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), EpsimError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| EpsimError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_user(ctx: &Context, user: &epsim_core::User) -> Result<(), EpsimError> {
    if ctx.json_mode {
        return print_json(&UserJson::from(user));
    }
    println!(
        "#{} {} <{}> {} [{}]",
        user.id,
        user.full_name(),
        user.email,
        user.role,
        user.status.as_str()
    );
    Ok(())
}

fn print_assessment(ctx: &Context, assessment: &Assessment) -> Result<(), EpsimError> {
    if ctx.json_mode {
        return print_json(&AssessmentJson::from(assessment));
    }

    println!("Assessment #{}: {}", assessment.id, assessment);
    println!("==================");
    println!("Type:       {}", assessment.test_type.as_str());
    println!("Progress:   {}%", assessment.progress);
    println!("Created by: #{}", assessment.created_by);
    if let Some(assignee) = assessment.assigned_to {
        println!("Assigned:   #{}", assignee);
    }
    if let Some(started) = assessment.started_at {
        println!("Started:    {}", format_timestamp(started));
    }
    if let Some(expires) = assessment.expires_at {
        println!("Expires:    {}", format_timestamp(expires));
    }
    if let Some(completed) = assessment.completed_at {
        println!("Completed:  {}", format_timestamp(completed));
    }
    if let Some(minutes) = assessment.duration_minutes() {
        println!("Duration:   {} min", minutes);
    }

    println!();
    println!("Scores:");
    for criterion in Criterion::ALL {
        match assessment.scores.get(criterion) {
            Some(score) => println!("  {:<14} {}", criterion.as_str(), score),
            None => println!("  {:<14} -", criterion.as_str()),
        }
    }
    match (assessment.overall_score, assessment.icao_level) {
        (Some(overall), Some(level)) => {
            let licensing = if level.is_operational() {
                "operational"
            } else {
                "below operational"
            };
            println!(
                "  {:<14} {} - Level {} ({})",
                "overall", overall, level, licensing
            );
        }
        _ => println!("  {:<14} -", "overall"),
    }

    if !assessment.questions.is_empty() {
        println!();
        println!("Questions:");
        for (i, q) in assessment.questions.iter().enumerate() {
            let score = q.score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
            println!("  [{}] {} {} (score {})", i, q.question_type.as_str(), q.text, score);
        }
    }

    if !assessment.recordings.is_empty() {
        println!();
        println!("Recordings:");
        for (i, r) in assessment.recordings.iter().enumerate() {
            let state = match (&r.processing_error, r.is_processed) {
                (Some(err), _) => format!("error: {}", err),
                (None, true) => "processed".to_string(),
                (None, false) => "pending".to_string(),
            };
            println!("  [{}] {} ({} ms) {}", i, r.file_name, r.duration_ms, state);
            if let Some(transcript) = &r.transcript {
                println!("      \"{}\"", transcript);
            }
        }
    }
    Ok(())
}

fn print_assessment_line(assessment: &Assessment) {
    let level = assessment
        .icao_level
        .map(|l| format!("level {}", l.number()))
        .unwrap_or_else(|| "unscored".to_string());
    println!(
        "#{:<5} {:<13} {:<4} {} ({})",
        assessment.id,
        assessment.status.as_str(),
        assessment.test_type.as_str(),
        assessment.title,
        level
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &Context,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), EpsimError> {
    let registry = load(ctx)?;
    let pipeline = Pipeline::from_config(&ctx.config.audio, &ctx.config.transcription)?;
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);

    println!("EP-Simulator Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:          {}", host);
    println!("  Port:          {}", port);
    println!("  Backend:       {}", ctx.backend().as_str());
    println!("  Database:      {}", ctx.database().display());
    println!(
        "  Transcription: {}",
        if pipeline.transcriber().is_enabled() {
            "whisper"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let snapshot_path = match ctx.backend() {
        Backend::File => Some(ctx.database().to_path_buf()),
        Backend::Redb => None,
    };
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, AppState::new(registry, pipeline), snapshot_path).await
}

// =============================================================================
// DATABASE COMMANDS
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), EpsimError> {
    let db_path = ctx.database();
    if db_path.exists() {
        if !force {
            return Err(EpsimError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| EpsimError::IoError(format!("Remove db: {}", e)))?;
    }

    let registry = match ctx.backend() {
        Backend::Redb => Registry::with_redb(db_path)?,
        Backend::File => Registry::new(),
    };
    store(ctx, &registry)?;
    tracing::info!(
        database = %db_path.display(),
        backend = ctx.backend().as_str(),
        "Initialized database"
    );
    println!(
        "Initialized new {} database at {}",
        ctx.backend().as_str(),
        db_path.display()
    );
    Ok(())
}

/// Show record counts.
pub fn cmd_status(ctx: &Context) -> Result<(), EpsimError> {
    let registry = load(ctx)?;
    let stats = registry.stats()?;

    if ctx.json_mode {
        return print_json(&StatusResponse::from_stats(&stats, registry.is_persistent()));
    }

    println!("EP-Simulator Status");
    println!("==================");
    println!("Database: {}", ctx.database().display());
    println!("Backend:  {}", ctx.backend().as_str());
    println!();
    println!("Users:         {}", stats.users);
    println!("Assessments:   {}", stats.assessments);
    for (status, count) in &stats.by_status {
        println!("  {:<13} {}", status.as_str(), count);
    }
    println!(
        "Notifications: {} ({} unread)",
        stats.notifications, stats.unread_notifications
    );
    Ok(())
}

/// Write every record to a snapshot file.
pub fn cmd_export(ctx: &Context, output: &Path) -> Result<(), EpsimError> {
    let validated_output = validate_output_path(output)?;
    let registry = load(ctx)?;
    let snapshot = registry.snapshot()?;
    let data = snapshot_to_bytes(&snapshot)?;
    let digest = snapshot_digest(&data);

    std::fs::write(&validated_output, &data)
        .map_err(|e| EpsimError::IoError(format!("Write file: {}", e)))?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "output": validated_output.to_string_lossy(),
            "bytes": data.len(),
            "digest": digest,
        }));
    }
    println!("Digest: {}", digest);
    println!(
        "Exported {} bytes to {}",
        data.len(),
        validated_output.display()
    );
    Ok(())
}

/// Replace every record with a snapshot file.
pub fn cmd_import(ctx: &Context, input: &Path, force: bool) -> Result<(), EpsimError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_SNAPSHOT_SIZE as u64)?;
    let data = std::fs::read(&validated_path)
        .map_err(|e| EpsimError::IoError(format!("Read file: {}", e)))?;
    let snapshot = snapshot_from_bytes(&data)?;

    let mut registry = load(ctx)?;
    let current = registry.stats()?;
    if !force && (current.users > 0 || current.assessments > 0) {
        return Err(EpsimError::InvalidInput(
            "Database is not empty. Use --force to replace its records.".to_string(),
        ));
    }

    let (users, assessments) = (snapshot.users.len(), snapshot.assessments.len());
    registry.restore(snapshot)?;
    store(ctx, &registry)?;

    tracing::info!(users, assessments, "Imported snapshot");
    println!("Imported {} users, {} assessments", users, assessments);
    Ok(())
}

// =============================================================================
// USER COMMANDS
// =============================================================================

pub fn cmd_user(ctx: &Context, action: UserCommand) -> Result<(), EpsimError> {
    let mut registry = load(ctx)?;
    match action {
        UserCommand::Add {
            email,
            name,
            role,
            first_name,
            last_name,
            organization,
        } => {
            let mut input = NewUser::new(email, name, role);
            input.first_name = first_name;
            input.last_name = last_name;
            input.organization = organization;
            let user = registry.create_user(input, now())?;
            store(ctx, &registry)?;
            print_user(ctx, &user)
        }
        UserCommand::List => {
            let users = registry.users()?;
            if ctx.json_mode {
                let list: Vec<UserJson> = users.iter().map(UserJson::from).collect();
                return print_json(&list);
            }
            if users.is_empty() {
                println!("No users.");
            }
            for user in &users {
                print_user(ctx, user)?;
            }
            Ok(())
        }
        UserCommand::Status { id, status } => {
            let user = registry.set_user_status(ctx.actor()?, UserId(id), status, now())?;
            store(ctx, &registry)?;
            print_user(ctx, &user)
        }
    }
}

// =============================================================================
// ASSESSMENT COMMANDS
// =============================================================================

pub fn cmd_assessment(ctx: &Context, action: AssessmentCommand) -> Result<(), EpsimError> {
    let mut registry = load(ctx)?;

    let updated = match action {
        AssessmentCommand::Create {
            title,
            description,
            test_type,
            time_limit,
            practice,
            retake,
        } => {
            let input = epsim_core::NewAssessment {
                title,
                description,
                test_type,
                time_limit_minutes: time_limit,
                is_practice: practice,
                is_retake: retake,
                ..Default::default()
            };
            registry.create_assessment(ctx.actor()?, input, now())?
        }
        AssessmentCommand::Show { id } => {
            return print_assessment(ctx, &registry.assessment(AssessmentId(id))?);
        }
        AssessmentCommand::List {
            status,
            created_by,
            assigned_to,
            test_type,
        } => {
            let filter = AssessmentFilter {
                status,
                created_by: created_by.map(UserId),
                assigned_to: assigned_to.map(UserId),
                test_type,
            };
            let list = registry.assessments(&filter)?;
            if ctx.json_mode {
                let json: Vec<AssessmentJson> = list.iter().map(AssessmentJson::from).collect();
                return print_json(&json);
            }
            if list.is_empty() {
                println!("No assessments.");
            }
            list.iter().for_each(print_assessment_line);
            return Ok(());
        }
        AssessmentCommand::Assign { id, assignee } => {
            registry.assign(ctx.actor()?, AssessmentId(id), UserId(assignee), now())?
        }
        AssessmentCommand::Start { id } => registry.start(ctx.actor()?, AssessmentId(id), now())?,
        AssessmentCommand::Submit { id } => {
            registry.submit_for_review(ctx.actor()?, AssessmentId(id), now())?
        }
        AssessmentCommand::Complete { id } => {
            registry.complete(ctx.actor()?, AssessmentId(id), now())?
        }
        AssessmentCommand::Archive { id } => {
            registry.archive(ctx.actor()?, AssessmentId(id), now())?
        }
        AssessmentCommand::Cancel { id } => registry.cancel(ctx.actor()?, AssessmentId(id), now())?,
        AssessmentCommand::Score {
            id,
            pronunciation,
            structure,
            vocabulary,
            fluency,
            comprehension,
            interaction,
            from_text,
        } => {
            let mut sheet = match from_text {
                Some(path) => read_rater_sheet(&path)?,
                None => ScoreSheet::default(),
            };
            for (criterion, value) in [
                (Criterion::Pronunciation, pronunciation),
                (Criterion::Structure, structure),
                (Criterion::Vocabulary, vocabulary),
                (Criterion::Fluency, fluency),
                (Criterion::Comprehension, comprehension),
                (Criterion::Interaction, interaction),
            ] {
                if value.is_some() {
                    sheet.set(criterion, value);
                }
            }
            registry.set_scores(ctx.actor()?, AssessmentId(id), &sheet, now())?
        }
        AssessmentCommand::Feedback {
            id,
            strengths,
            improvements,
            recommendations,
            notes,
            feedback,
        } => {
            let notes = ExaminerNotes {
                strengths,
                areas_for_improvement: improvements,
                recommendations,
                examiner_notes: notes,
                feedback,
            };
            registry.set_feedback(ctx.actor()?, AssessmentId(id), notes, now())?
        }
        AssessmentCommand::Progress { id, percent } => {
            registry.set_progress(ctx.actor()?, AssessmentId(id), percent, now())?
        }
        AssessmentCommand::Calculate { id } => {
            registry.calculate_question_scores(ctx.actor()?, AssessmentId(id), now())?
        }
    };

    store(ctx, &registry)?;
    print_assessment(ctx, &updated)
}

fn read_rater_sheet(path: &Path) -> Result<ScoreSheet, EpsimError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_RATER_TEXT_SIZE)?;
    let text = std::fs::read_to_string(&path)
        .map_err(|e| EpsimError::IoError(format!("Read rater text: {}", e)))?;
    let parsed = parse_rater_scores(&text);
    if parsed.sheet == ScoreSheet::default() {
        return Err(EpsimError::InvalidInput(format!(
            "No sub-scores found in '{}'",
            path.display()
        )));
    }
    Ok(parsed.sheet)
}

// =============================================================================
// QUESTION COMMANDS
// =============================================================================

pub fn cmd_question(ctx: &Context, action: QuestionCommand) -> Result<(), EpsimError> {
    let mut registry = load(ctx)?;
    let actor = ctx.actor()?;

    let updated = match action {
        QuestionCommand::Add {
            assessment,
            question_type,
            text,
            description,
        } => {
            let mut question = NewQuestion::new(question_type, text);
            question.description = description;
            let (updated, index) =
                registry.add_question(actor, AssessmentId(assessment), question, now())?;
            if !ctx.json_mode {
                println!("Added question [{}]", index);
            }
            updated
        }
        QuestionCommand::Answer {
            assessment,
            index,
            answer,
        } => registry.answer_question(actor, AssessmentId(assessment), index, answer, now())?,
        QuestionCommand::Score {
            assessment,
            index,
            score,
            feedback,
        } => registry.score_question(
            actor,
            AssessmentId(assessment),
            index,
            score,
            feedback,
            now(),
        )?,
    };

    store(ctx, &registry)?;
    print_assessment(ctx, &updated)
}

// =============================================================================
// RECORDING COMMANDS
// =============================================================================

pub async fn cmd_recording(ctx: &Context, action: RecordingCommand) -> Result<(), EpsimError> {
    let mut registry = load(ctx)?;
    let actor = ctx.actor()?;
    let pipeline = Pipeline::from_config(&ctx.config.audio, &ctx.config.transcription)?;

    let updated = match action {
        RecordingCommand::Add {
            assessment,
            file,
            duration_ms,
            question,
            language,
        } => {
            if !is_audio_path(Path::new(&file)) {
                return Err(EpsimError::InvalidInput(format!(
                    "Unsupported audio file '{}'. Use: wav, mp3, ogg",
                    file
                )));
            }
            let recording = describe_recording(&pipeline, &file, duration_ms, question, language)
                .await;
            let (updated, index) =
                registry.add_recording(actor, AssessmentId(assessment), recording, now())?;
            if !ctx.json_mode {
                println!("Added recording [{}]", index);
            }
            updated
        }
        RecordingCommand::Analyze {
            assessment,
            index,
            expected,
            apply,
        } => {
            let id = AssessmentId(assessment);
            let job = AnalysisJob::prepare(&registry, actor, id, index, expected, apply)?;
            let analysis = pipeline.run(&job).await?;
            if let Some(err) = &analysis.error {
                tracing::warn!(assessment = %id, index, "Analysis incomplete: {}", err);
            }
            registry.record_analysis(actor, id, index, analysis, apply, now())?
        }
    };

    store(ctx, &registry)?;
    print_assessment(ctx, &updated)
}

/// Build a recording, reading size and WAV format when the file is
/// reachable under the audio directory.
async fn describe_recording(
    pipeline: &Pipeline,
    file: &str,
    duration_ms: u32,
    question: Option<usize>,
    language: Option<String>,
) -> NewRecording {
    let file_name = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    let mut recording = NewRecording::new(file, file_name, duration_ms);
    recording.question = question;
    recording.language = language;
    recording.file_type = epsim_core::AudioFormat::from_path(Path::new(file))
        .map(|f| f.mime_type().to_string());

    match pipeline.resolve(file).await {
        Ok(path) => {
            recording.file_size = std::fs::metadata(&path).ok().map(|m| m.len());
            if let Ok(reader) = hound::WavReader::open(&path) {
                let spec = reader.spec();
                recording.sample_rate = Some(spec.sample_rate);
                recording.channels = Some(spec.channels);
                if duration_ms == 0 && spec.sample_rate > 0 {
                    let frames = u64::from(reader.duration());
                    let ms = frames * 1000 / u64::from(spec.sample_rate);
                    recording.duration_ms = u32::try_from(ms).unwrap_or(u32::MAX);
                }
            }
        }
        Err(e) => tracing::debug!("Recording not inspected: {}", e),
    }
    recording
}

// =============================================================================
// NOTIFICATION COMMANDS
// =============================================================================

pub fn cmd_notifications(
    ctx: &Context,
    user: Option<u64>,
    limit: Option<usize>,
    unread: bool,
    mark_read: Option<u64>,
) -> Result<(), EpsimError> {
    let mut registry = load(ctx)?;

    if let Some(id) = mark_read {
        let notification = registry.mark_read(ctx.actor()?, NotificationId(id), now())?;
        store(ctx, &registry)?;
        if ctx.json_mode {
            return print_json(&NotificationJson::from(&notification));
        }
        println!("Marked notification #{} as read", notification.id);
        return Ok(());
    }

    let recipient = match user {
        Some(id) => UserId(id),
        None => ctx.actor()?,
    };
    let list = registry.notifications_for(recipient, limit, unread)?;
    let unread_count = registry.unread_count(recipient)?;

    if ctx.json_mode {
        let json: Vec<NotificationJson> = list.iter().map(NotificationJson::from).collect();
        return print_json(&serde_json::json!({
            "notifications": json,
            "unread": unread_count,
        }));
    }

    println!("Notifications for #{} ({} unread)", recipient, unread_count);
    for n in &list {
        println!(
            "{} #{:<4} {} [{}] {}",
            if n.is_read { " " } else { "*" },
            n.id,
            format_timestamp(n.created_at),
            n.kind.as_str(),
            n.title
        );
        println!("         {}", n.message);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use epsim_core::Role;
    use tempfile::TempDir;

    #[test]
    fn file_backend_round_trips_through_disk() {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("epsim.snap");

        let mut registry = open_registry(&db, Backend::File).expect("open");
        registry
            .create_user(NewUser::new("a@ep.sim", "A", Role::Admin), now())
            .expect("user");
        save_registry(&registry, &db).expect("save");

        let reopened = open_registry(&db, Backend::File).expect("reopen");
        assert_eq!(reopened.users().expect("users").len(), 1);
    }

    #[test]
    fn missing_file_database_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let registry = open_registry(&dir.path().join("none.snap"), Backend::File).expect("open");
        assert_eq!(registry.stats().expect("stats").users, 0);
    }

    #[test]
    fn output_path_requires_existing_parent() {
        let dir = TempDir::new().expect("tempdir");
        assert!(validate_output_path(&dir.path().join("out.snap")).is_ok());
        assert!(validate_output_path(&dir.path().join("missing/out.snap")).is_err());
    }

    #[test]
    fn input_path_must_be_a_file() {
        let dir = TempDir::new().expect("tempdir");
        assert!(validate_file_path(dir.path()).is_err());
    }

    #[test]
    fn rater_sheet_without_scores_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("rater.txt");
        std::fs::write(&path, "no numbers here").expect("write");
        assert!(read_rater_sheet(&path).is_err());

        std::fs::write(&path, "Fluency: 4\nStructure: 5").expect("write");
        let sheet = read_rater_sheet(&path).expect("sheet");
        assert!(sheet.get(Criterion::Fluency).is_some());
    }
}
