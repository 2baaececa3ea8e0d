//! # EP-Simulator CLI
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show record counts
//! - `export` / `import` - Snapshot backup and restore
//! - `user` - Register and list users, change account status
//! - `assessment` - Create, inspect, assign, score and move assessments
//! - `question` - Add, answer and score questions
//! - `recording` - Attach and analyze recordings
//! - `notifications` - Show or mark notifications
//!
//! Commands that change an assessment act as the user given by `--actor`.

mod commands;

use crate::config::{AppConfig, Backend};
use clap::{Parser, Subcommand};
use epsim_core::{
    AssessmentStatus, EpsimError, QuestionType, Role, Score, TestType, UserId, UserStatus,
};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// EP-Simulator - ICAO English proficiency assessments
///
/// Records oral assessments, runs them through their lifecycle and
/// derives ICAO levels from the six rating criteria.
#[derive(Parser, Debug)]
#[command(name = "epsim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log the resolved configuration before running
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database (overrides config and EPSIM_DATABASE)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "file" (snapshot file)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<Backend>,

    /// Path to epsim.toml
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Id of the user performing the command
    #[arg(short = 'A', long, global = true)]
    pub actor: Option<u64>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show record counts
    Status,

    /// Write every record to a snapshot file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace every record with a snapshot file
    Import {
        #[arg(short, long)]
        input: PathBuf,

        /// Replace a database that already holds records
        #[arg(short, long)]
        force: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Manage assessments
    Assessment {
        #[command(subcommand)]
        action: AssessmentCommand,
    },

    /// Manage questions of an assessment
    Question {
        #[command(subcommand)]
        action: QuestionCommand,
    },

    /// Manage recordings of an assessment
    Recording {
        #[command(subcommand)]
        action: RecordingCommand,
    },

    /// Show notifications (defaults to the actor's)
    Notifications {
        /// User whose notifications to show
        #[arg(short, long)]
        user: Option<u64>,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        /// Mark this notification as read instead of listing
        #[arg(long)]
        mark_read: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user
    Add {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        name: String,

        /// admin, examiner, candidate or user
        #[arg(short, long, default_value = "candidate")]
        role: Role,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        organization: Option<String>,
    },

    /// List users
    List,

    /// Change a user's account status (admin only)
    Status {
        id: u64,

        /// active, pending or suspended
        status: UserStatus,
    },
}

#[derive(Subcommand, Debug)]
pub enum AssessmentCommand {
    /// Create a draft assessment owned by the actor
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// opi, eap or lpe
        #[arg(long, default_value = "opi")]
        test_type: TestType,

        /// Time limit once started, in minutes
        #[arg(long)]
        time_limit: Option<u32>,

        #[arg(long)]
        practice: bool,

        #[arg(long)]
        retake: bool,
    },

    /// Show one assessment
    Show { id: u64 },

    /// List assessments
    List {
        #[arg(short, long)]
        status: Option<AssessmentStatus>,

        #[arg(long)]
        created_by: Option<u64>,

        #[arg(long)]
        assigned_to: Option<u64>,

        #[arg(long)]
        test_type: Option<TestType>,
    },

    /// Assign an examiner
    Assign { id: u64, assignee: u64 },

    /// Draft -> in progress
    Start { id: u64 },

    /// In progress -> under review
    Submit { id: u64 },

    /// In progress or under review -> completed
    Complete { id: u64 },

    /// Move to archived (any status but archived)
    Archive { id: u64 },

    /// Draft, in progress or under review -> cancelled
    Cancel { id: u64 },

    /// Set ICAO sub-scores (e.g. --fluency 4.5)
    Score {
        id: u64,

        #[arg(long)]
        pronunciation: Option<Score>,

        #[arg(long)]
        structure: Option<Score>,

        #[arg(long)]
        vocabulary: Option<Score>,

        #[arg(long)]
        fluency: Option<Score>,

        #[arg(long)]
        comprehension: Option<Score>,

        #[arg(long)]
        interaction: Option<Score>,

        /// Read sub-scores from a rater's text ("Fluency: 4 ...")
        #[arg(long)]
        from_text: Option<PathBuf>,
    },

    /// Record examiner comments
    Feedback {
        id: u64,

        #[arg(long)]
        strengths: Option<String>,

        #[arg(long)]
        improvements: Option<String>,

        #[arg(long)]
        recommendations: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        feedback: Option<String>,
    },

    /// Update completion percentage
    Progress { id: u64, percent: u8 },

    /// Set the overall score from the scored questions
    Calculate { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum QuestionCommand {
    /// Append a question
    Add {
        assessment: u64,

        /// multiple_choice, short_answer, long_answer, oral_response,
        /// picture_description or scenario
        #[arg(short = 't', long)]
        question_type: QuestionType,

        #[arg(long)]
        text: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Record the candidate's answer
    Answer {
        assessment: u64,
        index: usize,
        answer: String,
    },

    /// Score one question
    Score {
        assessment: u64,
        index: usize,
        score: Score,

        #[arg(long)]
        feedback: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecordingCommand {
    /// Attach a recording stored under the audio directory
    Add {
        assessment: u64,

        /// Path relative to the audio directory
        file: String,

        #[arg(long, default_value = "0")]
        duration_ms: u32,

        /// Question the recording answers
        #[arg(long)]
        question: Option<usize>,

        #[arg(long)]
        language: Option<String>,
    },

    /// Decode, transcribe and score a recording
    Analyze {
        assessment: u64,
        index: usize,

        /// Reference text (defaults to the linked question)
        #[arg(long)]
        expected: Option<String>,

        /// Use the result as the pronunciation sub-score
        #[arg(long)]
        apply: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: AppConfig,
    pub json_mode: bool,
    pub actor: Option<UserId>,
}

impl Context {
    pub fn database(&self) -> &std::path::Path {
        &self.config.storage.database
    }

    pub fn backend(&self) -> Backend {
        self.config.storage.backend
    }

    /// The acting user; required by every mutating assessment command.
    pub fn actor(&self) -> Result<UserId, EpsimError> {
        self.actor
            .ok_or_else(|| EpsimError::InvalidInput("--actor <id> is required".to_string()))
    }
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), EpsimError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.database = database;
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if cli.verbose {
        tracing::info!(
            database = %config.storage.database.display(),
            backend = config.storage.backend.as_str(),
            audio_dir = ?config.audio.directory,
            transcription = ?config.transcription.provider,
            "Resolved configuration"
        );
    }

    let ctx = Context {
        config,
        json_mode: cli.json_mode,
        actor: cli.actor.map(UserId),
    };

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, host, port).await,
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Export { output }) => cmd_export(&ctx, &output),
        Some(Commands::Import { input, force }) => cmd_import(&ctx, &input, force),
        Some(Commands::User { action }) => cmd_user(&ctx, action),
        Some(Commands::Assessment { action }) => cmd_assessment(&ctx, action),
        Some(Commands::Question { action }) => cmd_question(&ctx, action),
        Some(Commands::Recording { action }) => cmd_recording(&ctx, action).await,
        Some(Commands::Notifications {
            user,
            limit,
            unread,
            mark_read,
        }) => cmd_notifications(&ctx, user, limit, unread, mark_read),
    }
}
