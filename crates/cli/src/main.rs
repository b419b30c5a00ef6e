//! LabMan CLI - lab progress and submission lifecycle.

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labman_api::{ApiResponse, LabmanApi, LabmanConfig, Request};
use labman_core::{
    Actor, ActorId, Classroom, LabId, Permission, ProgressId, Project, ProjectId, Role, SubmissionId,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labman")]
#[command(about = "Lab progress and submission lifecycle", long_about = None)]
struct Cli {
    /// Config file (JSON); defaults apply when it does not exist
    #[arg(long, global = true, default_value = "labman.json")]
    config: PathBuf,

    /// Storage directory, overriding the config
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, default_value = "admin")]
    actor: String,

    /// Acting user role (student, instructor, administrator)
    #[arg(long, global = true, default_value = "administrator")]
    role: Role,

    /// Replace the role's default permissions (repeatable)
    #[arg(long = "permission", global = true)]
    permissions: Vec<Permission>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a project tree from a JSON file
    ImportCurriculum {
        /// Project JSON, or `{"classroom": ..., "project": ...}`
        file: PathBuf,
    },
    /// Open a project for a student
    Start {
        /// Project ID
        project: ProjectId,
        /// Student, defaults to the actor
        #[arg(long)]
        student: Option<String>,
    },
    /// Complete a section by flat index
    CompleteSection {
        /// Progress record ID
        progress: ProgressId,
        /// Section index across all labs
        index: usize,
        /// Fail if the record changed since this version
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Reset a progress record
    Reset {
        /// Progress record ID
        progress: ProgressId,
        /// Fail if the record changed since this version
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Open a new draft attempt
    Draft {
        /// Lab ID
        lab: LabId,
        /// Student, defaults to the actor
        #[arg(long)]
        student: Option<String>,
    },
    /// Submit the latest draft for a lab
    Submit {
        /// Lab ID
        lab: LabId,
        /// Student, defaults to the actor
        #[arg(long)]
        student: Option<String>,
    },
    /// Grade a submission
    Grade {
        /// Submission ID
        submission: SubmissionId,
        /// Score between 0 and the lab maximum
        grade: f64,
        /// Feedback for the student
        #[arg(long)]
        feedback: Option<String>,
        /// Fail if the submission changed since this version
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// List a student's attempts at a lab
    Attempts {
        /// Lab ID
        lab: LabId,
        /// Student, defaults to the actor
        #[arg(long)]
        student: Option<String>,
    },
    /// Show a student's progress in a project
    Progress {
        /// Project ID
        project: ProjectId,
        /// Student, defaults to the actor
        #[arg(long)]
        student: Option<String>,
    },
    /// Show statistics
    Stats {
        #[command(subcommand)]
        target: StatsTarget,
    },
}

#[derive(Subcommand)]
enum StatsTarget {
    /// Project aggregates
    Project {
        /// Project ID
        id: ProjectId,
    },
    /// Lab aggregates
    Lab {
        /// Lab ID
        id: LabId,
    },
    /// One student's submission aggregates
    Student {
        /// Student ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LabmanConfig::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(storage) = &cli.storage {
        config.storage_path = storage.clone();
    }

    init_logging(&config.log_level);

    let actor = build_actor(&cli);
    let request = build_request(&actor, cli.command).await?;

    let api = LabmanApi::open(&config).await?;
    info!(op = request.op(), actor = %actor.id, "running");
    let response: ApiResponse = api.handle(&actor, request).await.into();

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.error.is_some() {
        std::process::exit(1);
    }

    Ok(())
}

/// Log to stderr so stdout carries only the JSON response.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_actor(cli: &Cli) -> Actor {
    let actor = Actor::new(cli.actor.as_str(), cli.role);
    if cli.permissions.is_empty() {
        actor
    } else {
        actor.with_permissions(cli.permissions.iter().copied())
    }
}

async fn build_request(actor: &Actor, command: Commands) -> Result<Request> {
    let student = |s: Option<String>| s.map(ActorId::from).unwrap_or_else(|| actor.id.clone());

    let request = match command {
        Commands::ImportCurriculum { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let (classroom, project) = parse_curriculum(&raw)?;
            Request::ImportCurriculum { classroom, project }
        }
        Commands::Start { project, student: s } => Request::StartProject {
            student_id: student(s),
            project_id: project,
        },
        Commands::CompleteSection {
            progress,
            index,
            expected_version,
        } => Request::CompleteSection {
            progress_id: progress,
            section_index: index,
            expected_version,
        },
        Commands::Reset {
            progress,
            expected_version,
        } => Request::ResetProgress {
            progress_id: progress,
            expected_version,
        },
        Commands::Draft { lab, student: s } => Request::CreateDraft {
            lab_id: lab,
            student_id: student(s),
        },
        Commands::Submit { lab, student: s } => Request::SubmitLab {
            lab_id: lab,
            student_id: student(s),
        },
        Commands::Grade {
            submission,
            grade,
            feedback,
            expected_version,
        } => Request::GradeSubmission {
            submission_id: submission,
            grade,
            feedback,
            expected_version,
        },
        Commands::Attempts { lab, student: s } => Request::ListAttempts {
            student_id: student(s),
            lab_id: lab,
        },
        Commands::Progress { project, student: s } => Request::GetProgress {
            student_id: student(s),
            project_id: project,
        },
        Commands::Stats { target } => match target {
            StatsTarget::Project { id } => Request::ProjectStats { project_id: id },
            StatsTarget::Lab { id } => Request::LabStats { lab_id: id },
            StatsTarget::Student { id } => Request::StudentStats {
                student_id: ActorId::from(id),
            },
        },
    };

    Ok(request)
}

/// Accept either a bare project or a `{classroom, project}` pair.
fn parse_curriculum(raw: &str) -> Result<(Option<Classroom>, Project)> {
    let value: serde_json::Value = serde_json::from_str(raw).context("curriculum is not JSON")?;

    if let Some(project) = value.get("project") {
        let project: Project = serde_json::from_value(project.clone()).context("invalid project")?;
        let classroom = match value.get("classroom") {
            Some(c) if !c.is_null() => Some(serde_json::from_value(c.clone()).context("invalid classroom")?),
            _ => None,
        };
        return Ok((classroom, project));
    }

    Ok((None, serde_json::from_value(value).context("invalid project")?))
}
