// src/cli.rs
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::browser::{BrowserSession, WebDriverSession};
use crate::core::{ConfigManager, Database, JobStore, LlmClient};
use crate::linkedin::assistant::JobAssistant;
use crate::runner::AutoApplyRunner;
use crate::types::{JobRecord, Profile};

#[derive(Parser)]
#[command(name = "autoapply")]
#[command(about = "Apply to LinkedIn Easy Apply jobs and keep a record of every attempt")]
pub struct Cli {
    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in, search and apply
    Run(RunArgs),
    /// Show database statistics
    Stats,
    /// List jobs applied to
    Applied,
    /// Write applied jobs to a CSV file
    Export { csv_file: PathBuf },
}

#[derive(Args, Default)]
pub struct RunArgs {
    #[arg(long, env = "JOB_SEARCH_KEYWORDS")]
    pub keywords: Option<String>,
    #[arg(long, env = "JOB_SEARCH_LOCATION")]
    pub location: Option<String>,
    #[arg(long, env = "MAX_JOBS")]
    pub max_jobs: Option<usize>,
}

/// How a successful command ended, for the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    NoJobsFound,
}

impl CommandOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::NoJobsFound => 2,
        }
    }
}

pub async fn handle_command(cli: Cli, mut config: ConfigManager) -> Result<CommandOutcome> {
    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            if let Some(keywords) = args.keywords {
                config.search.keywords = keywords;
            }
            if let Some(location) = args.location {
                config.search.location = location;
            }
            if let Some(max_jobs) = args.max_jobs {
                config.search.max_jobs = max_jobs;
            }
            run(&config).await
        }

        Command::Stats => {
            let db = Database::new(&config.paths.database_path).await?;
            let stats = db.jobs().stats().await?;
            info!("Database statistics ({})", config.paths.database_path.display());
            info!("  Total jobs:     {}", stats.total_jobs);
            info!("  Unique jobs:    {}", stats.unique_jobs);
            info!("  Form fields:    {}", stats.total_fields);
            info!("  Applied:        {}", stats.applied_count);
            Ok(CommandOutcome::Completed)
        }

        Command::Applied => {
            let db = Database::new(&config.paths.database_path).await?;
            let jobs = db.jobs().list_applied().await?;
            if jobs.is_empty() {
                info!("No applications recorded yet.");
            } else {
                info!(
                    "{:<12} {:<35} {:<25} {:<17}",
                    "Job ID", "Title", "Company", "Applied"
                );
                info!("{}", "-".repeat(92));
                for job in &jobs {
                    info!(
                        "{:<12} {:<35} {:<25} {:<17}",
                        job.job_id,
                        job.title,
                        job.company,
                        job.applied_at
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_default()
                    );
                }
            }
            Ok(CommandOutcome::Completed)
        }

        Command::Export { csv_file } => {
            let db = Database::new(&config.paths.database_path).await?;
            let jobs = db.jobs().list_applied().await?;
            let file = std::fs::File::create(&csv_file)
                .with_context(|| format!("Failed to create {}", csv_file.display()))?;
            write_csv(file, &jobs)?;
            info!("Exported {} applications to {}", jobs.len(), csv_file.display());
            Ok(CommandOutcome::Completed)
        }
    }
}

async fn run(config: &ConfigManager) -> Result<CommandOutcome> {
    config.ensure_directories().await?;

    let store = JobStore::open(&config.paths.database_path).await;
    let profile = Profile::load(&config.paths.profile_path).await?;
    profile.validate()?;
    let model = LlmClient::new(&config.llm)?;
    let assistant = JobAssistant::new(
        Arc::new(model),
        Arc::new(profile),
        config.llm.prompt_char_limit,
    );

    let session = WebDriverSession::start(&config.browser)
        .await
        .with_context(|| format!("Failed to start browser via {}", config.browser.webdriver_url))?;
    info!("Browser session {} started", session.session_id());

    let mut runner = AutoApplyRunner::new(&session, config, &store, &assistant);
    let result = runner
        .run(
            &config.search.keywords,
            &config.search.location,
            config.search.max_jobs,
        )
        .await;

    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }

    match result {
        Ok(summary) if summary.no_jobs_found => Ok(CommandOutcome::NoJobsFound),
        Ok(summary) => {
            info!(
                "Applied to {} of {} candidate jobs",
                summary.applied, summary.candidates
            );
            Ok(CommandOutcome::Completed)
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            Err(e.into())
        }
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    job_id: &'a str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    job_url: &'a str,
    applied_at: String,
}

/// One row per job, with a header
pub fn write_csv<W: Write>(writer: W, jobs: &[JobRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for job in jobs {
        csv.serialize(ExportRow {
            job_id: &job.job_id,
            title: &job.title,
            company: &job.company,
            location: &job.location,
            job_url: job.job_url.as_deref().unwrap_or_default(),
            applied_at: job.applied_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        })
        .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}
