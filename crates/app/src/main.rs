use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use educare_core::model::{ChallengeId, QuizId};
use services::attempt::TimerDisplay;
use services::{AppServices, Clock, ServiceConfig};

mod attempt_cli;
mod challenge_cli;
mod input;

#[derive(Parser)]
#[command(name = "educare")]
#[command(about = "Take timed quizzes and coding challenges from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL (overrides EDUCARE_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Bearer token (overrides EDUCARE_API_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    /// SQLite database for local drafts (overrides EDUCARE_DB_URL)
    #[arg(long = "db", global = true, value_name = "SQLITE_URL")]
    db_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Take or resume a quiz attempt
    Take { quiz_id: u64 },
    /// Work on a coding challenge
    Challenge { challenge_id: u64 },
    /// List attempt drafts saved on this device
    Drafts,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::from_env()?.with_api_token(cli.token.clone());
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(db_url) = &cli.db_url {
        config = config.with_db_url(db_url.clone());
    }
    let db_url = normalize_sqlite_url(&config.db_url);
    prepare_sqlite_dir(&db_url)?;
    Ok(config.with_db_url(db_url))
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite:///") {
        return trimmed.to_owned();
    }

    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_dir(db_url: &str) -> Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating draft directory {}", parent.display()))?;
    }
    Ok(())
}

async fn list_drafts(services: &AppServices) -> Result<()> {
    let drafts = services.drafts().list_drafts().await?;
    if drafts.is_empty() {
        println!("No drafts saved on this device.");
        return Ok(());
    }
    for draft in drafts {
        println!(
            "attempt {} (quiz {}): {} answered, {} used, saved {}",
            draft.attempt_id,
            draft.quiz_id,
            draft.answers.len(),
            TimerDisplay::new(draft.time_spent, None),
            draft.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(api = %config.api_url, db = %config.db_url, "configuration loaded");
    let services = AppServices::new(config, Clock::default())
        .await
        .context("starting services")?;

    match cli.command {
        Command::Take { quiz_id } => attempt_cli::run(&services, QuizId::new(quiz_id)).await,
        Command::Challenge { challenge_id } => {
            challenge_cli::run(&services, ChallengeId::new(challenge_id)).await
        }
        Command::Drafts => list_drafts(&services).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_memory_and_absolute_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/drafts.sqlite3"),
            "sqlite:///tmp/drafts.sqlite3"
        );
    }

    #[test]
    fn relative_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite://drafts/educare.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("drafts/educare.sqlite3"));
    }

    #[test]
    fn cli_flags_are_global() {
        let cli = Cli::try_parse_from(["educare", "take", "4", "--api-url", "http://x:1"]).unwrap();
        assert!(matches!(cli.command, Command::Take { quiz_id: 4 }));
        assert_eq!(cli.api_url.as_deref(), Some("http://x:1"));
    }
}
