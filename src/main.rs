use anyhow::Result;
use autoapply::cli::{handle_command, Cli};
use autoapply::core::ConfigManager;
use autoapply::environment::Environment;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::{error, info, warn};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE: &str = "autoapply.log";

/// JSON file log (truncated on startup) plus compact stdout.
/// Returns the file path, or `None` when only stdout is active.
fn init_logging(environment: Environment) -> Option<PathBuf> {
    let log_dir = std::env::var("LOG_DIR")
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".logs"));
    let log_path = log_dir.join(LOG_FILE);

    let file = std::fs::create_dir_all(&log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true) // Clear file on startup
            .open(&log_path)
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(environment.default_log_filter()));

    let file_layer = file.as_ref().ok().and_then(|f| f.try_clone().ok()).map(|f| {
        fmt::layer()
            .json()
            .with_writer(f)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().compact().with_target(false))
        .with(filter)
        .init();

    match file {
        Ok(_) => Some(log_path),
        Err(e) => {
            warn!("Could not open {}: {}, logging to stdout only", log_path.display(), e);
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let environment = Environment::get_environment();
    let dotenv_loaded = environment.load_dotenv();

    let log_path = init_logging(environment);

    info!("Starting LinkedIn auto-apply ({})", environment);
    if dotenv_loaded {
        info!("Loaded {}", environment.dotenv_file());
    } else {
        info!("No {} file, using process environment", environment.dotenv_file());
    }
    if let Some(path) = log_path {
        info!("Writing JSON logs to {}", path.display());
    }

    let code = match run(cli, environment).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, environment: Environment) -> Result<i32> {
    let config = ConfigManager::load(environment)?;
    let outcome = handle_command(cli, config).await?;
    Ok(outcome.exit_code())
}
