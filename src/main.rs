use anyhow::Result;
use clap::Parser;
use lingo_batch::{config, db, runner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Batch token identifying the queued group of work items
    token: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/lingo.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match runner::run_batch(&pool, &cfg, &args.token).await {
        Ok(summary) => {
            info!(%summary, "batch run finished");
            println!("{summary}");
            Ok(ExitCode::SUCCESS)
        }
        // An unconfigured token is "nothing to do", not an operational error.
        Err(runner::BatchError::NoRecordsFound) => {
            info!("no records found; nothing to do");
            println!("no records found; nothing to do");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            warn!(%err, "batch run failed");
            eprintln!("error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
