//! PDF Summary Mailer
//!
//! Command-line entry point.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::manual_let_else)]

use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pdf_summary_mailer::app::{self, RunError};
use pdf_summary_mailer::config::{AppConfig, Cli, LogFormat};
use pdf_summary_mailer::pipeline::BatchStats;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<BatchStats> {
    let config = AppConfig::load_for_cli(cli).context("Configuration error")?;
    let stats = app::run(cli, &config).await?;
    Ok(stats)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(&cli).await {
        Ok(stats) => {
            println!("\nProcessed {} document(s): {} succeeded, {} failed", stats.total, stats.success, stats.failed);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(RunError::NoInput(_)) = err.downcast_ref::<RunError>() {
                eprintln!("{err}\n");
                let _ = Cli::command().print_help();
            } else {
                tracing::error!(error = %format!("{err:#}"), "Run aborted");
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
