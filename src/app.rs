//! Wiring from configuration to a running batch.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, Cli, ConfigError};
use crate::file_processing::ExtractorFactory;
use crate::llm::{ChatCompletionsSummarizer, Summarizer};
use crate::mail::{MailTransport, MessageComposer, RelaySettings, SmtpRelay};
use crate::pipeline::{
    BatchOptions, BatchOrchestrator, BatchStats, Delivery, DiscoveryError, Document,
    DocumentProcessor, PacingPolicy, ProcessOutcome,
};

/// Errors that stop a run before or instead of the batch.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Neither a file nor a directory was given and the default directory is absent.
    #[error("No input: pass --file or --directory, or create the download directory {0}")]
    NoInput(PathBuf),
}

/// What a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Directory(PathBuf),
}

/// `--file` beats `--directory`; otherwise the configured download directory
/// if it exists.
pub fn resolve_target(cli: &Cli, config: &AppConfig) -> Result<Target, RunError> {
    if let Some(file) = &cli.file {
        return Ok(Target::File(file.clone()));
    }
    if let Some(dir) = &cli.directory {
        return Ok(Target::Directory(dir.clone()));
    }
    if config.download.dir.is_dir() {
        return Ok(Target::Directory(config.download.dir.clone()));
    }
    Err(RunError::NoInput(config.download.dir.clone()))
}

/// Build the processor, with delivery when a relay and recipients are configured.
pub fn build_processor(config: &AppConfig, send_email: bool) -> Result<DocumentProcessor, ConfigError> {
    let extractor = ExtractorFactory::create(&config.processing)?;
    let summarizer: Arc<dyn Summarizer> =
        Arc::new(ChatCompletionsSummarizer::new(config.llm_settings()?));
    tracing::info!(model = summarizer.model_name(), "Summarizer ready");

    let processor = DocumentProcessor::new(extractor, summarizer, config.processing.max_pages);
    if !send_email {
        return Ok(processor);
    }

    match build_delivery(config)? {
        Some(delivery) => Ok(processor.with_delivery(delivery)),
        None => Ok(processor),
    }
}

fn build_delivery(config: &AppConfig) -> Result<Option<Delivery>, ConfigError> {
    let email = &config.email;
    if !email.has_relay() {
        tracing::warn!("email.smtp_server not set; summaries will not be emailed");
        return Ok(None);
    }

    let recipients = email.recipients();
    if recipients.is_empty() {
        tracing::warn!("email.receiver_email is empty; summaries will not be emailed");
        return Ok(None);
    }

    let host = email.smtp_server.clone().unwrap_or_default().trim().to_string();
    let sender = email
        .sender_email
        .clone()
        .ok_or(ConfigError::Missing("email.sender_email"))?;
    let password = email
        .sender_password
        .clone()
        .ok_or(ConfigError::Missing("email.sender_password"))?;

    let composer = MessageComposer::new(&sender, &recipients, email.subject_template.clone())
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    let settings = RelaySettings {
        host,
        port: email.effective_port(),
        tls_mode: email.effective_tls_mode(),
        username: sender,
        password,
    };
    tracing::info!(
        host = %settings.host,
        port = settings.port,
        tls_mode = %settings.tls_mode,
        recipients = recipients.len(),
        "Email delivery enabled"
    );

    let transport: Arc<dyn MailTransport> = Arc::new(SmtpRelay::new(settings));
    Ok(Some(Delivery::new(composer, transport)))
}

/// Run the batch selected by `cli`.
pub async fn run(cli: &Cli, config: &AppConfig) -> Result<BatchStats, RunError> {
    let send_email = !cli.no_email;
    config.validate(send_email)?;

    let target = resolve_target(cli, config)?;
    let orchestrator = BatchOrchestrator::new(
        build_processor(config, send_email)?,
        PacingPolicy::from_secs(config.processing.delay_secs),
    );

    let stats = match target {
        Target::File(path) => {
            orchestrator
                .run_file(&path, send_email, print_surfaced_summary)
                .await?
        }
        Target::Directory(root) => {
            let options = BatchOptions {
                max_files: cli.max_files,
                send_email,
            };
            orchestrator
                .run_directory(&root, options, print_surfaced_summary)
                .await?
        }
    };
    Ok(stats)
}

/// Print summaries that were produced but not delivered.
pub fn print_surfaced_summary(doc: &Document, outcome: &ProcessOutcome) {
    if let ProcessOutcome::Skipped { summary, .. } = outcome {
        println!("\n===== {} =====\n{}\n", doc.display_name, summary.content);
    }
}
