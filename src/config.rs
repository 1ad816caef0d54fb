use crate::llm::{LlmSettings, Provider};
use clap::{Parser, ValueEnum};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config files searched, in order, when none is given explicitly.
pub const CONFIG_CANDIDATES: &[&str] = &["config.toml", "../config.toml", "../../config.toml"];

/// Placeholder replaced by the document name in the subject template.
pub const FILENAME_PLACEHOLDER: &str = "{filename}";

#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Summarize PDF documents with an LLM and deliver the summaries by email",
    long_about = None,
    after_help = "Examples:\n  \
        pdf-summary-mailer -d ./downloads            scan a directory and email every summary\n  \
        pdf-summary-mailer -d ./downloads --no-email summarize only\n  \
        pdf-summary-mailer -d ./downloads -n 5       process the first 5 documents\n  \
        pdf-summary-mailer -f ./report.pdf           process a single document"
)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Directory to scan for PDF documents
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Single PDF document to process
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Maximum number of documents to process (0 means no limit)
    #[arg(short = 'n', long)]
    pub max_files: Option<usize>,

    /// Summarize only, do not send email
    #[arg(long)]
    pub no_email: bool,

    /// Maximum number of pages read per document
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Seconds to wait between documents
    #[arg(long)]
    pub delay_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A required setting is absent.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub azure_openai: AzureOpenAiConfig,
    pub email: EmailConfig,
    pub download: DownloadConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AzureOpenAiConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment_name: String,
    pub api_version: String,
    pub system_prompt: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EmailConfig {
    pub smtp_server: Option<String>,
    /// Defaults by TLS mode when unset, see [`EmailConfig::effective_port`].
    pub smtp_port: Option<u16>,
    pub sender_email: Option<String>,
    pub sender_password: Option<String>,
    pub tls_mode: Option<TlsMode>,
    /// Legacy switch: `false` selects implicit TLS.
    pub use_tls: Option<bool>,
    /// Comma-separated recipient addresses.
    pub receiver_email: String,
    pub subject_template: String,
}

/// How the SMTP session is secured.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plaintext connection upgraded with STARTTLS.
    #[default]
    Starttls,
    /// Implicit TLS from the first byte.
    #[serde(alias = "tls")]
    Ssl,
}

impl TlsMode {
    /// Well-known submission port for this mode.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Starttls => 587,
            Self::Ssl => 465,
        }
    }
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starttls => write!(f, "starttls"),
            Self::Ssl => write!(f, "ssl"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DownloadConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    pub max_pages: usize,
    pub delay_secs: u64,
    pub extractor: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_pages: crate::file_processing::DEFAULT_MAX_PAGES,
            delay_secs: 2,
            extractor: "lopdf".to_string(),
        }
    }
}

impl EmailConfig {
    /// Recipient list: split on commas, trimmed, empty entries dropped.
    pub fn recipients(&self) -> Vec<String> {
        self.receiver_email
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Explicit `tls_mode` wins over the legacy `use_tls` switch.
    pub fn effective_tls_mode(&self) -> TlsMode {
        match (self.tls_mode, self.use_tls) {
            (Some(mode), _) => mode,
            (None, Some(false)) => TlsMode::Ssl,
            (None, _) => TlsMode::Starttls,
        }
    }

    /// Configured port, else 465 for implicit TLS and 587 for STARTTLS.
    pub fn effective_port(&self) -> u16 {
        self.smtp_port
            .unwrap_or_else(|| self.effective_tls_mode().default_port())
    }

    /// Whether a relay is configured at all.
    pub fn has_relay(&self) -> bool {
        self.smtp_server
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

impl AppConfig {
    pub fn load() -> Result<(Cli, Self), ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<(Cli, Self), ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args)
            .map_err(|e| ConfigError::Load(config::ConfigError::Message(e.to_string())))?;
        let config = Self::load_for_cli(&cli)?;
        Ok((cli, config))
    }

    pub fn load_for_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("azure_openai.deployment_name", "gpt-4")?
            .set_default("azure_openai.api_version", "2024-02-15-preview")?
            .set_default(
                "azure_openai.system_prompt",
                "You are a professional document summarization assistant.",
            )?
            .set_default("email.receiver_email", "")?
            .set_default("email.subject_template", "PDF summary: {filename}")?
            .set_default("download.dir", "downloads")?
            .set_default("processing.max_pages", 50)?
            .set_default("processing.delay_secs", 2)?
            .set_default("processing.extractor", "lopdf")?;

        // 2. Config file
        if let Some(path) = resolve_config_file(cli.config.as_deref()) {
            tracing::info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true));
        } else {
            tracing::warn!("No config.toml found; using defaults and environment only");
        }

        // 3. Environment variables, e.g. PDFMAIL_EMAIL__SMTP_PORT=465
        builder = builder.add_source(
            Environment::with_prefix("PDFMAIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides
        if let Some(pages) = cli.max_pages {
            builder = builder.set_override("processing.max_pages", u64::from(pages))?;
        }
        if let Some(delay) = cli.delay_secs {
            builder = builder.set_override("processing.delay_secs", delay)?;
        }

        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Startup checks. Failures here are fatal; the batch never starts.
    pub fn validate(&self, send_email: bool) -> Result<(), ConfigError> {
        self.llm_settings()?;

        if self.processing.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "processing.max_pages must be at least 1".to_string(),
            ));
        }

        if send_email && self.email.has_relay() {
            if non_empty(self.email.sender_email.as_deref()).is_none() {
                return Err(ConfigError::Missing("email.sender_email"));
            }
            if non_empty(self.email.sender_password.as_deref()).is_none() {
                return Err(ConfigError::Missing("email.sender_password"));
            }
        }

        Ok(())
    }

    /// Summarization backend settings, checked for required values.
    pub fn llm_settings(&self) -> Result<LlmSettings, ConfigError> {
        let openai = &self.azure_openai;

        let api_key = non_empty(openai.api_key.as_deref())
            .ok_or(ConfigError::Missing("azure_openai.api_key"))?;
        let endpoint = non_empty(openai.endpoint.as_deref())
            .ok_or(ConfigError::Missing("azure_openai.endpoint"))?;

        url::Url::parse(endpoint).map_err(|e| {
            ConfigError::Invalid(format!("azure_openai.endpoint '{endpoint}': {e}"))
        })?;

        Ok(LlmSettings {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            deployment_name: openai.deployment_name.clone(),
            api_version: openai.api_version.clone(),
            system_prompt: openai.system_prompt.clone(),
            provider: Provider::detect(endpoint, &openai.deployment_name, &openai.api_version),
        })
    }
}

/// Explicit path first, then the first existing candidate.
fn resolve_config_file(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    CONFIG_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
