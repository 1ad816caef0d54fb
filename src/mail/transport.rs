//! SMTP delivery.
//!
//! Each [`SmtpRelay::send`] builds its own transport, so a session is opened,
//! authenticated, used for one message and closed when the transport drops.
//! The crate is built without lettre's connection pool; nothing outlives the call.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::message::{ComposeError, ComposedMessage};
use crate::config::TlsMode;

/// SMTP reply codes that mean the relay rejected the credential.
const AUTH_REPLY_CODES: &[u16] = &[530, 534, 535];

/// Coarse delivery failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// Credential rejected.
    Authentication,
    /// Relay reported a transmission error.
    Protocol,
    /// Connection, TLS or local failure.
    Generic,
}

impl std::fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Protocol => write!(f, "protocol"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The relay rejected the credential.
    #[error("SMTP authentication failed ({code}): {message}")]
    Authentication {
        /// SMTP reply code.
        code: u16,
        /// Relay message.
        message: String,
    },

    /// The relay answered with an error reply.
    #[error("SMTP protocol error ({code}): {message}")]
    Protocol {
        /// SMTP reply code.
        code: u16,
        /// Relay message.
        message: String,
    },

    /// No reply was obtained (DNS, TCP, TLS, timeout).
    #[error("SMTP connection error: {0}")]
    Connection(String),

    /// The message could not be serialized.
    #[error(transparent)]
    Message(#[from] ComposeError),
}

impl DeliveryError {
    /// Failure class of this error.
    pub fn kind(&self) -> DeliveryErrorKind {
        match self {
            Self::Authentication { .. } => DeliveryErrorKind::Authentication,
            Self::Protocol { .. } => DeliveryErrorKind::Protocol,
            Self::Connection(_) | Self::Message(_) => DeliveryErrorKind::Generic,
        }
    }

    /// Classify a lettre SMTP error by its reply code.
    pub fn from_smtp(err: &lettre::transport::smtp::Error) -> Self {
        let code = err
            .status()
            .and_then(|code| code.to_string().parse::<u16>().ok());
        let message = err.to_string();

        match (classify_reply_code(code), code) {
            (DeliveryErrorKind::Authentication, Some(code)) => Self::Authentication { code, message },
            (DeliveryErrorKind::Protocol, Some(code)) => Self::Protocol { code, message },
            _ => Self::Connection(message),
        }
    }
}

/// Map an SMTP reply code (if any) to a failure class.
pub fn classify_reply_code(code: Option<u16>) -> DeliveryErrorKind {
    match code {
        Some(code) if AUTH_REPLY_CODES.contains(&code) => DeliveryErrorKind::Authentication,
        Some(_) => DeliveryErrorKind::Protocol,
        None => DeliveryErrorKind::Generic,
    }
}

/// Transmits composed messages.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync + std::fmt::Debug {
    /// Deliver `message` to every recipient in a single attempt.
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError>;

    /// Name used in logs.
    fn transport_name(&self) -> &'static str;
}

/// Relay address and login.
#[derive(Clone)]
pub struct RelaySettings {
    /// Relay host.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Session security.
    pub tls_mode: TlsMode,
    /// Login name (the sender address).
    pub username: String,
    /// Login secret.
    pub password: String,
}

impl std::fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls_mode", &self.tls_mode)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP relay transport.
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    settings: RelaySettings,
}

impl SmtpRelay {
    pub fn new(settings: RelaySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    fn open(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = match self.settings.tls_mode {
            TlsMode::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
            }
            TlsMode::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.host),
        }
        .map_err(|e| DeliveryError::Connection(e.to_string()))?;

        Ok(builder
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ))
            .build())
    }
}

/// Transmit `message` over `transport` and classify any failure.
async fn deliver(
    transport: &AsyncSmtpTransport<Tokio1Executor>,
    host: &str,
    message: &ComposedMessage,
) -> Result<(), DeliveryError> {
    let envelope = message.envelope()?;
    let bytes = message.formatted()?;

    tracing::debug!(
        host,
        recipients = envelope.to().len(),
        bytes = bytes.len(),
        "Opening SMTP session"
    );

    match transport.send_raw(&envelope, &bytes).await {
        Ok(response) => {
            tracing::info!(
                host,
                code = %response.code(),
                recipients = envelope.to().len(),
                "Message accepted by relay"
            );
            Ok(())
        }
        Err(e) => {
            let err = DeliveryError::from_smtp(&e);
            tracing::error!(
                host,
                kind = %err.kind(),
                error = %err,
                "SMTP delivery failed"
            );
            Err(err)
        }
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpRelay {
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError> {
        let transport = self.open()?;
        tracing::debug!(
            host = %self.settings.host,
            port = self.settings.port,
            tls_mode = %self.settings.tls_mode,
            "Connecting to relay"
        );
        deliver(&transport, &self.settings.host, message).await
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}
