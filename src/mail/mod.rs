//! Summary email composition and delivery.
//!
//! [`MessageComposer`] turns a summary plus document metadata into a
//! [`ComposedMessage`]; a [`MailTransport`] delivers it.

pub mod message;
pub mod report;
pub mod transport;

pub use message::{
    AttachmentDisposition, AttachmentPart, AttachmentType, ComposeError, ComposeRequest,
    ComposedMessage, MessageComposer, content_disposition_value,
};
pub use report::{ReportContext, human_size, render_summary_html};
pub use transport::{
    DeliveryError, DeliveryErrorKind, MailTransport, RelaySettings, SmtpRelay, classify_reply_code,
};
