//! MIME message composition.
//!
//! A [`ComposedMessage`] is the complete outbound email before transmission:
//! an HTML part plus zero or more base64 attachments, with the recipient list
//! kept separately from the display `To` header for the SMTP envelope.

use chrono::Local;
use lettre::address::Envelope;
use lettre::message::header::{ContentTransferEncoding, ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use std::path::{Path, PathBuf};

use super::report::{ReportContext, render_summary_html};
use crate::config::FILENAME_PLACEHOLDER;
use crate::llm::Usage;

/// Errors raised while composing a message.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// An address could not be parsed.
    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress {
        /// The offending input.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// No recipients were configured.
    #[error("No recipients configured")]
    NoRecipients,

    /// An existing attachment could not be read.
    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        /// Attachment path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// lettre rejected the message structure.
    #[error("Failed to build message: {0}")]
    Build(String),
}

/// Declared MIME type of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentType {
    /// `application/pdf`
    Pdf,
    /// `application/octet-stream`
    OctetStream,
}

impl AttachmentType {
    /// `.pdf` (any case) is a PDF, everything else is generic binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => Self::Pdf,
            _ => Self::OctetStream,
        }
    }

    /// MIME type string.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

/// A binary attachment, fully loaded in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// File name as shown to the recipient.
    pub filename: String,
    /// Declared MIME type.
    pub content_type: AttachmentType,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

impl AttachmentPart {
    fn to_single_part(&self) -> Result<SinglePart, ComposeError> {
        let content_type = ContentType::parse(self.content_type.mime())
            .map_err(|e| ComposeError::Build(e.to_string()))?;

        Ok(SinglePart::builder()
            .header(content_type)
            .header(ContentTransferEncoding::Base64)
            .header(AttachmentDisposition::new(self.filename.clone()))
            .body(self.bytes.clone()))
    }
}

/// `Content-Disposition: attachment` carrying the filename twice: the literal
/// UTF-8 name in `filename` and an RFC 2231 percent-encoded `filename*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDisposition {
    filename: String,
}

impl AttachmentDisposition {
    /// Disposition for `filename`.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// The filename carried by this disposition.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Longest physical line used for the encoded filename parameters.
const MAX_LINE_LEN: usize = 78;

/// Hard line limit of RFC 5322, without the CRLF.
const MAX_HARD_LINE_LEN: usize = 998;

/// Folding whitespace between parameters.
const FOLD: &str = "\r\n ";

/// Render the folded disposition header value for `filename`.
///
/// Every parameter sits on its own continuation line. The percent-encoded
/// name is split into RFC 2231 sections (`filename*0*`, `filename*1*`, ...)
/// when it does not fit on one line. The quoted literal name is omitted when
/// it alone would exceed the hard line limit; the encoded form still carries it.
pub fn content_disposition_value(filename: &str) -> String {
    let mut params = Vec::new();

    let quoted = format!("filename=\"{}\"", quote_filename(filename));
    if " ".len() + quoted.len() + ";".len() <= MAX_HARD_LINE_LEN {
        params.push(quoted);
    }
    params.extend(extended_filename_params(filename));

    let mut value = String::from("attachment");
    for param in params {
        value.push(';');
        value.push_str(FOLD);
        value.push_str(&param);
    }
    value
}

/// `filename*=UTF-8''...`, or numbered sections when that line would be too long.
fn extended_filename_params(filename: &str) -> Vec<String> {
    const CHARSET: &str = "UTF-8''";

    let encoded = urlencoding::encode(filename);
    let single = format!("filename*={CHARSET}{encoded}");
    if " ".len() + single.len() <= MAX_LINE_LEN {
        return vec![single];
    }

    let mut params = Vec::new();
    let mut prefix = format!("filename*0*={CHARSET}");
    let mut section = String::new();
    for token in percent_tokens(&encoded) {
        let line_len = " ".len() + prefix.len() + section.len() + token.len() + ";".len();
        if line_len > MAX_LINE_LEN && !section.is_empty() {
            params.push(format!("{prefix}{section}"));
            section.clear();
            prefix = format!("filename*{}*=", params.len());
        }
        section.push_str(token);
    }
    if !section.is_empty() {
        params.push(format!("{prefix}{section}"));
    }
    params
}

/// Split percent-encoded text so that `%XX` triplets are never cut.
fn percent_tokens(encoded: &str) -> impl Iterator<Item = &str> {
    let mut rest = encoded;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let len = if rest.starts_with('%') { rest.len().min(3) } else { 1 };
        let (token, tail) = rest.split_at(len);
        rest = tail;
        Some(token)
    })
}

/// Escape a filename for a quoted-string; control characters become `_`.
fn quote_filename(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    for ch in filename.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_control() => out.push('_'),
            c => out.push(c),
        }
    }
    out
}

/// Undo header folding: CRLF is removed, the following whitespace stays.
fn unfold(value: &str) -> String {
    value.replace("\r\n", "")
}

/// Parameters of a disposition value as lowercase name and unquoted value.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let value = unfold(value);
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);

    segments
        .into_iter()
        .skip(1)
        .filter_map(|segment| {
            let (name, raw) = segment.split_once('=')?;
            Some((name.trim().to_ascii_lowercase(), unquote(raw.trim())))
        })
        .collect()
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// Decode `charset'language'percent-encoded` (UTF-8 only).
fn decode_rfc2231(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

/// Decode the extended filename of a disposition value, either the single
/// `filename*=` form or reassembled `filename*N*=` sections.
pub fn decode_extended_filename(value: &str) -> Option<String> {
    let params = disposition_params(value);
    if let Some((_, single)) = params.iter().find(|(name, _)| name == "filename*") {
        return decode_rfc2231(single);
    }

    let mut sections: Vec<(usize, bool, &str)> = params
        .iter()
        .filter_map(|(name, value)| {
            let rest = name.strip_prefix("filename*")?;
            let (index, encoded) = match rest.strip_suffix('*') {
                Some(index) => (index, true),
                None => (rest, false),
            };
            Some((index.parse().ok()?, encoded, value.as_str()))
        })
        .collect();
    sections.sort_by_key(|(index, _, _)| *index);
    if sections.is_empty() || sections.iter().enumerate().any(|(i, (index, _, _))| i != *index) {
        return None;
    }

    let mut joined = String::new();
    for (_, encoded, value) in &sections {
        if *encoded {
            joined.push_str(value);
        } else {
            joined.push_str(&urlencoding::encode(value));
        }
    }

    if sections[0].1 {
        decode_rfc2231(&joined)
    } else {
        urlencoding::decode(&joined).ok().map(|s| s.into_owned())
    }
}

/// Decode the quoted `filename="..."` parameter of a disposition value.
pub fn decode_quoted_filename(value: &str) -> Option<String> {
    disposition_params(value)
        .into_iter()
        .find(|(name, _)| name == "filename")
        .map(|(_, value)| value)
}

impl Header for AttachmentDisposition {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Content-Disposition")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        decode_extended_filename(s)
            .or_else(|| decode_quoted_filename(s))
            .map(Self::new)
            .ok_or_else(|| format!("no filename in Content-Disposition: {s}").into())
    }

    fn display(&self) -> HeaderValue {
        let value = content_disposition_value(&self.filename);
        HeaderValue::dangerous_new_pre_encoded(Self::name(), unfold(&value), value)
    }
}

/// A complete outbound email, pre-transmission.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    /// Sender.
    pub from: Mailbox,
    /// Recipients, in configured order; never empty.
    pub to: Vec<Mailbox>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Attachments, in order.
    pub attachments: Vec<AttachmentPart>,
}

impl ComposedMessage {
    /// SMTP envelope: sender plus the explicit recipient list.
    pub fn envelope(&self) -> Result<Envelope, ComposeError> {
        Envelope::new(
            Some(self.from.email.clone()),
            self.to.iter().map(|m| m.email.clone()).collect(),
        )
        .map_err(|e| ComposeError::Build(e.to_string()))
    }

    /// Build the lettre message (multipart/mixed).
    pub fn to_message(&self) -> Result<lettre::Message, ComposeError> {
        let mut body = MultiPart::mixed().singlepart(SinglePart::html(self.html_body.clone()));
        for attachment in &self.attachments {
            body = body.singlepart(attachment.to_single_part()?);
        }

        let mut builder = lettre::Message::builder()
            .from(self.from.clone())
            .subject(self.subject.clone());
        for mailbox in &self.to {
            builder = builder.to(mailbox.clone());
        }

        builder
            .multipart(body)
            .map_err(|e| ComposeError::Build(e.to_string()))
    }

    /// RFC 5322 bytes ready for the relay.
    pub fn formatted(&self) -> Result<Vec<u8>, ComposeError> {
        Ok(self.to_message()?.formatted())
    }
}

/// Inputs for one summary email.
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    /// Document display name.
    pub filename: &'a str,
    /// Document size in bytes.
    pub size_bytes: u64,
    /// Summary text.
    pub summary: &'a str,
    /// Optional usage block.
    pub usage: Option<&'a Usage>,
    /// Files to attach; missing ones are skipped.
    pub attachments: &'a [PathBuf],
}

/// Builds summary emails from a fixed sender, recipient list and subject template.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    from: Mailbox,
    to: Vec<Mailbox>,
    subject_template: String,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, ComposeError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| ComposeError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

impl MessageComposer {
    /// Validate addresses up front so composition cannot fail on them later.
    pub fn new(
        sender: &str,
        recipients: &[String],
        subject_template: impl Into<String>,
    ) -> Result<Self, ComposeError> {
        if recipients.is_empty() {
            return Err(ComposeError::NoRecipients);
        }

        let from = parse_mailbox(sender)?;
        let to = recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            from,
            to,
            subject_template: subject_template.into(),
        })
    }

    /// Recipient mailboxes.
    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    /// Subject with every `{filename}` replaced.
    pub fn subject_for(&self, filename: &str) -> String {
        self.subject_template.replace(FILENAME_PLACEHOLDER, filename)
    }

    /// Compose the summary email, loading attachments into memory.
    pub async fn compose(&self, request: &ComposeRequest<'_>) -> Result<ComposedMessage, ComposeError> {
        let html_body = render_summary_html(&ReportContext {
            filename: request.filename,
            size_bytes: request.size_bytes,
            processed_at: Local::now(),
            summary: request.summary,
            usage: request.usage,
        });

        let mut attachments = Vec::with_capacity(request.attachments.len());
        for path in request.attachments {
            if let Some(part) = load_attachment(path).await? {
                attachments.push(part);
            }
        }

        Ok(ComposedMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject_for(request.filename),
            html_body,
            attachments,
        })
    }
}

/// Read an attachment; `None` (with a warning) when the file does not exist.
async fn load_attachment(path: &Path) -> Result<Option<AttachmentPart>, ComposeError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Attachment not found, skipping");
            return Ok(None);
        }
        Err(source) => {
            return Err(ComposeError::Attachment {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(Some(AttachmentPart {
        content_type: AttachmentType::from_path(path),
        filename,
        bytes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use std::io::Write;

    fn composer(template: &str) -> MessageComposer {
        MessageComposer::new(
            "bot@example.com",
            &["a@example.com".to_string(), "b@example.com".to_string()],
            template,
        )
        .unwrap()
    }

    #[test]
    fn test_subject_template() {
        let composer = composer("Summary: {filename}");
        assert_eq!(composer.subject_for("report.pdf"), "Summary: report.pdf");
    }

    #[test]
    fn test_subject_template_without_placeholder() {
        assert_eq!(composer("Daily digest").subject_for("x.pdf"), "Daily digest");
    }

    #[test]
    fn test_rejects_invalid_recipient() {
        let err = MessageComposer::new("bot@example.com", &["not-an-address".to_string()], "")
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidAddress { .. }));
    }

    #[test]
    fn test_rejects_empty_recipients() {
        let err = MessageComposer::new("bot@example.com", &[], "").unwrap_err();
        assert!(matches!(err, ComposeError::NoRecipients));
    }

    #[test]
    fn test_attachment_type_by_extension() {
        assert_eq!(AttachmentType::from_path(Path::new("a.pdf")), AttachmentType::Pdf);
        assert_eq!(AttachmentType::from_path(Path::new("A.PDF")), AttachmentType::Pdf);
        assert_eq!(
            AttachmentType::from_path(Path::new("a.docx")),
            AttachmentType::OctetStream
        );
        assert_eq!(
            AttachmentType::from_path(Path::new("noext")),
            AttachmentType::OctetStream
        );
    }

    #[test]
    fn test_disposition_non_ascii_filename() {
        let value = content_disposition_value("报告.pdf");
        assert!(value.starts_with("attachment;"));
        assert!(value.contains("filename=\"报告.pdf\""));
        assert!(value.contains("filename*=UTF-8''%E6%8A%A5%E5%91%8A.pdf"));

        let fallback = value.split("filename*=").nth(1).unwrap();
        assert!(fallback.is_ascii());

        assert_eq!(decode_quoted_filename(&value).unwrap(), "报告.pdf");
        assert_eq!(decode_extended_filename(&value).unwrap(), "报告.pdf");
    }

    #[test]
    fn test_disposition_escapes_quotes_and_controls() {
        let value = content_disposition_value("we\"ird\r\nname.pdf");
        assert!(value.contains("filename=\"we\\\"ird__name.pdf\""));
        assert!(!unfold(&value).contains(['\r', '\n']));
        assert_eq!(
            decode_extended_filename(&value).unwrap(),
            "we\"ird\r\nname.pdf"
        );
    }

    #[test]
    fn test_disposition_header_roundtrip_through_parse() {
        let header = AttachmentDisposition::new("季度 报告.pdf");
        let value = content_disposition_value(header.filename());
        let parsed = <AttachmentDisposition as Header>::parse(&value).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_disposition_keeps_semicolons_in_quoted_name() {
        let value = content_disposition_value("a; filename*=evil.pdf");
        assert_eq!(decode_quoted_filename(&value).unwrap(), "a; filename*=evil.pdf");
        assert_eq!(decode_extended_filename(&value).unwrap(), "a; filename*=evil.pdf");
    }

    fn long_chinese_name() -> String {
        "季度财务报告".repeat(13) + ".pdf"
    }

    #[test]
    fn test_long_filename_split_into_sections() {
        let name = long_chinese_name();
        let value = content_disposition_value(&name);

        assert!(value.contains("filename*0*=UTF-8''%E5"));
        assert!(value.contains("filename*1*="));
        assert!(!value.contains("filename*="));
        for line in value.split("\r\n").filter(|l| l.contains("filename*")) {
            assert!(line.len() <= MAX_LINE_LEN, "line too long: {line}");
            assert!(line.is_ascii());
        }

        let decoded = decode_extended_filename(&value).unwrap();
        assert_eq!(decoded, name);
        assert!(decoded.ends_with(".pdf"));
        assert_eq!(decode_quoted_filename(&value).unwrap(), name);

        let parsed = <AttachmentDisposition as Header>::parse(&value).unwrap();
        assert_eq!(parsed.filename(), name);
    }

    #[test]
    fn test_sections_reassembled_out_of_order() {
        let value = "attachment; filename*1*=%8A.pdf; filename*0*=UTF-8''%E6%8A%A5%E5%91";
        assert_eq!(decode_extended_filename(value).unwrap(), "报告.pdf");
        assert!(decode_extended_filename("attachment; filename*1*=x.pdf").is_none());
    }

    #[test]
    fn test_oversized_name_drops_quoted_form() {
        let name = "报".repeat(400) + ".pdf";
        let value = content_disposition_value(&name);
        assert!(decode_quoted_filename(&value).is_none());
        assert_eq!(decode_extended_filename(&value).unwrap(), name);
        assert!(value.split("\r\n").all(|l| l.len() <= MAX_HARD_LINE_LEN));
    }

    #[tokio::test]
    async fn test_long_non_ascii_attachment_within_line_limits() {
        let name = long_chinese_name();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(&name);
        std::fs::write(&path, b"%PDF-1.4 long name").unwrap();
        let attachments = vec![path];

        let message = composer("Summary: {filename}")
            .compose(&ComposeRequest {
                filename: &name,
                size_bytes: 18,
                summary: "A summary.",
                usage: None,
                attachments: &attachments,
            })
            .await
            .unwrap();
        let raw = String::from_utf8(message.formatted().unwrap()).unwrap();

        let longest = raw.split("\r\n").map(str::len).max().unwrap();
        assert!(longest <= MAX_HARD_LINE_LEN, "longest line is {longest} bytes");
        for line in raw.split("\r\n").filter(|l| l.contains("filename*")) {
            assert!(line.len() <= MAX_LINE_LEN, "line too long: {line}");
        }

        let start = raw.find("Content-Disposition: ").unwrap() + "Content-Disposition: ".len();
        let mut header = String::new();
        for (i, line) in raw[start..].split("\r\n").enumerate() {
            if i > 0 && !line.starts_with([' ', '\t']) {
                break;
            }
            if i > 0 {
                header.push_str("\r\n");
            }
            header.push_str(line);
        }
        let parsed = <AttachmentDisposition as Header>::parse(&header).unwrap();
        assert_eq!(parsed.filename(), name);
    }

    #[tokio::test]
    async fn test_compose_skips_missing_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("报告.pdf");
        std::fs::File::create(&present)
            .unwrap()
            .write_all(b"%PDF-1.4 fake")
            .unwrap();
        let missing = dir.path().join("gone.pdf");
        let attachments = vec![missing, present];

        let message = composer("Summary: {filename}")
            .compose(&ComposeRequest {
                filename: "报告.pdf",
                size_bytes: 13,
                summary: "A summary.",
                usage: None,
                attachments: &attachments,
            })
            .await
            .unwrap();

        assert_eq!(message.subject, "Summary: 报告.pdf");
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, "报告.pdf");
        assert_eq!(message.attachments[0].content_type, AttachmentType::Pdf);
        assert_eq!(message.attachments[0].bytes, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn test_formatted_message_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4 payload").unwrap();
        let attachments = vec![path];

        let message = composer("Summary: {filename}")
            .compose(&ComposeRequest {
                filename: "report.pdf",
                size_bytes: 16,
                summary: "First\nSecond",
                usage: None,
                attachments: &attachments,
            })
            .await
            .unwrap();

        let raw = String::from_utf8(message.formatted().unwrap()).unwrap();
        assert!(raw.contains("From: bot@example.com"));
        assert!(raw.contains("To: a@example.com, b@example.com"));
        assert!(raw.contains("Subject: Summary: report.pdf"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("Content-Type: application/pdf"));
        assert!(raw.contains("Content-Transfer-Encoding: base64"));
        assert!(raw.contains("filename*=UTF-8''report.pdf"));
        assert!(raw.contains(&STANDARD.encode(b"%PDF-1.4 payload")));

        let envelope = message.envelope().unwrap();
        assert_eq!(envelope.to().len(), 2);
    }
}
