//! HTML body for summary emails.
//!
//! Rendering is a pure function of [`ReportContext`], so the markup can be
//! tested without a relay or a backend.

use chrono::{DateTime, Local};

use crate::llm::Usage;

/// Everything the summary email body shows.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    /// Document display name.
    pub filename: &'a str,
    /// Document size in bytes.
    pub size_bytes: u64,
    /// When the document was processed.
    pub processed_at: DateTime<Local>,
    /// Summary text as returned by the backend.
    pub summary: &'a str,
    /// Usage block, shown when present.
    pub usage: Option<&'a Usage>,
}

/// Format a byte count as KB below 1024 KB, MB otherwise, one decimal.
pub fn human_size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{:.1} MB", kb / 1024.0)
    }
}

/// Group digits in threes: `12345` becomes `"12,345"`.
pub fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Escape the summary and turn line breaks into `<br>`.
fn summary_markup(summary: &str) -> String {
    html_escape::encode_text(summary)
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}

fn usage_markup(usage: &Usage) -> String {
    format!(
        r#"
                <ul>
                    <li><strong>Model:</strong> {model}</li>
                    <li><strong>Tokens:</strong> {total} (prompt: {prompt}, completion: {completion})</li>
                </ul>"#,
        model = html_escape::encode_text(&usage.model),
        total = with_thousands(usage.total_tokens),
        prompt = with_thousands(usage.prompt_tokens),
        completion = with_thousands(usage.completion_tokens),
    )
}

/// Render the HTML email body.
pub fn render_summary_html(ctx: &ReportContext<'_>) -> String {
    let usage_html = ctx.usage.map(usage_markup).unwrap_or_default();

    format!(
        r#"<html>
<head>
    <meta charset="utf-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .header {{ background-color: #4CAF50; color: white; padding: 20px; text-align: center; }}
        .content {{ padding: 20px; background-color: #f9f9f9; }}
        .summary {{ background-color: white; padding: 15px; border-left: 4px solid #4CAF50; margin: 20px 0; }}
        .info {{ color: #666; font-size: 14px; margin-top: 20px; }}
        .footer {{ text-align: center; padding: 10px; color: #999; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>PDF Document Summary</h1>
    </div>
    <div class="content">
        <h2>Document</h2>
        <ul>
            <li><strong>File name:</strong> {filename}</li>
            <li><strong>File size:</strong> {size}</li>
            <li><strong>Processed at:</strong> {processed_at}</li>
        </ul>

        <h2>Summary</h2>
        <div class="summary">
{summary}
        </div>

        <div class="info">
            <p>This summary was generated automatically.</p>{usage_html}
            <p>The original PDF is attached.</p>
        </div>
    </div>
    <div class="footer">
        <p>PDF summary mailer</p>
    </div>
</body>
</html>
"#,
        filename = html_escape::encode_text(ctx.filename),
        size = human_size(ctx.size_bytes),
        processed_at = ctx.processed_at.format("%Y-%m-%d %H:%M:%S"),
        summary = summary_markup(ctx.summary),
    )
}
