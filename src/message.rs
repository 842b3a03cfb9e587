//! MIME decoder — turns a raw mailbox message into a `DecodedMessage`.
//!
//! Header decoding (RFC 2047 encoded words, charset defaults) is delegated
//! to `mail-parser`, which is lenient by construction: an undecodable part
//! never aborts the message, the affected field just keeps its default.

use mail_parser::{Address, MessageParser, MimeHeaders, PartType};
use uuid::Uuid;

use crate::error::DecodeError;
use crate::mailbox::RawMessage;

/// Attachment payload, preserving whether the part was textual so the
/// committer can stage it in text or binary mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    Text(String),
    Binary(Vec<u8>),
}

impl AttachmentContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttachmentContent::Text(s) => s.as_bytes(),
            AttachmentContent::Binary(b) => b,
        }
    }
}

/// One file attachment, owned by its `DecodedMessage`.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: AttachmentContent,
    pub content_type: String,
}

/// Fully decoded message, immutable after decoding.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// Mailbox sequence id, used to mark the message seen afterwards.
    pub e_id: String,
    pub to: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    /// Never empty: synthesized as a UUID when the header is absent, so
    /// scratch-directory names downstream never collide.
    pub message_id: String,
    pub text: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
    /// The untouched RFC 822 bytes, attached later as `message.eml`.
    pub raw: Vec<u8>,
}

/// Decode one raw message.
pub fn decode(raw: &RawMessage) -> Result<DecodedMessage, DecodeError> {
    let parsed = MessageParser::default()
        .parse(&raw.body)
        .ok_or(DecodeError::Unparseable)?;

    let message_id = parsed
        .message_id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut decoded = DecodedMessage {
        e_id: raw.e_id.clone(),
        to: render_address(parsed.to()),
        from: render_address(parsed.from()),
        subject: parsed.subject().unwrap_or_default().to_string(),
        date: parsed.date().map(|d| d.to_rfc3339()).unwrap_or_default(),
        message_id,
        text: String::new(),
        html: String::new(),
        attachments: Vec::new(),
        raw: raw.body.clone(),
    };

    if parsed.parts.len() > 1 {
        // Multipart: body content types take precedence, the filename
        // check is the fallback. A text/plain part not marked as an
        // attachment is the plain body even when it carries a name
        // parameter; text/html is the HTML body unconditionally. For
        // bodies the last part of each kind wins.
        for part in &parsed.parts {
            if matches!(part.body, PartType::Multipart(_)) {
                continue;
            }
            let mime = mime_type(part);
            if mime.eq_ignore_ascii_case("text/plain") && !is_attachment_disposition(part) {
                decoded.text = text_of(part);
            } else if mime.eq_ignore_ascii_case("text/html") {
                decoded.html = text_of(part);
            } else if let Some(filename) = part.attachment_name() {
                let content = match &part.body {
                    PartType::Text(t) | PartType::Html(t) => {
                        AttachmentContent::Text(t.to_string())
                    }
                    _ => AttachmentContent::Binary(part.contents().to_vec()),
                };
                decoded.attachments.push(Attachment {
                    filename: filename.to_string(),
                    content,
                    content_type: mime,
                });
            }
        }
    } else if let Some(part) = parsed.parts.first() {
        // Flat message: body by content type only, no attachment scan.
        match &part.body {
            PartType::Text(t) => decoded.text = t.to_string(),
            PartType::Html(h) => decoded.html = h.to_string(),
            _ => {}
        }
    }

    Ok(decoded)
}

/// Render an address header as `Name <addr>`, or the bare address when no
/// display name is present.
fn render_address(addr: Option<&Address>) -> String {
    let Some(first) = addr.and_then(|a| a.first()) else {
        return String::new();
    };
    match (first.name(), first.address()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (None, Some(email)) => email.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

/// Effective media type of a part; a part without a Content-Type header
/// defaults to text/plain, as MIME prescribes.
fn mime_type(part: &mail_parser::MessagePart) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
}

fn is_attachment_disposition(part: &mail_parser::MessagePart) -> bool {
    part.content_disposition()
        .is_some_and(|cd| cd.ctype().eq_ignore_ascii_case("attachment"))
}

fn text_of(part: &mail_parser::MessagePart) -> String {
    match &part.body {
        PartType::Text(t) | PartType::Html(t) => t.to_string(),
        _ => String::from_utf8_lossy(part.contents()).to_string(),
    }
}
