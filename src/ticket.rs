//! Ticket composer — decoded message + resolved project → issue draft.
//!
//! Classification is deliberately uniform: every imported issue is a
//! "High"/"New"/"Bug"/"Minor" assigned to the configured default user.
//! Only title, body and sender context come from the message itself.

use serde::Serialize;

use crate::error::TaigaError;
use crate::message::DecodedMessage;
use crate::taiga::{Project, TaigaClient};

const DEFAULT_PRIORITY: &str = "High";
const DEFAULT_STATUS: &str = "New";
const DEFAULT_TYPE: &str = "Bug";
const DEFAULT_SEVERITY: &str = "Minor";

/// Issue creation parameters, serialized as the `POST /issues` payload.
#[derive(Debug, Clone, Serialize)]
pub struct IssueDraft {
    pub project: u64,
    pub subject: String,
    pub description: String,
    pub priority: u64,
    pub status: u64,
    #[serde(rename = "type")]
    pub issue_type: u64,
    pub severity: u64,
    pub assigned_to: u64,
}

/// The issue description: a fixed sender/date header block followed by the
/// plain-text body.
pub fn compose_body(msg: &DecodedMessage) -> String {
    format!("From: {}\nDate: {}\n\n{}", msg.from, msg.date, msg.text)
}

/// Build the issue draft, resolving classification ids by name.
///
/// A missing classification entry is a project misconfiguration and is
/// fatal for the run, not a skippable per-message condition.
pub async fn compose(
    api: &TaigaClient,
    project: &Project,
    msg: &DecodedMessage,
    assign_to: u64,
) -> Result<IssueDraft, TaigaError> {
    let priority = api.priority_by_name(project.id, DEFAULT_PRIORITY).await?;
    let status = api.status_by_name(project.id, DEFAULT_STATUS).await?;
    let issue_type = api.issue_type_by_name(project.id, DEFAULT_TYPE).await?;
    let severity = api.severity_by_name(project.id, DEFAULT_SEVERITY).await?;

    Ok(IssueDraft {
        project: project.id,
        subject: msg.subject.clone(),
        description: compose_body(msg),
        priority,
        status,
        issue_type,
        severity,
        assigned_to: assign_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded() -> DecodedMessage {
        DecodedMessage {
            e_id: "3".into(),
            to: "Support Desk <support@example.com>".into(),
            from: "Alice <alice@example.com>".into(),
            subject: "Cannot log in".into(),
            date: "2024-01-01T10:00:00Z".into(),
            message_id: "abc@example.com".into(),
            text: "Please help".into(),
            html: String::new(),
            attachments: Vec::new(),
            raw: Vec::new(),
        }
    }

    #[test]
    fn body_starts_with_header_block() {
        let body = compose_body(&decoded());
        assert!(body.starts_with(
            "From: Alice <alice@example.com>\nDate: 2024-01-01T10:00:00Z\n\nPlease help"
        ));
    }

    #[test]
    fn body_keeps_empty_text() {
        let mut msg = decoded();
        msg.text.clear();
        assert_eq!(
            compose_body(&msg),
            "From: Alice <alice@example.com>\nDate: 2024-01-01T10:00:00Z\n\n"
        );
    }

    #[test]
    fn draft_serializes_type_field_under_api_name() {
        let draft = IssueDraft {
            project: 42,
            subject: "Cannot log in".into(),
            description: "body".into(),
            priority: 1,
            status: 2,
            issue_type: 3,
            severity: 4,
            assigned_to: 9,
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["type"], 3);
        assert!(json.get("issue_type").is_none());
        assert_eq!(json["assigned_to"], 9);
    }
}
