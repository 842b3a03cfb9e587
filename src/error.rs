//! Error types for mail2taiga.

/// Top-level error type for the importer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Taiga error: {0}")]
    Taiga(#[from] TaigaError),

    #[error("Attachment commit error: {0}")]
    Commit(#[from] CommitError),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// IMAP session errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Invalid IMAP host name: {0}")]
    HostName(#[from] rustls_pki_types::InvalidDnsNameError),

    #[error("IMAP connection closed by server")]
    ConnectionClosed,

    #[error("IMAP {command} failed: {response}")]
    CommandFailed { command: String, response: String },

    #[error("Unexpected response to {command}: {line}")]
    UnexpectedResponse { command: String, line: String },
}

/// Per-message decode errors. Recovered at the poller level: the message
/// is logged and skipped, and the rest of the batch keeps going.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Message could not be parsed as MIME")]
    Unparseable,
}

/// Taiga API errors. `NotFound` is kept distinct from transport failures
/// so callers can fall back on a miss without masking outages.
#[derive(Debug, thiserror::Error)]
pub enum TaigaError {
    #[error("Authentication failed for {username}: HTTP {status}")]
    AuthFailed { username: String, status: u16 },

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("Request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Attachment commit errors.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("IO error staging attachments: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Upload(#[from] TaigaError),
}

impl CommitError {
    /// True when the failure is a service-side rejection of an upload.
    /// Recoverable at the message level: the issue already exists and the
    /// message stays unseen for a later run.
    pub fn is_rejection(&self) -> bool {
        matches!(self, CommitError::Upload(TaigaError::Rejected { .. }))
    }
}

/// Result type alias for the importer.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    // The poller skips a message (leaving it unseen, issue kept) only for
    // service-side upload rejections; every other commit failure aborts
    // the run.

    #[test]
    fn rejected_upload_is_recoverable() {
        let err = CommitError::Upload(TaigaError::Rejected {
            status: 413,
            body: "attachment too large".into(),
        });
        assert!(err.is_rejection());
    }

    #[test]
    fn staging_io_failure_is_not_a_rejection() {
        let err = CommitError::Io(std::io::Error::other("disk full"));
        assert!(!err.is_rejection());
    }

    #[test]
    fn non_rejection_upload_errors_are_fatal() {
        // A transport-level reqwest::Error cannot be built without a
        // request; the other TaigaError variants exercise the same
        // non-Rejected match arm.
        let not_found = CommitError::Upload(TaigaError::NotFound {
            entity: "issue".into(),
            key: "7".into(),
        });
        assert!(!not_found.is_rejection());

        let auth = CommitError::Upload(TaigaError::AuthFailed {
            username: "importer".into(),
            status: 401,
        });
        assert!(!auth.is_rejection());
    }
}
