//! Importer configuration, built from environment variables.

use crate::error::ConfigError;

/// Runtime configuration. One mailbox, one Taiga instance, one default
/// assignee — multi-tenant setups are out of scope.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbose logging toggle (`DEBUG`).
    pub debug: bool,
    /// IMAP server host; implicit TLS on port 993.
    pub imap_host: String,
    pub imap_user: String,
    pub imap_pwd: String,
    /// Taiga base URL, e.g. `https://tree.taiga.io`.
    pub taiga_host: String,
    pub taiga_user: String,
    pub taiga_pwd: String,
    /// Taiga user id every imported issue is assigned to.
    pub assign_to: u64,
}

impl Config {
    /// Build config from environment variables (a `.env` file next to the
    /// binary is honored — `dotenvy` is loaded in `main` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        let debug = std::env::var("DEBUG")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let assign_to_raw = required("TAIGA_ASSIGN_TO")?;
        let assign_to: u64 =
            assign_to_raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "TAIGA_ASSIGN_TO".into(),
                    message: format!("expected a numeric Taiga user id, got {assign_to_raw:?}"),
                })?;

        Ok(Self {
            debug,
            imap_host: required("IMAP_HOST")?,
            imap_user: required("IMAP_USER")?,
            imap_pwd: required("IMAP_PWD")?,
            taiga_host: required("TAIGA_HOST")?.trim_end_matches('/').to_string(),
            taiga_user: required("TAIGA_USER")?,
            taiga_pwd: required("TAIGA_PWD")?,
            assign_to,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_reports_missing_key() {
        // SAFETY: no other test reads this variable concurrently.
        unsafe { std::env::remove_var("MAIL2TAIGA_TEST_MISSING") };
        let err = required("MAIL2TAIGA_TEST_MISSING").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "MAIL2TAIGA_TEST_MISSING"));
    }
}
