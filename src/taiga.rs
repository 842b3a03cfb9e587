//! Async client for the Taiga REST API (v1).
//!
//! Covers exactly what the importer needs: normal-login auth, project
//! lookup by slug, project listing, per-project classification lookups by
//! name, issue creation, and multipart attachment upload.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::TaigaError;
use crate::ticket::IssueDraft;

/// A Taiga project. Looked up, never created, by this importer.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// A created issue. Fields are write-once; there is no update path.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub project: u64,
}

/// Classification entry (priority, status, type, severity) as returned by
/// the per-project listing endpoints.
#[derive(Debug, Clone, Deserialize)]
struct NamedRef {
    id: u64,
    name: String,
}

/// Authenticated API session, process-scoped, created once per run.
pub struct TaigaClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    auth_token: String,
}

impl TaigaClient {
    /// Log in with username/password ("normal" auth) and keep the bearer
    /// token for the rest of the run.
    pub async fn auth(host: &str, username: &str, password: &str) -> Result<Self, TaigaError> {
        let http = reqwest::Client::new();
        let resp = http
            .post(format!("{host}/api/v1/auth"))
            .json(&serde_json::json!({
                "type": "normal",
                "username": username,
                "password": password,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TaigaError::AuthFailed {
                username: username.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let auth: AuthResponse = resp.json().await?;
        Ok(Self {
            http,
            base: host.trim_end_matches('/').to_string(),
            token: auth.auth_token,
        })
    }

    pub async fn get_project_by_slug(&self, slug: &str) -> Result<Project, TaigaError> {
        self.get_json(
            &format!("{}/api/v1/projects/by_slug?slug={slug}", self.base),
            "project",
            slug,
        )
        .await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, TaigaError> {
        self.get_json(&format!("{}/api/v1/projects", self.base), "projects", "all")
            .await
    }

    pub async fn priority_by_name(&self, project: u64, name: &str) -> Result<u64, TaigaError> {
        self.classification_id("priorities", "priority", project, name)
            .await
    }

    pub async fn status_by_name(&self, project: u64, name: &str) -> Result<u64, TaigaError> {
        self.classification_id("issue-statuses", "issue status", project, name)
            .await
    }

    pub async fn issue_type_by_name(&self, project: u64, name: &str) -> Result<u64, TaigaError> {
        self.classification_id("issue-types", "issue type", project, name)
            .await
    }

    pub async fn severity_by_name(&self, project: u64, name: &str) -> Result<u64, TaigaError> {
        self.classification_id("severities", "severity", project, name)
            .await
    }

    pub async fn create_issue(&self, draft: &IssueDraft) -> Result<Issue, TaigaError> {
        let resp = self
            .http
            .post(format!("{}/api/v1/issues", self.base))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?;
        Self::rejected_if_error(resp)
            .await?
            .json()
            .await
            .map_err(TaigaError::from)
    }

    /// Upload one staged file as an issue attachment.
    pub async fn attach_file(
        &self,
        project: u64,
        issue: u64,
        filename: &str,
        content: Vec<u8>,
        description: &str,
    ) -> Result<(), TaigaError> {
        let form = reqwest::multipart::Form::new()
            .text("object_id", issue.to_string())
            .text("project", project.to_string())
            .text("description", description.to_string())
            .part(
                "attached_file",
                reqwest::multipart::Part::bytes(content).file_name(filename.to_string()),
            );

        let resp = self
            .http
            .post(format!("{}/api/v1/issues/attachments", self.base))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        Self::rejected_if_error(resp).await?;
        Ok(())
    }

    /// GET a JSON payload; 404 maps to `NotFound`, other failure statuses
    /// to `Rejected` so callers can tell a miss from an outage.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        entity: &str,
        key: &str,
    ) -> Result<T, TaigaError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            // Taiga paginates list endpoints by default.
            .header("x-disable-pagination", "True")
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TaigaError::NotFound {
                entity: entity.to_string(),
                key: key.to_string(),
            });
        }
        Self::rejected_if_error(resp)
            .await?
            .json()
            .await
            .map_err(TaigaError::from)
    }

    async fn classification_id(
        &self,
        endpoint: &str,
        entity: &str,
        project: u64,
        name: &str,
    ) -> Result<u64, TaigaError> {
        let entries: Vec<NamedRef> = self
            .get_json(
                &format!("{}/api/v1/{endpoint}?project={project}", self.base),
                entity,
                name,
            )
            .await?;
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.id)
            .ok_or_else(|| TaigaError::NotFound {
                entity: entity.to_string(),
                key: name.to_string(),
            })
    }

    async fn rejected_if_error(resp: reqwest::Response) -> Result<reqwest::Response, TaigaError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(TaigaError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_deserializes_from_api_payload() {
        let json = r#"{"id": 42, "name": "MyProject", "slug": "my-project", "description": "x"}"#;
        let p: Project = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, 42);
        assert_eq!(p.name, "MyProject");
        assert_eq!(p.slug, "my-project");
    }

    #[test]
    fn classification_list_deserializes() {
        let json = r#"[{"id": 1, "name": "Low", "order": 1}, {"id": 2, "name": "High", "order": 3}]"#;
        let entries: Vec<NamedRef> = serde_json::from_str(json).unwrap();
        let high = entries.iter().find(|e| e.name == "High").unwrap();
        assert_eq!(high.id, 2);
    }

    #[test]
    fn issue_deserializes_from_create_response() {
        let json = r#"{"id": 7, "project": 42, "subject": "Cannot log in", "ref": 12}"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.id, 7);
        assert_eq!(issue.project, 42);
    }
}
