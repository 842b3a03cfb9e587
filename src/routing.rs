//! Recipient-to-project routing.
//!
//! The local part of the recipient address names the target project in
//! camel case; `MyProject <myproject@helpdesk.example>` lands in the
//! project with slug `my-project`. When the derived slug has no direct
//! match, every project name is slugified by the same rule and compared —
//! a fallback, not the primary path.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::TaigaError;
use crate::taiga::{Project, TaigaClient};

static UPPER_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new("[A-Z]+").expect("valid regex"));

/// Pull the bare address out of a recipient header value.
///
/// `Support Desk <support@example.com>` → `support@example.com`; a value
/// without angle brackets is used as-is.
pub fn extract_address(recipient: &str) -> &str {
    if let Some(start) = recipient.find('<')
        && let Some(len) = recipient[start + 1..].find('>')
    {
        return &recipient[start + 1..start + 1 + len];
    }
    recipient.trim()
}

/// Camel-case to kebab-case: a hyphen before every non-leading run of
/// uppercase letters, then lowercase. `MyProjectName` → `my-project-name`.
/// Idempotent over its own output.
pub fn camel_case_to_slug(name: &str) -> String {
    let hyphenated = UPPER_RUN.replace_all(name, "-${0}");
    let exempt_leading_run = name.starts_with(|c: char| c.is_ascii_uppercase());
    let slug = if exempt_leading_run {
        hyphenated.strip_prefix('-').unwrap_or(&hyphenated)
    } else {
        &hyphenated
    };
    slug.to_lowercase()
}

/// Derive the project slug for a recipient header value: bare address,
/// local part, slugified.
pub fn project_slug_for(recipient: &str) -> String {
    let address = extract_address(recipient);
    let local = address.split('@').next().unwrap_or(address);
    camel_case_to_slug(local)
}

/// Resolve a slug to a project: direct lookup first, then a scan over all
/// project names slugified by the same rule. A miss on both is
/// `TaigaError::NotFound`; transport failures propagate unchanged.
pub async fn resolve_project(api: &TaigaClient, slug: &str) -> Result<Project, TaigaError> {
    match api.get_project_by_slug(slug).await {
        Ok(project) => return Ok(project),
        Err(TaigaError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    debug!(slug, "No direct slug match, scanning project names");
    for project in api.list_projects().await? {
        if camel_case_to_slug(&project.name) == slug {
            return api.get_project_by_slug(&project.slug).await;
        }
    }

    Err(TaigaError::NotFound {
        entity: "project".to_string(),
        key: slug.to_string(),
    })
}
