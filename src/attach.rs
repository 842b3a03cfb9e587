//! Attachment committer — stages the original message and its attachments
//! in a message-scoped scratch directory, uploads them to the issue, and
//! guarantees the directory is removed on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CommitError;
use crate::message::DecodedMessage;
use crate::taiga::{Issue, Project, TaigaClient};

const ORIGINAL_DESCRIPTION: &str = "The original mail message";
const ATTACHMENT_DESCRIPTION: &str = "Attachment";

/// A temporary directory keyed by message id, removed on drop.
///
/// Drop is the cleanup guarantee: upload failures and early returns all
/// unwind through it, so no scratch directory outlives the commit step.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(base: &Path, message_id: &str) -> io::Result<Self> {
        let path = base.join(sanitize_component(message_id));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one file into the directory and return its path.
    pub fn stage(&self, filename: &str, content: &[u8]) -> io::Result<PathBuf> {
        let path = self.path.join(sanitize_component(filename));
        fs::write(&path, content)?;
        Ok(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

/// Persist the original message and every attachment to the issue.
///
/// The issue itself is not rolled back on failure: a rejected upload
/// leaves it in place with whatever attachments made it, and the caller
/// decides whether the message is retried.
pub async fn commit(
    api: &TaigaClient,
    project: &Project,
    issue: &Issue,
    msg: &DecodedMessage,
    base_dir: &Path,
) -> Result<(), CommitError> {
    let scratch = ScratchDir::create(base_dir, &msg.message_id)?;

    upload_staged(
        api,
        project,
        issue,
        &scratch,
        "message.eml",
        &msg.raw,
        ORIGINAL_DESCRIPTION,
    )
    .await?;

    for att in &msg.attachments {
        upload_staged(
            api,
            project,
            issue,
            &scratch,
            &att.filename,
            att.content.as_bytes(),
            ATTACHMENT_DESCRIPTION,
        )
        .await?;
    }

    Ok(())
}

async fn upload_staged(
    api: &TaigaClient,
    project: &Project,
    issue: &Issue,
    scratch: &ScratchDir,
    filename: &str,
    content: &[u8],
    description: &str,
) -> Result<(), CommitError> {
    let staged = scratch.stage(filename, content)?;
    debug!(file = %staged.display(), issue = issue.id, "Staged file for upload");

    let bytes = fs::read(&staged)?;
    api.attach_file(
        project.id,
        issue.id,
        &sanitize_component(filename),
        bytes,
        description,
    )
    .await?;
    Ok(())
}

/// Reduce a message id or attachment filename to a single safe path
/// component: strip any directory part, replace separators and angle
/// brackets, never return an empty name.
fn sanitize_component(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .replace(['<', '>', ':', '"', '|', '?', '*'], "_");
    let trimmed = base.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dir_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(base.path(), "abc@example.com").unwrap();
            scratch.stage("a.txt", b"hello").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn scratch_dir_removed_on_early_error_return() {
        fn fallible(base: &Path) -> Result<(), CommitError> {
            let scratch = ScratchDir::create(base, "id-1")?;
            scratch.stage("partial.bin", &[1, 2, 3])?;
            Err(CommitError::Io(io::Error::other("upload blew up")))
        }

        let base = tempfile::tempdir().unwrap();
        assert!(fallible(base.path()).is_err());
        assert!(!base.path().join("id-1").exists());
    }

    #[test]
    fn stage_writes_text_and_binary_contents() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(base.path(), "id-2").unwrap();

        let text = scratch.stage("note.txt", "héllo".as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(&text).unwrap(), "héllo");

        let bin = scratch.stage("data.bin", &[0x00, 0xff]).unwrap();
        assert_eq!(fs::read(&bin).unwrap(), vec![0x00, 0xff]);
    }

    #[test]
    fn sanitize_strips_directories_and_brackets() {
        assert_eq!(sanitize_component("<abc@example.com>"), "_abc@example.com_");
        assert_eq!(sanitize_component("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_component("reports\\q1.pdf"), "q1.pdf");
        assert_eq!(sanitize_component("plain.txt"), "plain.txt");
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_component(""), "unnamed");
        assert_eq!(sanitize_component("..."), "unnamed");
        assert_eq!(sanitize_component("a/"), "unnamed");
    }

    #[test]
    fn colliding_message_ids_do_not_exist_by_construction() {
        // message_id is either the unique header value or a fresh UUID, so
        // two live scratch dirs never share a name. Creating twice with the
        // same id is still safe (create_dir_all).
        let base = tempfile::tempdir().unwrap();
        let first = ScratchDir::create(base.path(), "same-id").unwrap();
        drop(first);
        let second = ScratchDir::create(base.path(), "same-id").unwrap();
        assert!(second.path().exists());
    }
}
