//! Mailbox poller — one sequential pass over the unseen messages.
//!
//! Fetches use peek semantics, so any per-message failure leaves the
//! message unseen and eligible for the next run. One bad message never
//! aborts the batch; only infrastructure failures (transport errors,
//! misconfigured projects) do.

use std::path::Path;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, MailboxError, Result, TaigaError};
use crate::mailbox::{ImapSession, RawMessage};
use crate::message::{self, DecodedMessage};
use crate::taiga::TaigaClient;
use crate::{attach, routing, ticket};

/// Per-message result: either an issue was fully created (mark the
/// message seen) or the message was skipped and stays unseen.
enum Outcome {
    Created,
    Skipped,
}

/// Run one fetch-decode-dispatch-mark pass and hand the session back.
pub async fn run_once(
    config: &Config,
    api: &TaigaClient,
    session: ImapSession,
    base_dir: &Path,
) -> Result<ImapSession> {
    let (mut session, fetched) = with_session(session, fetch_unseen).await?;

    if fetched.is_empty() {
        info!("No unseen messages");
        return Ok(session);
    }
    info!("Fetched {} unseen message(s)", fetched.len());

    for raw in fetched {
        let msg = match message::decode(&raw) {
            Ok(msg) => msg,
            Err(e) => {
                // Skipped, stays unseen; the rest of the batch continues.
                error!(e_id = %raw.e_id, error = %e, "Failed to decode message, skipping");
                continue;
            }
        };

        match process_message(config, api, &msg, base_dir).await? {
            Outcome::Created => {
                let e_id = msg.e_id.clone();
                let (s, ()) = with_session(session, move |imap| imap.mark_seen(&e_id)).await?;
                session = s;
                info!(e_id = %msg.e_id, subject = %msg.subject, "Message imported and marked seen");
            }
            Outcome::Skipped => {}
        }
    }

    Ok(session)
}

/// Search for unseen messages and fetch each body without setting \Seen.
fn fetch_unseen(imap: &mut ImapSession) -> std::result::Result<Vec<RawMessage>, MailboxError> {
    let ids = imap.search_unseen()?;
    let mut fetched = Vec::with_capacity(ids.len());
    for e_id in ids {
        fetched.push(imap.fetch_peek(&e_id)?);
    }
    Ok(fetched)
}

/// Route, compose, create and commit one message.
async fn process_message(
    config: &Config,
    api: &TaigaClient,
    msg: &DecodedMessage,
    base_dir: &Path,
) -> Result<Outcome> {
    let slug = routing::project_slug_for(&msg.to);

    let project = match routing::resolve_project(api, &slug).await {
        Ok(project) => project,
        Err(TaigaError::NotFound { .. }) => {
            warn!(slug = %slug, to = %msg.to, "Cannot find project for recipient, skipping");
            return Ok(Outcome::Skipped);
        }
        Err(e) => return Err(e.into()),
    };

    // Classification lookups are fatal on a miss (misconfigured project).
    let draft = ticket::compose(api, &project, msg, config.assign_to).await?;
    let issue = api.create_issue(&draft).await?;
    info!(issue = issue.id, project = %project.slug, subject = %msg.subject, "Issue created");

    match attach::commit(api, &project, &issue, msg, base_dir).await {
        Ok(()) => Ok(Outcome::Created),
        Err(e) if e.is_rejection() => {
            // The issue already exists; the message stays unseen so a
            // later run can retry (possibly creating a duplicate issue).
            error!(
                from = %msg.from,
                to = %msg.to,
                issue = issue.id,
                error = %e,
                "Attachment upload rejected, message left unseen"
            );
            Ok(Outcome::Skipped)
        }
        Err(e) => Err(e.into()),
    }
}

/// Run a blocking IMAP operation on its own thread and return the session
/// to the async caller afterwards.
async fn with_session<T, F>(session: ImapSession, op: F) -> Result<(ImapSession, T)>
where
    F: FnOnce(&mut ImapSession) -> std::result::Result<T, MailboxError> + Send + 'static,
    T: Send + 'static,
{
    let (session, result) = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let result = op(&mut session);
        (session, result)
    })
    .await?;
    Ok((session, result.map_err(Error::from)?))
}
