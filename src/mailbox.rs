//! Blocking IMAP-over-TLS session.
//!
//! A minimal hand-rolled client: LOGIN, SELECT, SEARCH UNSEEN,
//! FETCH BODY.PEEK[], STORE \Seen, LOGOUT. Fetches use peek semantics so
//! a message that fails mid-pipeline stays unseen and is retried on the
//! next run. All methods block — callers run them via `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConnection, StreamOwned};
use tracing::debug;

use crate::error::MailboxError;

const IMAP_PORT: u16 = 993;

/// A message as handed over by the mailbox: sequence id plus the full
/// RFC 822 blob. Owned by the mailbox until explicitly marked seen.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub e_id: String,
    pub body: Vec<u8>,
}

/// One authenticated IMAP session with INBOX selected.
///
/// Explicit lifecycle: `connect` → use → `logout`. No ambient globals.
pub struct ImapSession {
    stream: StreamOwned<ClientConnection, TcpStream>,
    tag: u32,
}

impl ImapSession {
    /// Connect, authenticate and select INBOX.
    pub fn connect(host: &str, user: &str, pwd: &str) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((host, IMAP_PORT))?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(host.to_string())?;
        let conn = ClientConnection::new(tls_config, server_name)?;

        let mut session = Self {
            stream: StreamOwned::new(conn, tcp),
            tag: 0,
        };

        let greeting = session.read_line()?;
        debug!(greeting = %greeting.trim_end(), "IMAP connected");

        session.command(&format!("LOGIN {} {}", quoted(user), quoted(pwd)), "LOGIN")?;
        session.command("SELECT \"INBOX\"", "SELECT")?;
        Ok(session)
    }

    /// Sequence ids of all messages currently flagged unseen.
    pub fn search_unseen(&mut self) -> Result<Vec<String>, MailboxError> {
        let (lines, _) = self.command("SEARCH UNSEEN", "SEARCH")?;
        let mut ids = Vec::new();
        for line in &lines {
            if let Some(rest) = line.strip_prefix("* SEARCH") {
                ids.extend(rest.split_whitespace().map(str::to_string));
            }
        }
        Ok(ids)
    }

    /// Fetch one message body without touching its seen flag.
    pub fn fetch_peek(&mut self, e_id: &str) -> Result<RawMessage, MailboxError> {
        let cmd = format!("FETCH {e_id} (BODY.PEEK[])");
        let (_, mut literals) = self.command(&cmd, "FETCH")?;
        let body = literals
            .pop()
            .ok_or_else(|| MailboxError::UnexpectedResponse {
                command: "FETCH".into(),
                line: "no message literal in response".into(),
            })?;
        Ok(RawMessage {
            e_id: e_id.to_string(),
            body,
        })
    }

    /// Set the \Seen flag — the importer's only progress marker.
    pub fn mark_seen(&mut self, e_id: &str) -> Result<(), MailboxError> {
        self.command(&format!("STORE {e_id} +FLAGS (\\Seen)"), "STORE")?;
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), MailboxError> {
        self.command("LOGOUT", "LOGOUT")?;
        Ok(())
    }

    /// Send one command and read until the tagged completion line.
    ///
    /// Returns the untagged response lines and any literals (`{n}`-sized
    /// byte blocks, e.g. the message body of a FETCH).
    fn command(
        &mut self,
        cmd: &str,
        name: &str,
    ) -> Result<(Vec<String>, Vec<Vec<u8>>), MailboxError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut lines = Vec::new();
        let mut literals = Vec::new();
        loop {
            let line = self.read_line()?;

            if let Some(size) = literal_size(&line) {
                let mut buf = vec![0u8; size];
                self.stream.read_exact(&mut buf)?;
                literals.push(buf);
            }

            let tagged = line.starts_with(&tag);
            lines.push(line);
            if tagged {
                break;
            }
        }

        let status = lines.last().map(String::as_str).unwrap_or_default();
        if status[tag.len()..].trim_start().starts_with("OK") {
            Ok((lines, literals))
        } else {
            Err(MailboxError::CommandFailed {
                command: name.to_string(),
                response: status.trim_end().to_string(),
            })
        }
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(MailboxError::ConnectionClosed),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Render a credential as an IMAP quoted string, escaping the two
/// characters the grammar reserves (`"` and `\`).
fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Parse the size of an IMAP literal announced at the end of a line,
/// e.g. `* 1 FETCH (BODY[] {4207}`.
fn literal_size(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let inner = trimmed.strip_suffix('}')?;
    let start = inner.rfind('{')?;
    inner[start + 1..].parse().ok()
}
