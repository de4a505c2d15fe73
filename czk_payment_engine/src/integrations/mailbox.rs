//! Sources of bank notifications.
//!
//! A [`Mailbox`] hands out the messages that have not been consumed yet and remembers which ones have. The "seen"
//! marker lives in the mailbox, never in the engine. Several pollers may fetch the same unseen message, but marking it
//! as seen succeeds for exactly one of them. The others get [`MailboxError::MessageNotFound`] and must drop it.
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw notification as delivered by the bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMessage {
    /// Identifies the message within its mailbox.
    #[serde(default)]
    pub id: String,
    /// The `From`/`Sender` header.
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text_body: String,
    #[serde(default)]
    pub html_body: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl BankMessage {
    pub fn new<S: Into<String>>(id: S, sender: S) -> Self {
        Self { id: id.into(), sender: sender.into(), ..Default::default() }
    }

    pub fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text_body = text.into();
        self
    }

    pub fn with_html<S: Into<String>>(mut self, html: S) -> Self {
        self.html_body = html.into();
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum MailboxError {
    #[error("Could not read the mailbox. {0}")]
    Io(String),
    #[error("Message {0} is not in the mailbox")]
    MessageNotFound(String),
}

impl From<std::io::Error> for MailboxError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait Mailbox {
    /// Every message that has not been marked as seen, newest first.
    async fn fetch_unseen(&self) -> Result<Vec<BankMessage>, MailboxError>;

    /// Fails with [`MailboxError::MessageNotFound`] if the message is gone or was already marked by someone else.
    async fn mark_seen(&self, message_id: &str) -> Result<(), MailboxError>;
}

//--------------------------------------     MemoryMailbox     ---------------------------------------------------------
/// An in-process mailbox. Messages are considered to arrive in the order they are pushed.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    messages: Arc<Mutex<Vec<(BankMessage, bool)>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: BankMessage) -> Result<(), MailboxError> {
        self.lock()?.push((message, false));
        Ok(())
    }

    pub fn unseen_count(&self) -> Result<usize, MailboxError> {
        Ok(self.lock()?.iter().filter(|(_, seen)| !seen).count())
    }

    pub fn is_seen(&self, message_id: &str) -> Result<bool, MailboxError> {
        Ok(self.lock()?.iter().any(|(m, seen)| *seen && m.id == message_id))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<(BankMessage, bool)>>, MailboxError> {
        self.messages.lock().map_err(|e| MailboxError::Io(format!("Mailbox lock poisoned. {e}")))
    }
}

impl Mailbox for MemoryMailbox {
    async fn fetch_unseen(&self) -> Result<Vec<BankMessage>, MailboxError> {
        let messages = self.lock()?;
        Ok(messages.iter().rev().filter(|(_, seen)| !seen).map(|(m, _)| m.clone()).collect())
    }

    async fn mark_seen(&self, message_id: &str) -> Result<(), MailboxError> {
        let mut messages = self.lock()?;
        let entry = messages
            .iter_mut()
            .find(|(m, seen)| !seen && m.id == message_id)
            .ok_or_else(|| MailboxError::MessageNotFound(message_id.to_string()))?;
        entry.1 = true;
        Ok(())
    }
}

//--------------------------------------     SpoolMailbox      ---------------------------------------------------------
/// A directory of JSON-encoded [`BankMessage`]s, one per `*.json` file. The file name is the message id.
///
/// Marking a message as seen moves its file into the `seen/` subdirectory. A mail fetcher outside this process is
/// expected to drop new notifications into the directory.
#[derive(Debug, Clone)]
pub struct SpoolMailbox {
    dir: PathBuf,
}

pub const SEEN_DIR: &str = "seen";

impl SpoolMailbox {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_message(path: &Path, id: String) -> Option<BankMessage> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                warn!("📨️ Could not read {}. {e}", path.display());
                return None;
            },
        };
        match serde_json::from_slice::<BankMessage>(&bytes) {
            Ok(mut message) => {
                message.id = id;
                Some(message)
            },
            Err(e) => {
                warn!("📨️ {} is not a bank message. {e}", path.display());
                None
            },
        }
    }
}

impl Mailbox for SpoolMailbox {
    async fn fetch_unseen(&self) -> Result<Vec<BankMessage>, MailboxError> {
        if !tokio::fs::try_exists(&self.dir).await? {
            debug!("📨️ Mailbox directory {} does not exist yet", self.dir.display());
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut messages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path.extension().map(|ext| ext == "json").unwrap_or(false);
            if !is_json || !entry.file_type().await?.is_file() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            if let Some(message) = Self::read_message(&path, id).await {
                messages.push(message);
            }
        }
        // Newest first. Messages without a timestamp sort by file name, which fetchers prefix with the arrival time.
        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at).then_with(|| b.id.cmp(&a.id)));
        Ok(messages)
    }

    async fn mark_seen(&self, message_id: &str) -> Result<(), MailboxError> {
        let file_name = Path::new(message_id)
            .file_name()
            .ok_or_else(|| MailboxError::MessageNotFound(message_id.to_string()))?;
        let source = self.dir.join(file_name);
        let seen_dir = self.dir.join(SEEN_DIR);
        tokio::fs::create_dir_all(&seen_dir).await?;
        // The rename is the claim. Whoever loses the race finds the source gone.
        match tokio::fs::rename(&source, seen_dir.join(file_name)).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailboxError::MessageNotFound(message_id.to_string()));
            },
            Err(e) => return Err(e.into()),
        }
        trace!("📨️ Message {message_id} moved to {}", seen_dir.display());
        Ok(())
    }
}
