//! Outbound notifications.
//!
//! The engine hands every customer e-mail and operator ping to a [`Notifier`]. Delivery is fire-and-forget from the
//! engine's point of view: an error is reported to the caller, which logs it and carries on.
//!
//! * [`LogNotifier`] only logs. Useful in development and as the fallback when nothing else is configured.
//! * [`SpoolNotifier`] writes each message, with its attachments, into its own directory under an outbox. A mail relay
//!   (or a human) picks them up from there.
//! * [`TelegramNotifier`] posts the subject and body to a Telegram chat through the Bot API.
//!
//! [`NotifierChannel`] wraps the three so that the transport can be chosen at runtime.
use std::path::{Path, PathBuf};

use chrono::Utc;
use cpg_common::Secret;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new<S: Into<String>>(filename: S, content_type: S, content: Vec<u8>) -> Self {
        Self { filename: filename.into(), content_type: content_type.into(), content }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn new<S: Into<String>>(recipient: S, subject: S, body: S) -> Self {
        Self { recipient: recipient.into(), subject: subject.into(), body: body.into(), attachments: Vec::new() }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Could not deliver the message. {0}")]
    Transport(String),
    #[error("Could not write the message to the outbox. {0}")]
    Io(String),
    #[error("The notifier is not configured. {0}")]
    NotConfigured(String),
}

impl From<std::io::Error> for NotifierError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for NotifierError {
    fn from(e: reqwest::Error) -> Self {
        // The Bot API URL carries the token.
        Self::Transport(e.without_url().to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifierError>;
}

//--------------------------------------     LogNotifier       ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifierError> {
        info!(
            "🧾️ [notify] To: {} | Subject: {} | {} attachment(s)\n{}",
            message.recipient,
            message.subject,
            message.attachments.len(),
            message.body
        );
        Ok(())
    }
}

//--------------------------------------    SpoolNotifier      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct SpoolNotifier {
    outbox: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct SpooledEnvelope {
    recipient: String,
    subject: String,
    body: String,
    attachments: Vec<SpooledAttachment>,
}

#[derive(Serialize, Deserialize)]
struct SpooledAttachment {
    filename: String,
    content_type: String,
}

impl SpoolNotifier {
    pub fn new<P: AsRef<Path>>(outbox: P) -> Self {
        Self { outbox: outbox.as_ref().to_path_buf() }
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }
}

impl Notifier for SpoolNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifierError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f");
        let dir = self.outbox.join(format!("{stamp}-{:08x}", rand::random::<u32>()));
        tokio::fs::create_dir_all(&dir).await?;
        let mut attachments = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            let filename = Path::new(&attachment.filename)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .filter(|n| n != "message.json")
                .ok_or_else(|| NotifierError::Io(format!("Invalid attachment name: {}", attachment.filename)))?;
            tokio::fs::write(dir.join(&filename), &attachment.content).await?;
            attachments.push(SpooledAttachment { filename, content_type: attachment.content_type.clone() });
        }
        let envelope = SpooledEnvelope {
            recipient: message.recipient,
            subject: message.subject,
            body: message.body,
            attachments,
        };
        let json = serde_json::to_vec_pretty(&envelope).map_err(|e| NotifierError::Io(e.to_string()))?;
        tokio::fs::write(dir.join("message.json"), json).await?;
        debug!("🧾️ Message to {} spooled in {}", envelope.recipient, dir.display());
        Ok(())
    }
}

//--------------------------------------   TelegramNotifier    ---------------------------------------------------------
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Posts messages to a single Telegram chat. The recipient field is ignored, and attachments are not forwarded.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    bot_token: Secret<String>,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new<S: Into<String>>(bot_token: Secret<String>, chat_id: S) -> Self {
        Self {
            bot_token,
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifierError> {
        if self.bot_token.reveal().is_empty() || self.chat_id.is_empty() {
            return Err(NotifierError::NotConfigured("Telegram bot token and chat id are required".into()));
        }
        let url = format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), self.bot_token.reveal());
        let text = match message.body.is_empty() {
            true => message.subject,
            false => format!("{}\n{}", message.subject, message.body),
        };
        let request = SendMessageRequest { chat_id: &self.chat_id, text, disable_web_page_preview: true };
        let response = self.client.post(url).json(&request).send().await?;
        if response.status().is_success() {
            trace!("🧾️ Telegram message delivered to chat {}", self.chat_id);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(NotifierError::Transport(format!("Telegram replied with {status}. {body}")))
        }
    }
}

//--------------------------------------    NotifierChannel    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub enum NotifierChannel {
    Log(LogNotifier),
    Spool(SpoolNotifier),
    Telegram(TelegramNotifier),
}

impl Default for NotifierChannel {
    fn default() -> Self {
        Self::Log(LogNotifier)
    }
}

impl Notifier for NotifierChannel {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifierError> {
        match self {
            NotifierChannel::Log(n) => n.send(message).await,
            NotifierChannel::Spool(n) => n.send(message).await,
            NotifierChannel::Telegram(n) => n.send(message).await,
        }
    }
}
