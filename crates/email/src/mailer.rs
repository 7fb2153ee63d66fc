use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;

use crate::message::{validate_address, OutgoingMail};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Could not build message: {0}")]
    Build(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Delivers one message to one recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;

    /// Transport name for logs.
    fn name(&self) -> &'static str;
}

/// Writes a log line instead of sending.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: &str) -> Self {
        Self { from: from.to_string() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        validate_address(&mail.to)?;
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "Mail not sent (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Records every message; addresses registered with `failing_for` are refused.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: Mutex<HashSet<String>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, address: &str) -> Self {
        if let Ok(failing) = self.failing.get_mut() {
            failing.insert(address.to_lowercase());
        }
        self
    }

    /// Let a previously failing address accept mail again.
    pub fn recover(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&address.to_lowercase());
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        validate_address(&mail.to)?;
        let rejected = self
            .failing
            .lock()
            .map(|f| f.contains(&mail.to.to_lowercase()))
            .unwrap_or(false);
        if rejected {
            return Err(MailError::Transport(format!("550 mailbox unavailable: {}", mail.to)));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
