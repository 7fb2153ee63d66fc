use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::reference::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub i64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Sending,
    Sent,
    Partial,
    Failed,
}

impl SubmissionStatus {
    /// Derives the parent status from its destinations' delivery outcomes.
    pub fn roll_up(outcomes: &[DeliveryStatus]) -> SubmissionStatus {
        if outcomes.is_empty() {
            return SubmissionStatus::Draft;
        }
        if outcomes.contains(&DeliveryStatus::Pending) {
            return SubmissionStatus::Sending;
        }
        let sent = outcomes.iter().filter(|s| **s == DeliveryStatus::Sent).count();
        match sent {
            0 => SubmissionStatus::Failed,
            n if n == outcomes.len() => SubmissionStatus::Sent,
            _ => SubmissionStatus::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Sending => "sending",
            SubmissionStatus::Sent => "sent",
            SubmissionStatus::Partial => "partial",
            SubmissionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SubmissionStatus::Draft),
            "sending" => Ok(SubmissionStatus::Sending),
            "sent" => Ok(SubmissionStatus::Sent),
            "partial" => Ok(SubmissionStatus::Partial),
            "failed" => Ok(SubmissionStatus::Failed),
            other => Err(CoreError::UnknownVariant { kind: "submission status", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(CoreError::UnknownVariant { kind: "delivery status", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSubmission {
    pub id: SubmissionId,
    /// Stable external reference quoted in the outgoing subject line.
    pub reference: String,
    pub subject: String,
    pub body: String,
    pub status: SubmissionStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionFile {
    pub id: i64,
    pub submission_id: SubmissionId,
    pub file_name: String,
    pub content_type: String,
    /// Lowercase hex SHA-256 of the content; also the attachment store key.
    pub sha256: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDestination {
    pub id: i64,
    pub submission_id: SubmissionId,
    pub email: String,
    pub name: Option<String>,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
}

/// Recipient as supplied by staff, before de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Trims addresses and drops case-insensitive duplicates, keeping first occurrence order.
pub fn dedup_recipients(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = std::collections::HashSet::new();
    recipients
        .into_iter()
        .filter_map(|r| {
            let email = r.email.trim().to_string();
            if email.is_empty() || !seen.insert(email.to_lowercase()) {
                return None;
            }
            let name = r.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
            Some(Recipient { email, name })
        })
        .collect()
}
