//! Building reconciliation submissions and delivering them, one destination at a time.

use chrono::Utc;
use rekon_core::{
    dedup_recipients, BatchId, DeliveryStatus, Recipient, ReconciliationSubmission,
    SubmissionDestination, SubmissionFile, SubmissionId, SubmissionStatus, UserId,
};
use rekon_email::{validate_address, MailAttachment, OutgoingMail};
use rekon_storage::{self as storage, NewSubmission, NewSubmissionFile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::reconcile::export_batch;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub batch_ids: Vec<BatchId>,
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: ReconciliationSubmission,
    pub files: Vec<SubmissionFile>,
    pub destinations: Vec<SubmissionDestination>,
}

pub async fn load_detail(state: &AppState, id: SubmissionId) -> Result<SubmissionDetail, ApiError> {
    let submission = storage::get_submission(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("submission", id))?;
    let files = storage::get_submission_files(&state.db, id).await?;
    let destinations = storage::get_destinations(&state.db, id).await?;
    Ok(SubmissionDetail { submission, files, destinations })
}

fn new_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("REK-{}-{}", Utc::now().format("%Y%m%d"), &suffix[..8]).to_uppercase()
}

/// Export the batches, store the files, create one pending destination per
/// recipient and attempt delivery.
pub async fn create_submission(
    state: &AppState,
    request: SubmissionRequest,
    created_by: Option<UserId>,
) -> Result<SubmissionDetail, ApiError> {
    let subject = request.subject.trim();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject is required".to_string()));
    }
    let recipients = dedup_recipients(request.recipients);
    if recipients.is_empty() {
        return Err(ApiError::BadRequest("at least one recipient is required".to_string()));
    }
    let mut batch_ids = request.batch_ids;
    batch_ids.sort_by_key(|b| b.0);
    batch_ids.dedup();
    if batch_ids.is_empty() {
        return Err(ApiError::BadRequest("at least one consolidation is required".to_string()));
    }

    // Files go to the store before any row is written.
    let mut files = Vec::with_capacity(batch_ids.len());
    for id in &batch_ids {
        let export = export_batch(state, *id).await?;
        let stored = state.attachments.put(&export.file_name, &export.bytes).await?;
        files.push(NewSubmissionFile {
            file_name: export.file_name,
            content_type: export.content_type.to_string(),
            sha256: stored.sha256,
            size_bytes: stored.size_bytes,
        });
    }

    let submission = storage::insert_submission(
        &state.db,
        &NewSubmission {
            reference: new_reference(),
            subject: subject.to_string(),
            body: request.body,
            created_by,
            files,
            recipients,
        },
    )
    .await?;

    deliver(state, submission.id, DeliveryStatus::Pending).await?;
    load_detail(state, submission.id).await
}

/// Re-attempt the destinations that failed last time.
pub async fn retry_submission(state: &AppState, id: SubmissionId) -> Result<SubmissionDetail, ApiError> {
    let attempted = deliver(state, id, DeliveryStatus::Failed).await?;
    if attempted == 0 {
        return Err(ApiError::BadRequest(format!("submission {id} has no failed destinations")));
    }
    load_detail(state, id).await
}

async fn load_attachments(
    state: &AppState,
    files: &[SubmissionFile],
) -> Result<Vec<MailAttachment>, ApiError> {
    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let bytes = state.attachments.get(&file.file_name, &file.sha256).await?;
        attachments.push(MailAttachment {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            bytes,
        });
    }
    Ok(attachments)
}

/// Claim every destination currently in `which`, attempt them in order,
/// then roll the submission status up. Returns how many destinations this
/// round claimed; destinations claimed by a concurrent round are skipped.
async fn deliver(state: &AppState, id: SubmissionId, which: DeliveryStatus) -> Result<usize, ApiError> {
    let submission = storage::get_submission(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("submission", id))?;
    let files = storage::get_submission_files(&state.db, id).await?;
    let attachments = load_attachments(state, &files).await?;

    let targets = storage::claim_destinations(&state.db, id, which).await?;
    if targets.is_empty() {
        return Ok(0);
    }
    storage::set_submission_status(&state.db, id, SubmissionStatus::Sending, None).await?;

    let round = send_round(state, &submission, &targets, &attachments).await;
    if let Err(e) = &round {
        tracing::error!(submission = %submission.reference, "Delivery round interrupted: {e}");
        release_unattempted(state, id, &targets, &e.to_string()).await;
    }

    let status = storage::refresh_submission_status(&state.db, id).await?;
    round?;
    tracing::info!(submission = %submission.reference, %status, attempted = targets.len(), "Delivery round finished");
    Ok(targets.len())
}

async fn send_round(
    state: &AppState,
    submission: &ReconciliationSubmission,
    targets: &[SubmissionDestination],
    attachments: &[MailAttachment],
) -> Result<(), ApiError> {
    let subject = format!("[{}] {}", submission.reference, submission.subject);
    for destination in targets {
        let outcome = match validate_address(&destination.email) {
            Err(e) => Err(e.to_string()),
            Ok(_) => {
                let mail = OutgoingMail {
                    to: destination.email.clone(),
                    to_name: destination.name.clone(),
                    subject: subject.clone(),
                    body: submission.body.clone(),
                    attachments: attachments.to_vec(),
                };
                state.mailer.send(&mail).await.map_err(|e| e.to_string())
            }
        };

        let (status, error) = match outcome {
            Ok(()) => (DeliveryStatus::Sent, None),
            Err(e) => {
                tracing::warn!(
                    submission = %submission.reference,
                    to = %destination.email,
                    mailer = state.mailer.name(),
                    "Delivery failed: {e}"
                );
                (DeliveryStatus::Failed, Some(e))
            }
        };
        storage::record_delivery(&state.db, destination.id, status, error.as_deref(), Utc::now()).await?;
    }
    Ok(())
}

/// Mark claimed destinations that never got an outcome as failed so a later
/// retry picks them up.
async fn release_unattempted(state: &AppState, id: SubmissionId, claimed: &[SubmissionDestination], reason: &str) {
    let current = match storage::get_destinations(&state.db, id).await {
        Ok(current) => current,
        Err(e) => {
            tracing::error!(submission = id.0, "Could not reload destinations: {e}");
            return;
        }
    };
    let error = format!("delivery interrupted: {reason}");
    for dest in current
        .iter()
        .filter(|d| d.status == DeliveryStatus::Pending && claimed.iter().any(|c| c.id == d.id))
    {
        if let Err(e) =
            storage::record_delivery(&state.db, dest.id, DeliveryStatus::Failed, Some(&error), Utc::now()).await
        {
            tracing::error!(submission = id.0, destination = dest.id, "Could not release destination: {e}");
        }
    }
}
