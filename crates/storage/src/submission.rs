use chrono::{DateTime, Utc};
use rekon_core::{
    DeliveryStatus, ReconciliationSubmission, Recipient, SubmissionDestination, SubmissionFile,
    SubmissionId, SubmissionStatus, UserId,
};

use crate::db::DbPool;
use crate::error::StorageError;

/// A submission with its attachments and recipients, written together.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub reference: String,
    pub subject: String,
    pub body: String,
    pub created_by: Option<UserId>,
    pub files: Vec<NewSubmissionFile>,
    pub recipients: Vec<Recipient>,
}

/// Attachment already written to the content-addressed store.
#[derive(Debug, Clone)]
pub struct NewSubmissionFile {
    pub file_name: String,
    pub content_type: String,
    pub sha256: String,
    pub size_bytes: i64,
}

type SubmissionRow = (i64, String, String, String, String, Option<i64>, DateTime<Utc>, Option<DateTime<Utc>>);

const SUBMISSION_COLUMNS: &str = "id, reference, subject, body, status, created_by, created_at, sent_at";

fn submission_from_row(r: SubmissionRow) -> Result<ReconciliationSubmission, StorageError> {
    Ok(ReconciliationSubmission {
        id: SubmissionId(r.0),
        reference: r.1,
        subject: r.2,
        body: r.3,
        status: r.4.parse()?,
        created_by: r.5.map(UserId),
        created_at: r.6,
        sent_at: r.7,
    })
}

type FileRow = (i64, i64, String, String, String, i64);

fn file_from_row(r: FileRow) -> SubmissionFile {
    SubmissionFile {
        id: r.0,
        submission_id: SubmissionId(r.1),
        file_name: r.2,
        content_type: r.3,
        sha256: r.4,
        size_bytes: r.5,
    }
}

type DestinationRow = (i64, i64, String, Option<String>, String, Option<String>, Option<DateTime<Utc>>);

const DESTINATION_COLUMNS: &str = "id, submission_id, email, name, status, error, attempted_at";

fn destination_from_row(r: DestinationRow) -> Result<SubmissionDestination, StorageError> {
    Ok(SubmissionDestination {
        id: r.0,
        submission_id: SubmissionId(r.1),
        email: r.2,
        name: r.3,
        status: r.4.parse()?,
        error: r.5,
        attempted_at: r.6,
    })
}

/// Insert the submission as a draft together with its files and one pending
/// destination per recipient. Either everything is written or nothing is.
pub async fn insert_submission(pool: &DbPool, new: &NewSubmission) -> Result<ReconciliationSubmission, StorageError> {
    let mut tx = pool.begin().await?;

    let sql = format!(
        "INSERT INTO reconciliation_submissions (reference, subject, body, status, created_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {SUBMISSION_COLUMNS}"
    );
    let row = sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(&new.reference)
        .bind(&new.subject)
        .bind(&new.body)
        .bind(SubmissionStatus::Draft.as_str())
        .bind(new.created_by.map(|u| u.0))
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
    let saved = submission_from_row(row)?;

    for file in &new.files {
        sqlx::query(
            "INSERT INTO submission_files (submission_id, file_name, content_type, sha256, size_bytes) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(saved.id.0)
        .bind(&file.file_name)
        .bind(&file.content_type)
        .bind(&file.sha256)
        .bind(file.size_bytes)
        .execute(&mut *tx)
        .await?;
    }
    for recipient in &new.recipients {
        sqlx::query("INSERT INTO submission_destinations (submission_id, email, name, status) VALUES (?, ?, ?, ?)")
            .bind(saved.id.0)
            .bind(&recipient.email)
            .bind(&recipient.name)
            .bind(DeliveryStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::info!(
        submission = %saved.reference,
        files = new.files.len(),
        recipients = new.recipients.len(),
        "Submission saved"
    );
    Ok(saved)
}

pub async fn get_submission(pool: &DbPool, id: SubmissionId) -> Result<Option<ReconciliationSubmission>, StorageError> {
    let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM reconciliation_submissions WHERE id = ?");
    let row = sqlx::query_as::<_, SubmissionRow>(&sql).bind(id.0).fetch_optional(pool).await?;
    row.map(submission_from_row).transpose()
}

pub async fn list_submissions(
    pool: &DbPool,
    status: Option<SubmissionStatus>,
) -> Result<Vec<ReconciliationSubmission>, StorageError> {
    let sql = format!(
        "SELECT {SUBMISSION_COLUMNS} FROM reconciliation_submissions \
         WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(status.map(SubmissionStatus::as_str))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(submission_from_row).collect()
}

pub async fn set_submission_status(
    pool: &DbPool,
    id: SubmissionId,
    status: SubmissionStatus,
    sent_at: Option<DateTime<Utc>>,
) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE reconciliation_submissions SET status = ?, sent_at = COALESCE(?, sent_at) WHERE id = ?")
        .bind(status.as_str())
        .bind(sent_at)
        .bind(id.0)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound("submission", id.0));
    }
    Ok(())
}

pub async fn get_submission_files(pool: &DbPool, submission: SubmissionId) -> Result<Vec<SubmissionFile>, StorageError> {
    let rows = sqlx::query_as::<_, FileRow>(
        "SELECT id, submission_id, file_name, content_type, sha256, size_bytes FROM submission_files WHERE submission_id = ? ORDER BY id",
    )
    .bind(submission.0)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(file_from_row).collect())
}

pub async fn get_destinations(
    pool: &DbPool,
    submission: SubmissionId,
) -> Result<Vec<SubmissionDestination>, StorageError> {
    let sql = format!("SELECT {DESTINATION_COLUMNS} FROM submission_destinations WHERE submission_id = ? ORDER BY id");
    let rows = sqlx::query_as::<_, DestinationRow>(&sql).bind(submission.0).fetch_all(pool).await?;
    rows.into_iter().map(destination_from_row).collect()
}

/// Take every destination of the submission currently in `from` for a
/// delivery round: each is reset to `pending` with its error cleared and
/// returned in id order. The update is a single statement, so concurrent
/// rounds never receive the same destination.
pub async fn claim_destinations(
    pool: &DbPool,
    submission: SubmissionId,
    from: DeliveryStatus,
) -> Result<Vec<SubmissionDestination>, StorageError> {
    let sql = format!(
        "UPDATE submission_destinations SET status = ?, error = NULL \
         WHERE submission_id = ? AND status = ? RETURNING {DESTINATION_COLUMNS}"
    );
    let rows = sqlx::query_as::<_, DestinationRow>(&sql)
        .bind(DeliveryStatus::Pending.as_str())
        .bind(submission.0)
        .bind(from.as_str())
        .fetch_all(pool)
        .await?;
    let mut claimed = rows.into_iter().map(destination_from_row).collect::<Result<Vec<_>, _>>()?;
    claimed.sort_by_key(|d| d.id);
    Ok(claimed)
}

/// Record the outcome of one delivery attempt.
pub async fn record_delivery(
    pool: &DbPool,
    destination_id: i64,
    status: DeliveryStatus,
    error: Option<&str>,
    attempted_at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE submission_destinations SET status = ?, error = ?, attempted_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(error)
        .bind(attempted_at)
        .bind(destination_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound("destination", destination_id));
    }
    Ok(())
}

/// Recompute the submission status from its destinations and persist it.
/// `sent_at` is stamped the first time any destination succeeds.
pub async fn refresh_submission_status(
    pool: &DbPool,
    id: SubmissionId,
) -> Result<SubmissionStatus, StorageError> {
    let destinations = get_destinations(pool, id).await?;
    let outcomes: Vec<DeliveryStatus> = destinations.iter().map(|d| d.status).collect();
    let status = SubmissionStatus::roll_up(&outcomes);

    let sent_at = destinations
        .iter()
        .filter(|d| d.status == DeliveryStatus::Sent)
        .filter_map(|d| d.attempted_at)
        .min();
    set_submission_status(pool, id, status, sent_at).await?;
    Ok(status)
}
