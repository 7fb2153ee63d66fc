pub mod attachments;
pub mod consolidation;
pub mod db;
pub mod error;
pub mod reference;
pub mod submission;

pub use attachments::{attachment_path, sha256_hex, AttachmentStore, StoredAttachment};
pub use consolidation::{
    delete_batch, get_batch, get_batch_item, get_batch_items, insert_batch, list_batches,
    summarize_batches, BatchFilter,
};
pub use db::{connect_in_memory, create_db, ping, DbPool};
pub use error::StorageError;
pub use reference::{
    delete_district, delete_proccode, delete_template, delete_user, delete_vendor, get_district,
    get_proccode, get_template, get_user, get_user_by_username, get_vendor, insert_district,
    insert_proccode, insert_template, insert_user, insert_vendor, list_districts, list_proccodes,
    list_templates, list_users, list_vendors, update_district, update_proccode, update_template,
    update_user, update_vendor,
};
pub use submission::{
    claim_destinations, get_destinations, get_submission, get_submission_files, insert_submission,
    list_submissions, record_delivery, refresh_submission_status, set_submission_status,
    NewSubmission, NewSubmissionFile,
};
