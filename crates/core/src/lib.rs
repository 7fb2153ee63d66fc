pub mod consolidation;
pub mod error;
pub mod money;
pub mod period;
pub mod reference;
pub mod submission;

pub use consolidation::{
    BatchId, ConsolidationBatch, ConsolidationItem, ConsolidationSummary, NewConsolidationBatch,
    NewConsolidationItem,
};
pub use error::CoreError;
pub use money::Money;
pub use period::{DateRange, DayIter};
pub use reference::{
    District, DistrictId, DistrictInput, Proccode, ProccodeId, ProccodeInput, Template, TemplateId,
    TemplateInput, User, UserId, UserInput, UserRole, Vendor, VendorId, VendorInput,
};
pub use submission::{
    dedup_recipients, DeliveryStatus, Recipient, ReconciliationSubmission, SubmissionDestination,
    SubmissionFile, SubmissionId, SubmissionStatus,
};
