//! Outbound mail for reconciliation submissions.
//!
//! The [`Mailer`] trait is the seam between the dispatch logic and the
//! transport. [`SmtpMailer`] talks to a real relay, [`LogMailer`] only writes
//! a log line (development), and [`MockMailer`] records messages for tests.

pub mod mailer;
pub mod message;
pub mod smtp;

use std::sync::Arc;

pub use mailer::{LogMailer, MailError, Mailer, MockMailer};
pub use message::{validate_address, MailAttachment, OutgoingMail};
pub use smtp::{MailConfig, MailTransport, SmtpMailer, SmtpSecurity};

/// Build the mailer selected by `config.transport`.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.transport {
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
        MailTransport::Log => Ok(Arc::new(LogMailer::new(&config.from))),
    }
}
