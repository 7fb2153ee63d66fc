use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};

use crate::mailer::MailError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

/// Parse a bare address (`user@host`), rejecting anything lettre would refuse.
pub fn validate_address(address: &str) -> Result<Address, MailError> {
    address.trim().parse::<Address>().map_err(|e| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn mailbox(address: &str, name: Option<&str>) -> Result<Mailbox, MailError> {
    Ok(Mailbox::new(name.map(str::to_string), validate_address(address)?))
}

impl OutgoingMail {
    /// Plain-text body followed by each attachment as its own part.
    pub fn to_message(&self, from: &str) -> Result<Message, MailError> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidAddress { address: from.to_string(), reason: e.to_string() })?;
        let to = mailbox(&self.to, self.to_name.as_deref())?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        for attachment in &self.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(format!("{}: {e}", attachment.file_name)))?;
            parts = parts.singlepart(
                Attachment::new(attachment.file_name.clone()).body(attachment.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(parts)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}
