//! Outbound delivery of results and notices.

pub mod csv;
pub mod notice;
pub mod outbox;
pub mod smtp;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use thiserror::Error;

use crate::error::StorageError;

pub use outbox::OutboxTransport;
pub use smtp::SmtpMailTransport;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Failed to write to outbox: {0}")]
    Outbox(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A plain-text message with an optional attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<MessageAttachment>,
}

impl OutboundMessage {
    /// Builds the MIME message.
    pub fn to_mime(&self) -> Result<Message, DeliveryError> {
        let builder = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(&self.to)?)
            .subject(self.subject.clone());

        let message = match &self.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| DeliveryError::Build(e.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(self.body.clone()))
                        .singlepart(
                            Attachment::new(attachment.filename.clone())
                                .body(attachment.data.clone(), content_type),
                        ),
                )
            }
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(self.body.clone()),
        };

        message.map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Sends composed messages. `Ok` means the transport accepted the message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}
