//! Inbound email module.
//!
//! Parses raw MIME messages read from the object store into an envelope and
//! a flat list of document attachments, and derives the signature used as
//! the idempotency key of both ledgers.

pub mod error;
pub mod identity;
pub mod parser;

pub use error::EmailError;
pub use identity::EmailSignature;
pub use parser::{Attachment, EmailEnvelope, EmailParser, ParsedEmail};
