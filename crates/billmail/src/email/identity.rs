//! Stable identity for inbound emails.
//!
//! The signature is the idempotency key of both ledgers. It must only depend
//! on envelope fields so the same logical email maps to the same key no
//! matter where (or how many times) it is stored.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::parser::EmailEnvelope;

/// Sender used in signatures when the message has no usable From header.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Number of hex characters kept from the fallback digest.
const HASH_LEN: usize = 10;

/// Idempotency key for a logical email.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailSignature(String);

impl EmailSignature {
    /// Derives the signature of an envelope.
    ///
    /// `sender|message_id` when a message id is present, otherwise
    /// `sender|HASH_<digest>` over `sender|subject|date`.
    pub fn of(envelope: &EmailEnvelope) -> Self {
        let sender = if envelope.sender.is_empty() {
            UNKNOWN_SENDER
        } else {
            envelope.sender.as_str()
        };

        let message_id = envelope.message_id.trim();
        if !message_id.is_empty() {
            return Self(format!("{}|{}", sender, message_id));
        }

        let content = format!("{}|{}|{}", sender, envelope.subject, envelope.date);
        let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
        Self(format!("{}|HASH_{}", sender, &digest[..HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EmailSignature {
    fn from(value: String) -> Self {
        Self(value)
    }
}
