//! Idempotency ledgers.
//!
//! Two independent documents live in the object store: one records which
//! emails were processed, the other which emails had their results
//! delivered. Both map an [`EmailSignature`] to a record and are rewritten
//! as a whole on every update.

pub mod store;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::email::EmailSignature;
use crate::error::StorageError;
use crate::storage::ObjectVersion;

pub use store::LedgerStore;

/// Errors raised while loading or saving a ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Ledger '{key}' could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Ledger '{key}' kept changing underneath us after {attempts} attempts")]
    Conflict { key: String, attempts: usize },
}

/// A record type persisted in one of the ledger documents.
pub trait LedgerRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Object key of the ledger document.
    const OBJECT_KEY: &'static str;
    /// Document field holding the signature → record map.
    const RECORDS_FIELD: &'static str;
    /// Document field holding the record count.
    const TOTAL_FIELD: &'static str;
}

/// Record written once an email went through extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessedRecord {
    pub email_key: String,
    pub sender_email: String,
    pub subject: String,
    pub message_id: String,
    pub processed_date: String,
    pub attachment_count: usize,
    pub processing_results_count: usize,
    pub status: String,
}

impl Default for ProcessedRecord {
    fn default() -> Self {
        Self {
            email_key: String::new(),
            sender_email: String::new(),
            subject: String::new(),
            message_id: String::new(),
            processed_date: String::new(),
            attachment_count: 0,
            processing_results_count: 0,
            status: "processed".to_string(),
        }
    }
}

impl LedgerRecord for ProcessedRecord {
    const OBJECT_KEY: &'static str = "processed_emails_tracking.json";
    const RECORDS_FIELD: &'static str = "processed_records";
    const TOTAL_FIELD: &'static str = "total_processed";
}

/// Record written once the transport confirmed a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentRecord {
    pub sender_email: String,
    pub subject: String,
    pub sent_date: String,
    pub results_count: usize,
    pub status: String,
}

impl Default for SentRecord {
    fn default() -> Self {
        Self {
            sender_email: String::new(),
            subject: String::new(),
            sent_date: String::new(),
            results_count: 0,
            status: "sent".to_string(),
        }
    }
}

impl LedgerRecord for SentRecord {
    const OBJECT_KEY: &'static str = "sent_emails_tracking.json";
    const RECORDS_FIELD: &'static str = "sent_records";
    const TOTAL_FIELD: &'static str = "total_sent";
}

/// In-memory view of a ledger document.
///
/// `version` is the version of the object the view was read from, or `None`
/// when no object existed (or it could not be read).
#[derive(Debug, Clone)]
pub struct Ledger<R> {
    records: BTreeMap<EmailSignature, R>,
    version: Option<ObjectVersion>,
}

pub type ProcessedLedger = Ledger<ProcessedRecord>;
pub type SentLedger = Ledger<SentRecord>;

impl<R> Default for Ledger<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            version: None,
        }
    }
}

impl<R: LedgerRecord> Ledger<R> {
    pub fn new(records: BTreeMap<EmailSignature, R>, version: Option<ObjectVersion>) -> Self {
        Self { records, version }
    }

    pub fn contains(&self, signature: &EmailSignature) -> bool {
        self.records.contains_key(signature)
    }

    pub fn get(&self, signature: &EmailSignature) -> Option<&R> {
        self.records.get(signature)
    }

    pub fn insert(&mut self, signature: EmailSignature, record: R) {
        self.records.insert(signature, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &BTreeMap<EmailSignature, R> {
        &self.records
    }

    pub fn version(&self) -> Option<&ObjectVersion> {
        self.version.as_ref()
    }

    pub(crate) fn set_version(&mut self, version: Option<ObjectVersion>) {
        self.version = version;
    }

    /// Serializes the ledger into its document form.
    pub fn encode(&self, last_updated: &str) -> Result<Vec<u8>, LedgerError> {
        let encode_err = |source| LedgerError::Encode {
            key: R::OBJECT_KEY.to_string(),
            source,
        };

        let mut document = serde_json::Map::new();
        document.insert(
            R::RECORDS_FIELD.to_string(),
            serde_json::to_value(&self.records).map_err(encode_err)?,
        );
        document.insert(
            "last_updated".to_string(),
            serde_json::Value::String(last_updated.to_string()),
        );
        document.insert(
            R::TOTAL_FIELD.to_string(),
            serde_json::Value::from(self.records.len()),
        );

        serde_json::to_vec_pretty(&serde_json::Value::Object(document)).map_err(encode_err)
    }

    /// Parses a ledger document. A document without the records field is an
    /// empty ledger.
    pub fn decode(body: &[u8], version: Option<ObjectVersion>) -> Result<Self, LedgerError> {
        let decode_err = |source| LedgerError::Decode {
            key: R::OBJECT_KEY.to_string(),
            source,
        };

        let mut document: serde_json::Value = serde_json::from_slice(body).map_err(decode_err)?;
        let records = match document.get_mut(R::RECORDS_FIELD) {
            Some(value) => serde_json::from_value(value.take()).map_err(decode_err)?,
            None => BTreeMap::new(),
        };

        Ok(Self { records, version })
    }
}
