//! Per-document results and their flat row form.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::analyzer::{BillingFields, FIELD_NAMES};

/// Column order of every results table.
pub const CSV_HEADERS: [&str; 11] = [
    "filename",
    "po_number",
    "bill_to",
    "bill_from",
    "total_amount",
    "amount_due",
    "currency",
    "bill_id",
    "bill_date",
    "items_services",
    "status",
];

/// Reason a document produced no billing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// Field extraction call failed.
    ApiError,
    /// Document text could not be acquired.
    Error,
    /// Document had no text.
    NoText,
    /// Document was classified as non-financial.
    NotInvoice,
    /// Archive could not be opened.
    ZipError,
}

impl Sentinel {
    pub const ALL: [Sentinel; 5] = [
        Sentinel::ApiError,
        Sentinel::Error,
        Sentinel::NoText,
        Sentinel::NotInvoice,
        Sentinel::ZipError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::ApiError => "API_ERROR",
            Sentinel::Error => "ERROR",
            Sentinel::NoText => "NO_TEXT",
            Sentinel::NotInvoice => "NOT_INVOICE",
            Sentinel::ZipError => "ZIP_ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn status(&self) -> ResultStatus {
        match self {
            Sentinel::NotInvoice => ResultStatus::Skipped,
            _ => ResultStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    Success,
    Error,
    Skipped,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Error => "error",
            ResultStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Extracted(BillingFields),
    Degraded(Sentinel),
}

/// Result of analyzing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentResult {
    pub filename: String,
    pub outcome: Outcome,
}

impl DocumentResult {
    pub fn extracted(filename: impl Into<String>, fields: BillingFields) -> Self {
        Self {
            filename: filename.into(),
            outcome: Outcome::Extracted(fields),
        }
    }

    pub fn degraded(filename: impl Into<String>, sentinel: Sentinel) -> Self {
        Self {
            filename: filename.into(),
            outcome: Outcome::Degraded(sentinel),
        }
    }

    pub fn status(&self) -> ResultStatus {
        match &self.outcome {
            Outcome::Extracted(_) => ResultStatus::Success,
            Outcome::Degraded(sentinel) => sentinel.status(),
        }
    }

    /// The nine field values; a sentinel fills every field.
    pub fn field_values(&self) -> [&str; 9] {
        match &self.outcome {
            Outcome::Extracted(fields) => fields.values(),
            Outcome::Degraded(sentinel) => [sentinel.as_str(); 9],
        }
    }

    /// Row in [`CSV_HEADERS`] order.
    pub fn to_row(&self) -> Vec<&str> {
        let mut row = Vec::with_capacity(CSV_HEADERS.len());
        row.push(self.filename.as_str());
        row.extend(self.field_values());
        row.push(self.status().as_str());
        row
    }
}

impl Serialize for DocumentResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CSV_HEADERS.len()))?;
        map.serialize_entry("filename", &self.filename)?;
        map.serialize_entry("status", self.status().as_str())?;
        for (name, value) in FIELD_NAMES.iter().zip(self.field_values()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
