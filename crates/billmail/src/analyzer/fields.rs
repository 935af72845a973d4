//! Billing fields returned by the extraction call.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Field names in output column order.
pub const FIELD_NAMES: [&str; 9] = [
    "po_number",
    "bill_to",
    "bill_from",
    "total_amount",
    "amount_due",
    "currency",
    "bill_id",
    "bill_date",
    "items_services",
];

static RE_NON_AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\d.,\-]").unwrap());

/// Structured billing information extracted from one document.
///
/// Every field is free text. Missing or `null` values decode as empty
/// strings and numbers are kept in their textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub po_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bill_to: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bill_from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount_due: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bill_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bill_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub items_services: String,
}

impl BillingFields {
    /// Values in [`FIELD_NAMES`] order.
    pub fn values(&self) -> [&str; 9] {
        [
            &self.po_number,
            &self.bill_to,
            &self.bill_from,
            &self.total_amount,
            &self.amount_due,
            &self.currency,
            &self.bill_id,
            &self.bill_date,
            &self.items_services,
        ]
    }

    /// Normalizes both amount fields with [`clean_amount`].
    pub fn with_clean_amounts(mut self) -> Self {
        self.total_amount = clean_amount(&self.total_amount);
        self.amount_due = clean_amount(&self.amount_due);
        self
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Reduces an amount to digits, sign and a decimal point.
///
/// `"$1,234.56"` becomes `"1234.56"`, a lone comma followed by at most two
/// digits is read as a decimal comma (`"12,50"` → `"12.50"`), any other
/// comma is a thousands separator.
pub fn clean_amount(amount: &str) -> String {
    if amount.is_empty() || crate::pipeline::Sentinel::parse(amount).is_some() {
        return amount.to_string();
    }

    let cleaned = RE_NON_AMOUNT.replace_all(amount, "").into_owned();

    if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace(',', "")
    } else if cleaned.matches(',').count() == 1
        && cleaned.split(',').nth(1).map(|d| d.len() <= 2).unwrap_or(false)
    {
        cleaned.replace(',', ".")
    } else {
        cleaned.replace(',', "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_amount() {
        assert_eq!(clean_amount("$1,234.56"), "1234.56");
        assert_eq!(clean_amount("12,50 €"), "12.50");
        assert_eq!(clean_amount("1,234,567"), "1234567");
        assert_eq!(clean_amount("1,234"), "1234");
        assert_eq!(clean_amount("USD -45.00"), "-45.00");
        assert_eq!(clean_amount(""), "");
        assert_eq!(clean_amount("NO_TEXT"), "NO_TEXT");
        assert_eq!(clean_amount("n/a"), "");
    }

    #[test]
    fn test_lenient_decoding() {
        let fields: BillingFields = serde_json::from_str(
            r#"{"po_number": null, "total_amount": 120.5, "bill_id": "INV-7", "currency": "USD"}"#,
        )
        .unwrap();

        assert_eq!(fields.po_number, "");
        assert_eq!(fields.total_amount, "120.5");
        assert_eq!(fields.bill_id, "INV-7");
        assert_eq!(fields.bill_to, "");
    }

    #[test]
    fn test_values_follow_field_order() {
        let fields = BillingFields {
            po_number: "PO-1".to_string(),
            items_services: "Hosting".to_string(),
            ..Default::default()
        };
        let values = fields.values();
        assert_eq!(values[0], "PO-1");
        assert_eq!(values[8], "Hosting");
        assert_eq!(FIELD_NAMES[8], "items_services");
    }
}
