//! Prompt texts and function definitions sent to the extraction service.

use serde_json::{json, Value};

/// Characters of document text sent with the classification prompt.
pub const CLASSIFY_TEXT_LIMIT: usize = 2000;

pub const SYSTEM_PROMPT: &str = "You are an invoice analysis assistant.";

pub const CLASSIFY_FUNCTION: &str = "ClassifyDocument";
pub const EXTRACT_FUNCTION: &str = "ExtractInvoiceData";

pub const VISION_PROMPT: &str = "\
Analyze this image and extract any text content, especially if it appears to be an invoice, receipt, or bill.

Please extract all readable text from the image, maintaining the structure and layout as much as possible.
Include:
- All text content (handwritten or printed)
- Numbers, amounts, dates
- Company names, addresses
- Item descriptions
- Any other readable information

If this appears to be a financial document (invoice, receipt, bill), note that specifically.

Return the extracted text content:";

/// First `CLASSIFY_TEXT_LIMIT` characters of `text`, on a char boundary.
pub fn classification_excerpt(text: &str) -> &str {
    match text.char_indices().nth(CLASSIFY_TEXT_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn classification_prompt(text: &str) -> String {
    format!(
        "You are a document classifier. Analyze the following document text and determine if it is:
1. A BILL/INVOICE - ANY document that shows amounts to be paid, charges, fees, costs, or financial obligations
2. OTHER - clearly non-financial documents like contracts, reports, manuals, etc.

BILL/INVOICE includes (be very inclusive):
- Traditional invoices with invoice numbers and line items
- Bills (utility, phone, internet, etc.)
- Statements with charges or amounts due (even if called \"statement\")
- AWS bills, cloud service bills, subscription bills
- Tax bills, government fees, penalty notices
- Service charges, professional service bills
- Receipts with amounts paid or due
- ANY financial document showing money owed or charges
- Handwritten receipts or bills from local markets/vendors

IMPORTANT CLASSIFICATION RULES:
- If you see ANY dollar amounts, fees, charges, or costs → BILL_INVOICE
- If you see terms like \"amount due\", \"total\", \"charges\", \"bill\", \"invoice\" → BILL_INVOICE
- If you see vendor/company names with amounts → BILL_INVOICE
- If you see dates with financial amounts → BILL_INVOICE
- Only classify as OTHER if it's clearly non-financial (contracts, manuals, reports with no charges)
- When in doubt, classify as BILL_INVOICE (better to process than skip)

Return ONLY a JSON object with these keys:
- document_type: \"BILL_INVOICE\" or \"OTHER\"
- confidence: \"HIGH\", \"MEDIUM\", or \"LOW\"
- reason: Brief explanation for the classification

Document text (first {} characters):
{}",
        CLASSIFY_TEXT_LIMIT,
        classification_excerpt(text)
    )
}

pub fn extraction_prompt(text: &str) -> String {
    format!(
        "You are a professional invoice analyzer. Extract the following information from this invoice text:
1. PO number - Look for ANY number that appears after \"PO\", \"P.O.\", \"Purchase Order\", \"PO#\", \"PO:\", \"PO-\", etc. Can be any length (3-10 digits). If no PO number is found, return \"NOT_FOUND\"
2. Bill To (company/person the invoice is billed to)
3. Bill From (company/vendor issuing the invoice)
4. Total Amount (final total amount on the invoice - return ONLY the numeric value without currency symbols)
5. Amount Due (amount that needs to be paid - return ONLY the numeric value without currency symbols)
6. Currency (currency code like USD, INR, EUR, etc.)
7. Bill ID/Invoice number
8. Bill Date (invoice date in format YYYY-MM-DD)
9. Items/Services (list of products, services, or items purchased - comma separated)

FLEXIBLE PO NUMBER RULES:
- Look for patterns like: \"PO: 124555\", \"P.O. 124555\", \"Purchase Order 124555\", \"PO-124555\", \"PO# 124555\"
- Can be 3-10 digits long
- Can start with any digit (not just 2 or 3)
- If multiple PO numbers found, pick the most prominent/first one
- If no PO reference found at all, set to \"NOT_FOUND\"

AMOUNT RULES:
- Total Amount: Look for \"Total\", \"Grand Total\", \"Amount\", \"Invoice Total\" - return only numbers (e.g., \"1234.56\")
- Amount Due: Look for \"Amount Due\", \"Balance Due\", \"Due\", \"Pay This Amount\" - return only numbers (e.g., \"1234.56\")
- Remove all currency symbols, commas, and special characters from amounts

CURRENCY RULES:
- Extract currency separately (USD, INR, EUR, GBP, etc.)
- Look for currency symbols ($, ₹, €, £) or currency codes

ITEMS/SERVICES RULES:
- List all products, services, subscriptions, or items mentioned in the invoice
- Include descriptions, product names, service types
- Separate multiple items with commas

Return ONLY a JSON object with these keys: po_number, bill_to, bill_from, total_amount, amount_due, currency, bill_id, bill_date, items_services

Here's the invoice text:
{}",
        text
    )
}

pub fn classify_function() -> Value {
    json!({
        "name": CLASSIFY_FUNCTION,
        "description": "Classify document type",
        "parameters": {
            "type": "object",
            "properties": {
                "document_type": {
                    "type": "string",
                    "enum": ["BILL_INVOICE", "OTHER"],
                    "description": "Type of document"
                },
                "confidence": {
                    "type": "string",
                    "enum": ["HIGH", "MEDIUM", "LOW"],
                    "description": "Confidence level"
                },
                "reason": {
                    "type": "string",
                    "description": "Brief explanation"
                }
            },
            "required": ["document_type", "confidence", "reason"]
        }
    })
}

pub fn extract_function() -> Value {
    let field = |description: &str| json!({ "type": "string", "description": description });
    let required = super::fields::FIELD_NAMES;
    json!({
        "name": EXTRACT_FUNCTION,
        "description": "Extract structured data from invoice text",
        "parameters": {
            "type": "object",
            "properties": {
                "po_number": field("Purchase Order number - any number found after PO/Purchase Order references"),
                "bill_to": field("Company or person the invoice is billed to"),
                "bill_from": field("Company or vendor issuing the invoice"),
                "total_amount": field("Total amount on the invoice - numbers only, no currency symbols"),
                "amount_due": field("Amount due to be paid - numbers only, no currency symbols"),
                "currency": field("Currency code (USD, INR, EUR, etc.)"),
                "bill_id": field("Invoice number or ID"),
                "bill_date": field("Date of the invoice in format YYYY-MM-DD"),
                "items_services": field("Comma-separated list of items, products, or services purchased")
            },
            "required": required
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_excerpt_is_bounded() {
        let long = "é".repeat(CLASSIFY_TEXT_LIMIT + 50);
        assert_eq!(classification_excerpt(&long).chars().count(), CLASSIFY_TEXT_LIMIT);
        assert_eq!(classification_excerpt("short"), "short");
    }

    #[test]
    fn test_classification_prompt_truncates_document() {
        let text = format!("{}TAIL", "a".repeat(CLASSIFY_TEXT_LIMIT));
        let prompt = classification_prompt(&text);
        assert!(!prompt.contains("TAIL"));
    }

    #[test]
    fn test_extract_function_requires_every_field() {
        let function = extract_function();
        let required = function["parameters"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 9);
        for name in super::super::fields::FIELD_NAMES {
            assert!(function["parameters"]["properties"][name].is_object());
        }
    }
}
