//! Results table rendering.

use crate::pipeline::{DocumentResult, CSV_HEADERS};

/// Renders results as CSV (RFC 4180, CRLF line endings) with a header row.
pub fn render_results(results: &[DocumentResult]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADERS.iter().copied());
    for result in results {
        push_row(&mut out, result.to_row().into_iter());
    }
    out
}

fn push_row<'a>(out: &mut String, values: impl Iterator<Item = &'a str>) {
    for (i, value) in values.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_escape(value));
    }
    out.push_str("\r\n");
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
