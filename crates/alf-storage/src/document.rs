//! Lenient decoding of bulk-import documents.
//!
//! The migration left fields under alternate keys, numbers stored as strings, and
//! comma lists stored as arrays. Decoding never fails: anything unusable becomes `None`.

use alf_core::RawAgencyRecord;
use serde_json::Value as JsonValue;

pub fn record_from_document(id: impl Into<String>, doc: &JsonValue) -> RawAgencyRecord {
    RawAgencyRecord {
        id: id.into(),
        name: doc_text(doc, &["name"]),
        website_url: doc_text(doc, &["website_url", "url"]),
        services: doc_text(doc, &["services"]),
        description: doc_text(doc, &["description"]),
        generated_desc: doc_text(doc, &["generated_desc", "why_choose"]),
        locality: doc_text(doc, &["locality"]),
        avg_rating: doc_f64(doc, &["avg_rating"]),
        reviews: doc_count(doc, &["reviews"]),
        min_project_size: doc_text(doc, &["min_project_size"]),
        hourly_rate: doc_text(doc, &["hourly_rate"]),
        employees_count: doc_text(doc, &["employees_count", "employees"]),
        year_founded: doc_text(doc, &["year_founded", "founded"]),
        clutch_url: doc_text(doc, &["clutch_url"]),
    }
}

/// Store id of a fixture document: `_id` (plain or `{"$oid": ...}`) or `id`.
pub fn document_id(doc: &JsonValue) -> Option<String> {
    let raw = doc.get("_id").or_else(|| doc.get("id"))?;
    match raw {
        JsonValue::String(s) => text_or_none(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Object(map) => map.get("$oid").and_then(|v| v.as_str()).and_then(text_or_none),
        _ => None,
    }
}

fn text_or_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_present<'a>(doc: &'a JsonValue, keys: &[&str]) -> Vec<&'a JsonValue> {
    keys.iter()
        .filter_map(|key| doc.get(*key))
        .filter(|value| !value.is_null())
        .collect()
}

fn doc_text(doc: &JsonValue, keys: &[&str]) -> Option<String> {
    first_present(doc, keys).into_iter().find_map(|value| match value {
        JsonValue::String(s) => text_or_none(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => {
            let parts = items
                .iter()
                .filter_map(|item| item.as_str().and_then(text_or_none))
                .collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    })
}

fn doc_f64(doc: &JsonValue, keys: &[&str]) -> Option<f64> {
    first_present(doc, keys).into_iter().find_map(|value| match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

/// Counts such as `"1,234 reviews"`: every digit in the string, in order.
fn doc_count(doc: &JsonValue, keys: &[&str]) -> Option<u64> {
    first_present(doc, keys).into_iter().find_map(|value| match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        JsonValue::String(s) => {
            let digits = s.chars().filter(char::is_ascii_digit).collect::<String>();
            digits.parse::<u64>().ok()
        }
        _ => None,
    })
}
