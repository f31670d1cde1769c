//! Text derived from summary bodies: the index text used for embeddings and
//! the short human-readable lines shown with search hits.

use serde_json::Value;

use super::SummaryBody;

/// Body fields that contribute to the index text
pub const INDEX_FIELDS: &[&str] = &[
    "tags",
    "themes",
    "topics",
    "projects",
    "decisions",
    "patterns",
    "highlights",
    "lowlights",
    "memory_candidates",
    "next_week_focus",
    "next_month_bets",
];

/// Flatten the allow-listed fields of a body into newline-separated text.
///
/// Falls back to the compact JSON of the whole body when none of the fields
/// yield any text, so the result is never empty for a non-empty body.
pub fn index_text(body: &Value) -> String {
    let mut lines = Vec::new();
    if let Value::Object(map) = body {
        for field in INDEX_FIELDS {
            if let Some(value) = map.get(*field) {
                flatten(value, &mut lines);
            }
        }
    }
    if lines.is_empty() {
        return body.to_string();
    }
    lines.join("\n")
}

fn flatten(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        Value::Object(map) => map.values().for_each(|v| flatten(v, out)),
    }
}

/// Short readable rendering of a hit, one `- ` line per highlight-like item
pub fn human_text(body: &SummaryBody) -> String {
    let items: &[String] = match body {
        SummaryBody::Daily(b) => &b.highlights,
        SummaryBody::Weekly(b) => &b.progress,
        SummaryBody::Monthly(b) => &b.wins,
    };
    let lines: Vec<String> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| format!("- {}", s))
        .collect();
    if lines.is_empty() {
        format!("summary type: {}", body.kind())
    } else {
        lines.join("\n")
    }
}
