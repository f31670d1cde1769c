//! Summary documents - one typed body per level
//!
//! Model output is parsed into these types immediately after each completion
//! call. Bodies are stored as JSON tagged with `"type"`.

pub mod text;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::period::{Period, SummaryKind};

pub use text::{human_text, index_text, INDEX_FIELDS};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBody {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "string_list")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub patterns: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub open_questions: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub lowlights: Vec<String>,
    /// Facts the user stated about themselves and the assistant acknowledged
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "string_list")]
    pub user_facts_explicit: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBody {
    #[serde(default, deserialize_with = "lenient_string")]
    pub week_key: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub week_start: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub week_end: String,
    #[serde(default, deserialize_with = "string_list")]
    pub themes: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub progress: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub recurring_blockers: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub notable_decisions: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub next_week_focus: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBody {
    #[serde(default, deserialize_with = "lenient_string")]
    pub month: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub month_start: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub month_end: String,
    #[serde(default, deserialize_with = "string_list")]
    pub trajectory: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub top_themes: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub wins: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub losses: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub systems_improvements: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub next_month_bets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SummaryBody {
    Daily(DailyBody),
    Weekly(WeeklyBody),
    Monthly(MonthlyBody),
}

impl SummaryBody {
    /// Validate a raw completion as a body of the given level.
    ///
    /// Accepts a surrounding Markdown code fence. Empty text, non-JSON text
    /// and JSON that is not an object are validation errors.
    pub fn parse_model_output(kind: SummaryKind, raw: &str) -> Result<Self> {
        let text = strip_code_fence(raw);
        if text.is_empty() {
            return Err(MemoryError::validation(format!("{} model output is empty", kind)));
        }
        let value: Value = serde_json::from_str(text).map_err(|e| {
            MemoryError::validation(format!("{} model output is not valid JSON ({}): {}", kind, e, preview(text)))
        })?;
        if !value.is_object() {
            return Err(MemoryError::validation(format!(
                "{} model output is not a JSON object: {}",
                kind,
                preview(text)
            )));
        }
        Self::from_value(kind, value)
    }

    /// Decode a body previously stored for a summary row
    pub fn from_stored(kind: SummaryKind, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| MemoryError::validation(format!("stored {} body is corrupt: {}", kind, e)))?;
        Self::from_value(kind, value)
    }

    fn from_value(kind: SummaryKind, value: Value) -> Result<Self> {
        let body = match kind {
            SummaryKind::Daily => serde_json::from_value(value).map(SummaryBody::Daily),
            SummaryKind::Weekly => serde_json::from_value(value).map(SummaryBody::Weekly),
            SummaryKind::Monthly => serde_json::from_value(value).map(SummaryBody::Monthly),
        };
        body.map_err(|e| MemoryError::validation(format!("{} body does not match schema: {}", kind, e)))
    }

    pub fn kind(&self) -> SummaryKind {
        match self {
            SummaryBody::Daily(_) => SummaryKind::Daily,
            SummaryBody::Weekly(_) => SummaryKind::Weekly,
            SummaryBody::Monthly(_) => SummaryKind::Monthly,
        }
    }

    /// Overwrite the period fields with the authoritative values for `period`
    pub fn stamp_period(&mut self, period: &Period) {
        match self {
            SummaryBody::Daily(b) => b.date = period.key.clone(),
            SummaryBody::Weekly(b) => {
                b.week_key = period.key.clone();
                b.week_start = period.start_str();
                b.week_end = period.end_str();
            }
            SummaryBody::Monthly(b) => {
                b.month = period.key.clone();
                b.month_start = period.start_str();
                b.month_end = period.end_str();
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn index_text(&self) -> String {
        index_text(&self.to_value())
    }

    pub fn human_text(&self) -> String {
        human_text(self)
    }
}

/// The part of a daily summary a weekly rollup consumes
#[derive(Debug, Clone, Serialize)]
pub struct DailyDigest<'a> {
    pub date: &'a str,
    pub topics: &'a [String],
    pub patterns: &'a [String],
    pub open_questions: &'a [String],
    pub highlights: &'a [String],
    pub lowlights: &'a [String],
}

impl<'a> From<&'a DailyBody> for DailyDigest<'a> {
    fn from(b: &'a DailyBody) -> Self {
        Self {
            date: &b.date,
            topics: &b.topics,
            patterns: &b.patterns,
            open_questions: &b.open_questions,
            highlights: &b.highlights,
            lowlights: &b.lowlights,
        }
    }
}

/// The part of a weekly summary a monthly rollup consumes
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyDigest<'a> {
    pub week_start: &'a str,
    pub week_end: &'a str,
    pub themes: &'a [String],
    pub progress: &'a [String],
    pub recurring_blockers: &'a [String],
    pub notable_decisions: &'a [String],
    pub next_week_focus: &'a [String],
}

impl<'a> From<&'a WeeklyBody> for WeeklyDigest<'a> {
    fn from(b: &'a WeeklyBody) -> Self {
        Self {
            week_start: &b.week_start,
            week_end: &b.week_end,
            themes: &b.themes,
            progress: &b.progress,
            recurring_blockers: &b.recurring_blockers,
            notable_decisions: &b.notable_decisions,
            next_week_focus: &b.next_week_focus,
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        if let Some(inner) = rest.trim_end().strip_suffix("```") {
            return inner.trim();
        }
    }
    text
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 200;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX_CHARS).collect::<String>())
    }
}

fn scalar_to_line(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_to_line).collect(),
        Some(other) => scalar_to_line(other).into_iter().collect(),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_line).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_daily_output() {
        let raw = r#"{"type":"daily","date":"2025-01-05","topics":["running"],"highlights":["ran 5k"],"extra":1}"#;
        let body = SummaryBody::parse_model_output(SummaryKind::Daily, raw).unwrap();
        match body {
            SummaryBody::Daily(d) => {
                assert_eq!(d.topics, vec!["running"]);
                assert_eq!(d.highlights, vec!["ran 5k"]);
                assert!(d.patterns.is_empty());
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_output() {
        assert!(SummaryBody::parse_model_output(SummaryKind::Weekly, "   ").unwrap_err().is_validation());
        assert!(SummaryBody::parse_model_output(SummaryKind::Weekly, "not json").unwrap_err().is_validation());
        assert!(SummaryBody::parse_model_output(SummaryKind::Weekly, "[1,2]").unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let raw = "```json\n{\"themes\": [\"focus\"]}\n```";
        let body = SummaryBody::parse_model_output(SummaryKind::Weekly, raw).unwrap();
        assert_eq!(body.index_text(), "focus");
    }

    #[test]
    fn test_lenient_list_items() {
        let raw = r#"{"wins": ["shipped", 3, null, {"a": "b"}], "losses": null, "trajectory": "up"}"#;
        let SummaryBody::Monthly(m) = SummaryBody::parse_model_output(SummaryKind::Monthly, raw).unwrap() else {
            panic!("expected monthly body");
        };
        assert_eq!(m.wins, vec!["shipped".to_string(), "3".to_string(), r#"{"a":"b"}"#.to_string()]);
        assert!(m.losses.is_empty());
        assert_eq!(m.trajectory, vec!["up"]);
    }

    #[test]
    fn test_stamp_period_and_type_tag() {
        let mut body = SummaryBody::Weekly(WeeklyBody { week_start: "bogus".into(), ..Default::default() });
        body.stamp_period(&Period::parse(SummaryKind::Weekly, "2025-W02").unwrap());
        let value = body.to_value();
        assert_eq!(value["type"], "weekly");
        assert_eq!(value["week_key"], "2025-W02");
        assert_eq!(value["week_start"], "2025-01-06");
        assert_eq!(value["week_end"], "2025-01-12");
    }

    #[test]
    fn test_stored_round_trip() {
        let body = SummaryBody::Daily(DailyBody {
            date: "2025-01-05".into(),
            user_facts_explicit: vec!["我喜欢跑步".into()],
            ..Default::default()
        });
        let json = body.to_json().unwrap();
        assert_eq!(SummaryBody::from_stored(SummaryKind::Daily, &json).unwrap(), body);
    }

    #[test]
    fn test_daily_digest_drops_facts() {
        let daily = DailyBody {
            date: "2025-01-06".into(),
            topics: vec!["rust".into()],
            user_facts_explicit: vec!["我喜欢跑步".into()],
            ..Default::default()
        };
        let value = serde_json::to_value(DailyDigest::from(&daily)).unwrap();
        assert_eq!(value["topics"][0], "rust");
        assert!(value.get("user_facts_explicit").is_none());
        assert!(value.get("type").is_none());
    }
}
