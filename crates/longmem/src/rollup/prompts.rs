//! Prompt templates for each summary level
//!
//! Built-in templates can be overridden by `daily.txt`, `weekly.txt` and
//! `monthly.txt` in the prompt directory.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::period::{Period, SummaryKind};

pub const DAILY_PROMPT: &str = r#"You are a conversation log summarizer.
You are NOT an assistant, NOT an analyst, and NOT a memory writer.

CRITICAL RULES (must follow strictly):
- Do NOT guess, infer, or generate any facts about the user.
- Do NOT state the user's name, identity, background, or preferences.
- Do NOT repeat assistant self-introductions or model descriptions.
- Do NOT create memory candidates or long-term facts.
- If something cannot be confirmed from explicit user statements, ignore it.

Your job is ONLY to:
1. Describe what happened in today's conversations (behavior-level).
2. Identify recurring topics or patterns.
3. Note unresolved questions or friction.

OUTPUT FORMAT (JSON only, no markdown, no extra fields):

{
  "type": "daily",
  "date": "{{DATE}}",
  "topics": [],
  "patterns": [],
  "open_questions": [],
  "highlights": [],
  "lowlights": []
}

RAW CONVERSATION LOG (JSONL):
{{TRANSCRIPT}}
"#;

pub const WEEKLY_PROMPT: &str = r#"You are a strict summarizer.
You must output JSON only.

CRITICAL RULES:
- Do NOT infer or generate user identity or personal facts.
- Do NOT create memory candidates.
- Do NOT restate assistant or system information.
- Weekly summary is for trends and progress only.

GOAL:
Summarize patterns and progress from the past week based on daily summaries.

OUTPUT FORMAT (JSON only):

{
  "type": "weekly",
  "week_start": "{{WEEK_START}}",
  "week_end": "{{WEEK_END}}",
  "themes": [],
  "progress": [],
  "recurring_blockers": [],
  "notable_decisions": [],
  "next_week_focus": []
}

DAILY_SUMMARIES_JSON_ARRAY:
{{DAILY_JSON_ARRAY}}
"#;

pub const MONTHLY_PROMPT: &str = r#"You are a strict summarizer.
You must output JSON only.

CRITICAL RULES:
- Do NOT infer or generate user identity or personal facts.
- Do NOT create memory candidates.
- Do NOT restate assistant or system information.
- Monthly summary is for long-term trajectory only.

GOAL:
Summarize overall direction and themes for the month.

OUTPUT FORMAT (JSON only):

{
  "type": "monthly",
  "month": "{{MONTH}}",
  "month_start": "{{MONTH_START}}",
  "month_end": "{{MONTH_END}}",
  "trajectory": [],
  "top_themes": [],
  "wins": [],
  "losses": [],
  "systems_improvements": [],
  "next_month_bets": []
}

WEEKLY_SUMMARIES_JSON_ARRAY:
{{WEEKLY_JSON_ARRAY}}
"#;

#[derive(Debug, Clone)]
pub struct PromptSet {
    pub daily: String,
    pub weekly: String,
    pub monthly: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            daily: DAILY_PROMPT.to_string(),
            weekly: WEEKLY_PROMPT.to_string(),
            monthly: MONTHLY_PROMPT.to_string(),
        }
    }
}

impl PromptSet {
    /// Built-in templates, replaced by any readable override in `dir`
    pub fn load(dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            daily: read_override(dir, SummaryKind::Daily).unwrap_or(defaults.daily),
            weekly: read_override(dir, SummaryKind::Weekly).unwrap_or(defaults.weekly),
            monthly: read_override(dir, SummaryKind::Monthly).unwrap_or(defaults.monthly),
        }
    }

    /// Write the built-in templates to `dir`, leaving existing files alone
    pub fn write_defaults(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let defaults = Self::default();
        for kind in SummaryKind::ALL {
            let path = dir.join(file_name(kind));
            if !path.exists() {
                fs::write(&path, defaults.template(kind))?;
            }
        }
        Ok(())
    }

    pub fn template(&self, kind: SummaryKind) -> &str {
        match kind {
            SummaryKind::Daily => &self.daily,
            SummaryKind::Weekly => &self.weekly,
            SummaryKind::Monthly => &self.monthly,
        }
    }

    /// Prompt for one chunk of source material.
    ///
    /// With more than one chunk the material is labelled with its part number.
    pub fn render(&self, period: &Period, material: &str, part: usize, parts: usize) -> String {
        let material = if parts > 1 {
            match period.kind {
                SummaryKind::Daily => format!("【PART {}/{}】\n{}", part, parts, material),
                _ => format!("/* PART {}/{} */\n{}", part, parts, material),
            }
        } else {
            material.to_string()
        };

        let template = self.template(period.kind);
        match period.kind {
            SummaryKind::Daily => template.replace("{{DATE}}", &period.key).replace("{{TRANSCRIPT}}", &material),
            SummaryKind::Weekly => template
                .replace("{{WEEK_START}}", &period.start_str())
                .replace("{{WEEK_END}}", &period.end_str())
                .replace("{{DAILY_JSON_ARRAY}}", &material),
            SummaryKind::Monthly => template
                .replace("{{MONTH}}", &period.key)
                .replace("{{MONTH_START}}", &period.start_str())
                .replace("{{MONTH_END}}", &period.end_str())
                .replace("{{WEEKLY_JSON_ARRAY}}", &material),
        }
    }
}

/// Reducer prompt merging partial summaries of one period
pub fn merge_prompt(period: &Period, partials: &[String]) -> String {
    let mut b = String::new();
    b.push_str(&format!("You are a strict {} summary reducer.\n", period.kind));
    b.push_str(&format!(
        "Merge multiple partial {0} summaries into ONE final {0} summary.\n\n",
        period.kind
    ));
    b.push_str("CRITICAL RULES:\n");
    b.push_str("- Output JSON only.\n");
    b.push_str("- Do NOT add new facts.\n");
    b.push_str("- Do NOT infer user identity.\n");
    b.push_str("- Deduplicate and merge semantically.\n\n");

    b.push_str("OUTPUT FORMAT (JSON only):\n{\n");
    b.push_str(&format!("  \"type\": \"{}\",\n", period.kind));
    let (header, lists): (Vec<(&str, String)>, &[&str]) = match period.kind {
        SummaryKind::Daily => (
            vec![("date", period.key.clone())],
            &["topics", "patterns", "open_questions", "highlights", "lowlights"][..],
        ),
        SummaryKind::Weekly => (
            vec![
                ("week_key", period.key.clone()),
                ("week_start", period.start_str()),
                ("week_end", period.end_str()),
            ],
            &["themes", "progress", "recurring_blockers", "notable_decisions", "next_week_focus"][..],
        ),
        SummaryKind::Monthly => (
            vec![
                ("month", period.key.clone()),
                ("month_start", period.start_str()),
                ("month_end", period.end_str()),
            ],
            &["trajectory", "top_themes", "wins", "losses", "systems_improvements", "next_month_bets"][..],
        ),
    };
    for (name, value) in header {
        b.push_str(&format!("  \"{}\": \"{}\",\n", name, value));
    }
    let fields: Vec<String> = lists.iter().map(|name| format!("  \"{}\": []", name)).collect();
    b.push_str(&fields.join(",\n"));
    b.push_str("\n}\n\n");

    b.push_str(&format!("PARTIAL {} SUMMARIES:\n", period.kind.as_str().to_uppercase()));
    for (i, partial) in partials.iter().enumerate() {
        b.push_str(&format!("\n--- PART {}/{} ---\n", i + 1, partials.len()));
        b.push_str(partial.trim());
        b.push('\n');
    }
    b
}

fn file_name(kind: SummaryKind) -> String {
    format!("{}.txt", kind)
}

fn read_override(dir: &Path, kind: SummaryKind) -> Option<String> {
    let path = dir.join(file_name(kind));
    match fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => {
            debug!("Using prompt override {}", path.display());
            Some(text)
        }
        Ok(_) => None,
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Failed to read prompt override {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_daily_parts() {
        let prompts = PromptSet::default();
        let period = Period::parse(SummaryKind::Daily, "2025-01-05").unwrap();
        let single = prompts.render(&period, "LINE", 1, 1);
        assert!(single.contains("\"date\": \"2025-01-05\""));
        assert!(single.ends_with("LINE\n"));
        let part = prompts.render(&period, "LINE", 2, 3);
        assert!(part.contains("【PART 2/3】\nLINE"));
    }

    #[test]
    fn test_render_weekly_placeholders() {
        let prompts = PromptSet::default();
        let period = Period::parse(SummaryKind::Weekly, "2025-W02").unwrap();
        let text = prompts.render(&period, "[]", 1, 2);
        assert!(text.contains("\"week_start\": \"2025-01-06\""));
        assert!(text.contains("\"week_end\": \"2025-01-12\""));
        assert!(text.contains("/* PART 1/2 */\n[]"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn test_merge_prompt_lists_parts() {
        let period = Period::parse(SummaryKind::Monthly, "2025-01").unwrap();
        let text = merge_prompt(&period, &["{\"a\":1}".to_string(), " {\"b\":2} ".to_string()]);
        assert!(text.contains("--- PART 1/2 ---\n{\"a\":1}\n"));
        assert!(text.contains("--- PART 2/2 ---\n{\"b\":2}\n"));
        assert!(text.contains("\"month_end\": \"2025-01-31\""));
        assert!(text.contains("\"next_month_bets\": []\n}"));
    }

    #[test]
    fn test_overrides_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("weekly.txt"), "WEEK {{WEEK_START}} {{DAILY_JSON_ARRAY}}").unwrap();
        std::fs::write(dir.path().join("monthly.txt"), "   ").unwrap();
        let prompts = PromptSet::load(dir.path());
        assert_eq!(prompts.weekly, "WEEK {{WEEK_START}} {{DAILY_JSON_ARRAY}}");
        assert_eq!(prompts.monthly, MONTHLY_PROMPT);
        assert_eq!(prompts.daily, DAILY_PROMPT);

        PromptSet::write_defaults(dir.path()).unwrap();
        let reloaded = std::fs::read_to_string(dir.path().join("weekly.txt")).unwrap();
        assert!(reloaded.starts_with("WEEK"));
        assert!(dir.path().join("daily.txt").exists());
    }
}
