//! Explicit user-fact extraction from adjacent conversation turns
//!
//! A fact is recorded only for a literal first-person statement by the user
//! (starting with 我, not a question, not a request) that the very next
//! assistant turn repeats back in second person. The heuristic misses facts
//! phrased any other way and may keep a statement the assistant merely
//! echoed; it is not meant to cover more than that pattern.

use crate::log_store::{RawRecord, Role};

const MAX_CORE_CHARS: usize = 20;

/// User turns that the following assistant turn affirmed, verbatim
pub fn extract_user_facts(records: &[RawRecord]) -> Vec<String> {
    records
        .windows(2)
        .filter(|pair| is_affirmed_fact(&pair[0], &pair[1]))
        .map(|pair| pair[0].content.clone())
        .collect()
}

fn is_affirmed_fact(user: &RawRecord, assistant: &RawRecord) -> bool {
    if user.role != Role::User || assistant.role != Role::Assistant {
        return false;
    }
    let u = normalize(&user.content);
    let a = normalize(&assistant.content);
    // Question marks are checked before normalization strips them
    looks_like_self_statement(&user.content) && looks_like_self_statement(&u) && assistant_affirms(&u, &a)
}

fn looks_like_self_statement(text: &str) -> bool {
    let text = text.trim();
    if !text.starts_with('我') {
        return false;
    }
    if text.ends_with('吗') || text.ends_with('?') || text.ends_with('？') {
        return false;
    }
    !(text.contains("帮我") || text.contains("请你"))
}

fn assistant_affirms(user_text: &str, assistant_text: &str) -> bool {
    if !assistant_text.contains('你') {
        return false;
    }
    let core = statement_core(user_text);
    !core.is_empty() && assistant_text.contains(&core)
}

/// The statement without its leading 我, edge punctuation trimmed, capped
fn statement_core(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_prefix('我').unwrap_or(text).trim();
    let text = text.trim_matches(|c| matches!(c, '。' | '！' | '!' | ' '));
    text.chars().take(MAX_CORE_CHARS).collect()
}

fn normalize(s: &str) -> String {
    s.trim().replace('，', ",").replace(['。', '！', '？'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(content: &str) -> RawRecord {
        RawRecord::new(Role::User, content)
    }

    fn assistant(content: &str) -> RawRecord {
        RawRecord::new(Role::Assistant, content)
    }

    #[test]
    fn test_affirmed_statement_is_extracted() {
        let records = vec![user("我喜欢跑步"), assistant("好的，你喜欢跑步，这是很好的习惯。")];
        assert_eq!(extract_user_facts(&records), vec!["我喜欢跑步".to_string()]);
    }

    #[test]
    fn test_fact_keeps_raw_user_text() {
        let records = vec![user("我住在上海。"), assistant("明白，你住在上海")];
        assert_eq!(extract_user_facts(&records), vec!["我住在上海。".to_string()]);
    }

    #[test]
    fn test_questions_and_requests_are_ignored() {
        let records = vec![
            user("我喜欢跑步吗"),
            assistant("你喜欢跑步吗"),
            user("我想请你帮我写代码"),
            assistant("你想请你帮我写代码"),
            user("我是谁？"),
            assistant("你是谁"),
        ];
        assert!(extract_user_facts(&records).is_empty());
    }

    #[test]
    fn test_requires_second_person_echo() {
        assert!(extract_user_facts(&[user("我喜欢跑步"), assistant("跑步很好")]).is_empty());
        assert!(extract_user_facts(&[user("我喜欢跑步"), assistant("你说得对")]).is_empty());
        assert!(extract_user_facts(&[assistant("你喜欢跑步"), user("我喜欢跑步")]).is_empty());
    }

    #[test]
    fn test_long_statement_core_is_capped() {
        let statement = "我每天早上六点起床然后去公园跑步十公里再回家吃早饭";
        let core: String = statement.chars().skip(1).take(20).collect();
        let records = vec![user(statement), assistant(&format!("你{}", core))];
        assert_eq!(extract_user_facts(&records).len(), 1);
    }
}
