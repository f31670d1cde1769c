mod common;

use chrono::Local;
use common::*;
use serde_json::json;

use longmem::assistant::{ContextSource, NO_MEMORY_ANSWER};
use longmem::log_store::{read_day, RawRecord};
use longmem::{Period, SummaryBody, SummaryKind};

fn daily_with_vector(h: &Harness, day: &str, highlight: &str, vector: &[f32]) {
    let period = Period::parse(SummaryKind::Daily, day).unwrap();
    let id = store_summary(&h.engine.db, &period, &json!({ "type": "daily", "date": day, "highlights": [highlight] }));
    h.engine.db.embeddings.insert(id, EMBED_MODEL, vector).unwrap();
}

#[tokio::test]
async fn test_ask_without_memory_does_not_call_the_model() {
    let h = harness(FakeCompletions::answering("不该出现"));

    let answer = h.engine.assistant.ask("我喜欢什么运动").await.unwrap();
    assert_eq!(answer, NO_MEMORY_ANSWER);
    assert_eq!(h.completions.calls(), 0);
}

#[tokio::test]
async fn test_ask_appends_references() {
    let h = harness(FakeCompletions::answering("你喜欢跑步。"));
    daily_with_vector(&h, "2025-01-05", "ran 5k", &[1.0, 0.0, 0.0]);
    daily_with_vector(&h, "2025-01-04", "swam", &[1.0, 1.0, 0.0]);

    let answer = h.engine.assistant.ask("我喜欢什么运动").await.unwrap();
    assert!(answer.starts_with("你喜欢跑步。\n\n——\n"));
    assert!(answer.ends_with("参考：你在 2025-01-05 的 daily 记录（ran 5k）。"));
    assert!(!answer.contains("附录"));

    let prompt = &h.completions.prompts()[0];
    assert!(prompt.contains("- [2025-01-05 daily | score 1.00]\n- ran 5k"));
    assert!(prompt.contains("我喜欢什么运动"));

    let with_refs = h.engine.assistant.ask("--refs 我喜欢什么运动").await.unwrap();
    assert!(with_refs.contains("附录"));
    assert!(with_refs.contains("1. [1.00] 2025-01-05 daily · ran 5k\n"));
    assert!(with_refs.contains("2. [0.71] 2025-01-04 daily · swam\n"));
    assert!(!h.completions.prompts()[1].contains("--refs"));
}

#[tokio::test]
async fn test_ask_propagates_model_failure() {
    let h = harness(FakeCompletions::unreachable());
    daily_with_vector(&h, "2025-01-05", "ran 5k", &[1.0, 0.0, 0.0]);

    let err = h.engine.assistant.ask("跑步").await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_chat_context_blocks() {
    let h = harness(FakeCompletions::answering("你最近在练跑步。"));
    let today = date("2025-01-05");
    daily_with_vector(&h, "2025-01-05", "ran 5k", &[1.0, 0.0, 0.0]);
    daily_with_vector(&h, "2025-01-03", "ran 3k", &[1.0, 0.1, 0.0]);
    h.engine.log.append_on(today, &RawRecord::user("早上跑了五公里")).await.unwrap();
    h.engine.log.append_on(today, &RawRecord::assistant("很棒")).await.unwrap();

    let blocks = h.engine.assistant.chat_context(today, "我最近在练什么").await.unwrap();
    let sources: Vec<ContextSource> = blocks.iter().map(|b| b.source).collect();
    assert_eq!(sources, vec![ContextSource::DailySummary, ContextSource::SearchHit, ContextSource::RecentRaw]);

    assert!(blocks[0].content.contains("\"date\": \"2025-01-05\""));
    assert!(blocks[1].content.contains("- ran 3k"));
    assert!(!blocks[1].content.contains("ran 5k"));
    assert!(blocks[2].content.contains("用户：早上跑了五公里"));
    assert!(!blocks[2].content.contains("很棒"));
}

#[tokio::test]
async fn test_chat_logs_both_turns() {
    let h = harness(FakeCompletions::answering("你最近在练跑步。"));
    let today = date("2025-01-05");
    daily_with_vector(&h, "2025-01-03", "ran 3k", &[1.0, 0.0, 0.0]);

    let answer = h.engine.assistant.chat_on(today, "我最近在练什么").await.unwrap();
    assert_eq!(answer, "你最近在练跑步。");

    let records = read_day(&h.engine.config.log_dir, today).unwrap();
    assert_eq!(records, vec![RawRecord::user("我最近在练什么"), RawRecord::assistant("你最近在练跑步。")]);

    let requests = h.completions.requests.lock().unwrap();
    let messages = &requests[0];
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "system");
    assert!(messages[0].content.contains("- ran 3k"));
    assert!(messages[0].content.contains("用户：我最近在练什么"));
    assert_eq!(messages[1].role, "user");
    assert_eq!(messages[1].content, "我最近在练什么");
}

#[tokio::test]
async fn test_remembered_fact_reaches_the_daily_summary() {
    let h = harness(FakeCompletions::answering(DAILY_JSON));

    assert!(!h.engine.assistant.remember("   ").await.unwrap());
    assert!(h.engine.assistant.remember("每天早上跑步").await.unwrap());

    let today = Local::now().date_naive();
    let key = today.format("%Y-%m-%d").to_string();
    h.engine.rollups.ensure(SummaryKind::Daily, &key, false).await.unwrap();

    let body = h.engine.db.summaries.load_body(SummaryKind::Daily, &key).unwrap().unwrap();
    let SummaryBody::Daily(daily) = body else { panic!("wrong body type") };
    assert_eq!(daily.user_facts_explicit, vec!["我确认一个事实：每天早上跑步"]);
}

#[tokio::test]
async fn test_forget_logs_a_retraction() {
    let h = harness(FakeCompletions::answering(DAILY_JSON));

    assert!(!h.engine.assistant.forget("").await.unwrap());
    assert!(h.engine.assistant.forget("每天早上跑步").await.unwrap());

    let records = read_day(&h.engine.config.log_dir, Local::now().date_naive()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].content, "我撤回之前的事实：每天早上跑步");
    assert!(records[1].content.contains("它不再成立"));
}
