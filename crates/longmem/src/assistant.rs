//! Memory-grounded question answering and chat
//!
//! `ask` answers only from retrieved summaries. `chat` is a regular
//! conversation turn whose system message carries today's summary, related
//! history and today's recent user lines; both turns are logged so they feed
//! the next daily rollup.

use chrono::{Local, NaiveDate};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::index::{SearchEngine, SearchHit};
use crate::llm::{ChatMessage, CompletionService};
use crate::log_store::{LogStore, RawRecord, Role};
use crate::memory_db::MemoryDatabase;
use crate::period::{SummaryKind, DATE_FORMAT};
use crate::speech::SpeechQueue;
use crate::utils::TextUtils;

pub const REFS_FLAG: &str = "--refs";
pub const NO_MEMORY_ANSWER: &str = "我没有在你的历史记录中找到相关内容，因此无法基于记忆回答这个问题。";
const MAX_APPENDIX_REFS: usize = 10;
const RECENT_RECORDS: usize = 20;

/// Where a context block came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    DailySummary,
    SearchHit,
    RecentRaw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub source: ContextSource,
    pub content: String,
}

pub struct Assistant {
    config: Config,
    db: Arc<MemoryDatabase>,
    log: Arc<LogStore>,
    search: Arc<SearchEngine>,
    completions: Arc<dyn CompletionService>,
    speech: Option<Arc<SpeechQueue>>,
}

impl Assistant {
    pub fn new(
        config: Config,
        db: Arc<MemoryDatabase>,
        log: Arc<LogStore>,
        search: Arc<SearchEngine>,
        completions: Arc<dyn CompletionService>,
    ) -> Self {
        Self { config, db, log, search, completions, speech: None }
    }

    pub fn with_speech(mut self, speech: Arc<SpeechQueue>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Log an explicit fact so the next daily rollup records it.
    /// Returns false for empty input.
    pub async fn remember(&self, fact: &str) -> Result<bool> {
        let fact = fact.trim();
        if fact.is_empty() {
            return Ok(false);
        }
        self.log.append(&RawRecord::user(format!("我确认一个事实：{}", fact))).await?;
        self.log.append(&RawRecord::assistant(format!("我理解了，你确认一个事实：{}", fact))).await?;
        info!("Remembered fact: {}", fact);
        Ok(true)
    }

    /// Log the retraction of an earlier fact. Returns false for empty input.
    pub async fn forget(&self, fact: &str) -> Result<bool> {
        let fact = fact.trim();
        if fact.is_empty() {
            return Ok(false);
        }
        self.log.append(&RawRecord::user(format!("我撤回之前的事实：{}", fact))).await?;
        self.log
            .append(&RawRecord::assistant(format!("我理解了，你撤回之前的事实：{}，它不再成立。", fact)))
            .await?;
        info!("Retracted fact: {}", fact);
        Ok(true)
    }

    /// Answer from stored summaries only. A `--refs` token anywhere in the
    /// input appends the numbered list of references.
    pub async fn ask(&self, input: &str) -> Result<String> {
        let (question, show_refs) = parse_ask_args(input);
        let hits = self
            .search
            .search(&question, self.config.search_top_k, self.config.search_min_score)
            .await?;
        let Some(top) = hits.first() else {
            debug!("No memory matched {:?}", question);
            return Ok(NO_MEMORY_ANSWER.to_string());
        };

        let mut memory = String::from("以下是我在你过去记录中找到的相关内容：\n\n");
        for hit in &hits {
            let _ = write!(memory, "- [{} {} | score {:.2}]\n{}\n\n", hit.period_key, hit.kind, hit.score, hit.text);
        }
        let answer = self.completions.complete_prompt(&ask_prompt(&memory, &question)).await?;

        let mut out = answer.clone();
        out.push_str("\n\n——\n");
        out.push_str(&top_reference(top));
        if show_refs {
            out.push_str(&format!("\n\n附录 · 相关记录（最多 {} 条）：\n", MAX_APPENDIX_REFS));
            for (i, hit) in hits.iter().take(MAX_APPENDIX_REFS).enumerate() {
                out.push_str(&reference_line(i + 1, hit));
                out.push('\n');
            }
        }

        if let Some(speech) = &self.speech {
            speech.speak(&answer);
        }
        Ok(out)
    }

    /// Context blocks for a chat turn on `today`: today's daily summary,
    /// related history other than today's daily, and today's recent user lines
    pub async fn chat_context(&self, today: NaiveDate, question: &str) -> Result<Vec<ContextBlock>> {
        let mut blocks = Vec::new();
        let today_key = today.format(DATE_FORMAT).to_string();

        match self.db.summaries.load_body(SummaryKind::Daily, &today_key) {
            Ok(Some(body)) => blocks.push(ContextBlock {
                source: ContextSource::DailySummary,
                content: format!("这是今天的对话摘要：\n{}", body.to_pretty_json()?),
            }),
            Ok(None) => {}
            Err(e) => warn!("Could not load today's summary: {}", e),
        }

        match self.search.search(question, self.config.search_top_k, self.config.search_min_score).await {
            Ok(hits) => {
                let lines: Vec<String> = hits
                    .iter()
                    .filter(|h| !(h.kind == SummaryKind::Daily && h.period_key == today_key))
                    .map(|h| format!("- {}", h.text.trim()))
                    .collect();
                if !lines.is_empty() {
                    blocks.push(ContextBlock {
                        source: ContextSource::SearchHit,
                        content: format!("这是你过去相关的问题和记录：\n{}", lines.join("\n")),
                    });
                }
            }
            Err(e) => warn!("Related-history search failed: {}", e),
        }

        let recent: Vec<String> = self
            .log
            .tail(today, RECENT_RECORDS)?
            .into_iter()
            .filter(|r| r.role == Role::User)
            .map(|r| format!("用户：{}", r.content.trim()))
            .collect();
        if !recent.is_empty() {
            blocks.push(ContextBlock {
                source: ContextSource::RecentRaw,
                content: format!("以下是最近的原始对话记录：\n{}", recent.join("\n")),
            });
        }

        Ok(blocks)
    }

    pub async fn chat(&self, input: &str) -> Result<String> {
        self.chat_on(Local::now().date_naive(), input).await
    }

    /// One chat turn dated `today`; both turns are appended to the day log
    pub async fn chat_on(&self, today: NaiveDate, input: &str) -> Result<String> {
        self.log.append_on(today, &RawRecord::user(input)).await?;

        let blocks = self.chat_context(today, input).await?;
        let mut system = String::from("以下是用户的对话历史与已知事实，请严格基于这些信息回答。\n\n");
        for block in &blocks {
            system.push_str(&block.content);
            system.push_str("\n\n");
        }

        let messages = [ChatMessage::system(system), ChatMessage::user(input)];
        let answer = self.completions.complete(&messages).await?;
        self.log.append_on(today, &RawRecord::assistant(answer.as_str())).await?;
        Ok(answer)
    }
}

/// Question text without the `--refs` flag, and whether the flag was present
pub fn parse_ask_args(input: &str) -> (String, bool) {
    let mut show_refs = false;
    let words: Vec<&str> = input
        .split_whitespace()
        .filter(|word| {
            let is_flag = *word == REFS_FLAG;
            show_refs |= is_flag;
            !is_flag
        })
        .collect();
    (words.join(" "), show_refs)
}

fn ask_prompt(memory: &str, question: &str) -> String {
    format!(
        "你是基于用户自身长期记忆的智能助理，而不是百科或搜索引擎。\n\n\
         【重要原则】\n\
         - 你只能基于用户自己的历史记录来回答\n\
         - 如果历史记录不足以支撑结论，请明确说明\n\
         - 不要假装知道用户未记录的事实\n\
         - 不要覆盖或否定用户过去的认知，只能在其基础上补充或整理\n\n\
         【用户的历史记录】\n{memory}\n\
         【用户当前的问题】\n{question}\n\n\
         【你的任务】\n\
         基于上述历史记录，用清晰、简洁、自然的语言回答问题。\n\
         如果记录中存在多个观点，请合并总结。\n\
         如果信息不足，请直接说明\"不足以回答\"。\n\n\
         请开始回答：\n"
    )
}

fn top_reference(hit: &SearchHit) -> String {
    format!("参考：你在 {} 的 {} 记录（{}）。", hit.period_key, hit.kind, TextUtils::first_line(&hit.text))
}

fn reference_line(index: usize, hit: &SearchHit) -> String {
    format!(
        "{}. [{:.2}] {} {} · {}",
        index,
        hit.score,
        hit.period_key,
        hit.kind,
        TextUtils::first_line(&hit.text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refs_flag_is_stripped_anywhere() {
        assert_eq!(parse_ask_args("我 喜欢 什么 --refs"), ("我 喜欢 什么".to_string(), true));
        assert_eq!(parse_ask_args("--refs  跑步  计划"), ("跑步 计划".to_string(), true));
        assert_eq!(parse_ask_args("跑步计划"), ("跑步计划".to_string(), false));
        assert_eq!(parse_ask_args("   "), (String::new(), false));
    }

    #[test]
    fn test_reference_formatting() {
        let hit = SearchHit {
            score: 0.8765,
            kind: SummaryKind::Weekly,
            period_key: "2025-W02".to_string(),
            text: "- 完成了跑步计划\n- 读完一本书".to_string(),
        };
        assert_eq!(top_reference(&hit), "参考：你在 2025-W02 的 weekly 记录（完成了跑步计划）。");
        assert_eq!(reference_line(3, &hit), "3. [0.88] 2025-W02 weekly · 完成了跑步计划");
    }
}
