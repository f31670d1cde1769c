//! Background speech rendering
//!
//! Answers are spoken by a single consumer task fed through a bounded queue.
//! Submission never waits: when the queue is full the new item is dropped,
//! so the conversation path is never slowed by speech.

use async_trait::async_trait;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::utils::TextUtils;

/// Longest text spoken per request, in characters
pub const MAX_SPOKEN_CHARS: usize = 1200;
const MIN_SEGMENT_CHARS: usize = 8;
const MAX_SEGMENT_CHARS: usize = 240;

const REFERENCE_MARKERS: [&str; 3] = ["\nrefs", "\nreferences", "\nsources"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Chinese,
    English,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub lang: Lang,
    pub text: String,
}

#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    /// Speak one segment, returning when playback has finished
    async fn render(&self, segment: &Segment);
}

/// Discards everything; used when speech is disabled
pub struct NullRenderer;

#[async_trait]
impl SpeechRenderer for NullRenderer {
    async fn render(&self, _segment: &Segment) {}
}

/// Speaks through the platform's command-line synthesizer
/// (`say` on macOS, `espeak` on Linux)
pub struct CommandRenderer;

#[async_trait]
impl SpeechRenderer for CommandRenderer {
    async fn render(&self, segment: &Segment) {
        let Some(mut command) = synth_command(segment) else {
            return;
        };
        let result = tokio::task::spawn_blocking(move || {
            command.stdout(Stdio::null()).stderr(Stdio::null()).status()
        })
        .await;
        match result {
            Ok(Ok(status)) if !status.success() => debug!("Speech command exited with {}", status),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Speech command failed to start: {}", e),
            Err(e) => warn!("Speech task panicked: {}", e),
        }
    }
}

fn synth_command(segment: &Segment) -> Option<Command> {
    let mut command = if cfg!(target_os = "macos") {
        let mut command = Command::new("say");
        command.args(["-r", "180"]);
        if segment.lang == Lang::Chinese {
            command.args(["-v", "Tingting"]);
        }
        command
    } else if cfg!(target_os = "linux") {
        let mut command = Command::new("espeak");
        let voice = match segment.lang {
            Lang::Chinese => "zh",
            Lang::English => "en",
        };
        command.args(["-v", voice]);
        command
    } else {
        return None;
    };
    command.arg(segment.text.trim());
    Some(command)
}

pub struct SpeechQueue {
    sender: mpsc::Sender<String>,
    worker: JoinHandle<()>,
}

impl SpeechQueue {
    /// Start the consumer task. Must be called inside a tokio runtime.
    pub fn start(capacity: usize, renderer: Arc<dyn SpeechRenderer>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<String>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(text) = receiver.recv().await {
                for segment in segment_text(&text) {
                    renderer.render(&segment).await;
                }
            }
            debug!("Speech queue closed");
        });
        Self { sender, worker }
    }

    pub fn from_config(config: &Config) -> Self {
        let renderer: Arc<dyn SpeechRenderer> = if config.speech_enabled {
            info!("Speech enabled (queue capacity {})", config.speech_queue_capacity);
            Arc::new(CommandRenderer)
        } else {
            Arc::new(NullRenderer)
        };
        Self::start(config.speech_queue_capacity, renderer)
    }

    /// Queue `text` for speaking. Returns false when the text had nothing to
    /// speak or the queue was full.
    pub fn speak(&self, text: &str) -> bool {
        let prepared = prepare_for_speech(text);
        if prepared.is_empty() {
            return false;
        }
        match self.sender.try_send(prepared) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Speech queue full, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Stop accepting requests and wait for queued ones to finish
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            warn!("Speech worker ended abnormally: {}", e);
        }
    }
}

/// Reduce an answer to the part worth speaking
pub fn prepare_for_speech(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let text = cut_references(text);
    let text = TextUtils::strip_markdown(text);
    let text = TextUtils::normalize_whitespace(&text);
    TextUtils::truncate_chars(text.trim(), MAX_SPOKEN_CHARS).trim().to_string()
}

fn cut_references(text: &str) -> &str {
    // ASCII lowercasing keeps byte offsets aligned with `text`
    let lower = text.to_ascii_lowercase();
    REFERENCE_MARKERS
        .iter()
        .filter_map(|marker| lower.find(marker))
        .min()
        .map_or(text, |pos| text[..pos].trim())
}

/// Split prepared text into speakable single-language segments
pub fn segment_text(text: &str) -> Vec<Segment> {
    let segments = split_by_language(text);
    let segments = merge_short_segments(segments, MIN_SEGMENT_CHARS);
    let segments = split_long_segments(segments, MAX_SEGMENT_CHARS);
    segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty() && !TextUtils::is_punct_or_space(s.text.trim()))
        .collect()
}

fn classify(c: char) -> Option<Lang> {
    let code = c as u32;
    if (0x4E00..=0x9FFF).contains(&code) || (0x3400..=0x4DBF).contains(&code) || (0x3000..=0x303F).contains(&code) {
        Some(Lang::Chinese)
    } else if c.is_ascii_alphanumeric() {
        Some(Lang::English)
    } else {
        None
    }
}

fn split_by_language(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut current: Option<Lang> = None;

    for c in text.chars() {
        let Some(lang) = classify(c) else {
            buf.push(c);
            continue;
        };
        // digits follow the surrounding run
        if c.is_ascii_digit() {
            current.get_or_insert(Lang::English);
            buf.push(c);
            continue;
        }
        match current {
            Some(cur) if cur != lang => {
                segments.push(Segment { lang: cur, text: std::mem::take(&mut buf) });
                current = Some(lang);
            }
            None => current = Some(lang),
            _ => {}
        }
        buf.push(c);
    }
    if !buf.is_empty() {
        segments.push(Segment { lang: current.unwrap_or(Lang::English), text: buf });
    }
    segments
}

/// Punctuation-only and very short segments join the previous one
fn merge_short_segments(segments: Vec<Segment>, min_chars: usize) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        let trimmed = segment.text.trim();
        let absorb = TextUtils::is_punct_or_space(trimmed) || TextUtils::char_count(trimmed) < min_chars;
        match out.last_mut() {
            Some(previous) if absorb => previous.text.push_str(&segment.text),
            _ => out.push(segment),
        }
    }
    out
}

fn split_long_segments(segments: Vec<Segment>, max_chars: usize) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        if TextUtils::char_count(&segment.text) <= max_chars {
            out.push(segment);
            continue;
        }
        let chars: Vec<char> = segment.text.chars().collect();
        out.extend(chars.chunks(max_chars).map(|piece| Segment {
            lang: segment.lang,
            text: piece.iter().collect(),
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[test]
    fn test_prepare_cuts_references_and_markdown() {
        let text = "**答案**是跑步。\n\nReferences:\n1. 2025-01-05 daily";
        assert_eq!(prepare_for_speech(text), "答案是跑步。");
        assert_eq!(prepare_for_speech("   "), "");
    }

    #[test]
    fn test_prepare_caps_length() {
        let long = "好".repeat(MAX_SPOKEN_CHARS + 10);
        let prepared = prepare_for_speech(&long);
        assert_eq!(prepared.chars().count(), MAX_SPOKEN_CHARS + 1);
        assert!(prepared.ends_with('…'));
    }

    #[test]
    fn test_mixed_text_is_segmented_by_language() {
        let segments = segment_text("今天我们讨论了很多事情 then we wrote some Rust code 然后我们一起去公园跑步了。");
        let langs: Vec<Lang> = segments.iter().map(|s| s.lang).collect();
        assert_eq!(langs, vec![Lang::Chinese, Lang::English, Lang::Chinese]);
        assert!(segments[0].text.starts_with("今天"));
        assert!(segments[1].text.contains("Rust"));
    }

    #[test]
    fn test_short_segments_are_merged_backwards() {
        let segments = segment_text("我今天一直在学习编程 OK 然后继续学习新的内容");
        assert_eq!(segments.len(), 2);
        assert!(segments[0].text.contains("OK"));
        assert_eq!(segments[0].lang, Lang::Chinese);
    }

    #[test]
    fn test_long_segments_are_split() {
        let segments = segment_text(&"字".repeat(500));
        let sizes: Vec<usize> = segments.iter().map(|s| s.text.chars().count()).collect();
        assert_eq!(sizes, vec![240, 240, 20]);
    }

    #[test]
    fn test_punctuation_only_is_dropped() {
        assert!(segment_text("。。。 !!!").is_empty());
    }

    struct Recorder {
        spoken: Mutex<Vec<String>>,
        gate: Notify,
    }

    #[async_trait]
    impl SpeechRenderer for Recorder {
        async fn render(&self, segment: &Segment) {
            self.gate.notified().await;
            self.spoken.lock().unwrap().push(segment.text.clone());
        }
    }

    #[tokio::test]
    async fn test_queue_is_fifo_and_drops_when_full() {
        let recorder = Arc::new(Recorder { spoken: Mutex::new(Vec::new()), gate: Notify::new() });
        let queue = SpeechQueue::start(2, recorder.clone());

        assert!(queue.speak("first message here"));
        // let the worker take the first item and block on the gate
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(queue.speak("second message here"));
        assert!(queue.speak("third message here"));
        assert!(!queue.speak("fourth message here"));
        assert!(!queue.speak(""));

        for _ in 0..3 {
            recorder.gate.notify_one();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        queue.shutdown().await;

        let spoken = recorder.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec!["first message here", "second message here", "third message here"]);
    }
}
