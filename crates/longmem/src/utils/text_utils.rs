//! Character-aware text helpers shared by the assistant and speech paths

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref MARKDOWN_REGEX: Regex = Regex::new(r"[`*_#>]|- ").unwrap();
}

pub struct TextUtils;

impl TextUtils {
    /// Truncate to at most `max_chars` characters, appending `…` when cut
    pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
        match text.char_indices().nth(max_chars) {
            None => Cow::Borrowed(text),
            Some((byte_pos, _)) => {
                let mut result = String::with_capacity(byte_pos + '…'.len_utf8());
                result.push_str(&text[..byte_pos]);
                result.push('…');
                Cow::Owned(result)
            }
        }
    }

    pub fn char_count(text: &str) -> usize {
        text.chars().count()
    }

    /// First line of trimmed text, without a leading list marker
    pub fn first_line(text: &str) -> &str {
        let text = text.trim();
        let line = text.split('\n').next().unwrap_or(text);
        line.strip_prefix("- ").unwrap_or(line)
    }

    /// Drop Markdown emphasis, heading, quote, code and list markers
    pub fn strip_markdown(text: &str) -> Cow<'_, str> {
        MARKDOWN_REGEX.replace_all(text, "")
    }

    /// Collapse runs of spaces and tabs; newlines are kept
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        if WHITESPACE_REGEX.find_iter(text).any(|m| m.as_str() != " ") {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").into_owned())
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Whitespace or punctuation only, including CJK and fullwidth punctuation
    pub fn is_punct_or_space(text: &str) -> bool {
        text.chars().all(|c| c.is_whitespace() || is_punctuation(c))
    }
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c as u32,
            0x2010..=0x2027 | 0x2030..=0x205E | 0x3001..=0x3003 | 0x3008..=0x3011 | 0x3014..=0x301F
                | 0xFF01..=0xFF0F | 0xFF1A..=0xFF20 | 0xFF3B..=0xFF40 | 0xFF5B..=0xFF65
        )
}
