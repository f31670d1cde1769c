//! Byte-budgeted chunking of rollup source material
//!
//! Units are never split: one raw-log line or one array item always lands in
//! exactly one chunk. A unit larger than the budget becomes a chunk of its own.

use serde::Serialize;

use crate::error::Result;

/// Split newline-delimited records into chunks of at most `max_bytes`.
///
/// Blank lines are dropped and every kept line ends with `\n`. A budget of
/// zero disables splitting. Returns no chunks when there are no records.
pub fn split_lines(raw: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let unit = line.len() + 1;
        if max_bytes > 0 && !current.is_empty() && current.len() + unit > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
        if max_bytes > 0 && current.len() > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Serialize `items` as compact JSON arrays of at most `max_bytes` each.
///
/// When the whole array fits it is returned as the only chunk. A budget of
/// zero disables splitting.
pub fn split_json_items<T: Serialize>(items: &[T], max_bytes: usize) -> Result<Vec<String>> {
    let encoded = items
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let whole = array_len(encoded.iter().map(String::len));
    if max_bytes == 0 || whole <= max_bytes || encoded.is_empty() {
        return Ok(vec![join_array(&encoded)]);
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 2;

    for item in &encoded {
        let add = item.len() + usize::from(!current.is_empty());
        if !current.is_empty() && current_len + add > max_bytes {
            chunks.push(join_array(&current));
            current.clear();
            current_len = 2;
        }
        current_len += item.len() + usize::from(!current.is_empty());
        current.push(item.as_str());
        if current_len > max_bytes {
            // A single oversized item, emitted alone
            chunks.push(join_array(&current));
            current.clear();
            current_len = 2;
        }
    }
    if !current.is_empty() {
        chunks.push(join_array(&current));
    }
    Ok(chunks)
}

fn array_len(items: impl Iterator<Item = usize>) -> usize {
    let (count, bytes) = items.fold((0usize, 0usize), |(n, b), len| (n + 1, b + len));
    2 + bytes + count.saturating_sub(1)
}

fn join_array<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(item.as_ref());
    }
    out.push(']');
    out
}
