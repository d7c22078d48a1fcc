//! On-demand literal and regex search across a container's code and
//! resource entries, with bounded output per entry.

use std::borrow::Cow;

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::container::Apk;
use crate::error::DecodeResult;

/// Matches reported per entry are capped here so a pathological pattern
/// on a large binary stays interactive.
pub const MAX_MATCHES_PER_ENTRY: usize = 200;

const SNIPPET_RADIUS: usize = 40;

/// One search hit: entry name, byte offset into the entry's decoded
/// text, and a bounded context snippet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub entry: String,
    pub offset: usize,
    pub snippet: String,
}

impl SearchMatch {
    /// One-line display form.
    pub fn render(&self) -> String {
        format!("{} @ 0x{:x}: {}", self.entry, self.offset, self.snippet)
    }
}

/// Compiles the pattern, treating it as a literal unless `is_regex`.
/// Compilation happens before any entry is read, so an invalid pattern
/// aborts the whole search up front.
pub(crate) fn compile(pattern: &str, is_regex: bool) -> DecodeResult<Regex> {
    let source = if is_regex {
        Cow::Borrowed(pattern)
    } else {
        Cow::Owned(regex::escape(pattern))
    };
    Ok(Regex::new(&source)?)
}

/// Scans code and resource entries for the pattern. Binary payloads are
/// decoded best-effort (invalid byte runs replaced) before matching.
pub fn search(apk: &Apk, pattern: &str, is_regex: bool) -> DecodeResult<Vec<SearchMatch>> {
    let matcher = compile(pattern, is_regex)?;

    let mut results = Vec::new();
    for name in apk.entry_names().filter(|name| is_searchable(name)) {
        let bytes = match apk.read_entry(name) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("search skipping unreadable entry '{name}': {err}");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let mut count = 0;
        for m in matcher.find_iter(&text) {
            results.push(SearchMatch {
                entry: name.to_string(),
                offset: m.start(),
                snippet: snippet(&text, m.start(), m.end()),
            });
            count += 1;
            if count >= MAX_MATCHES_PER_ENTRY {
                debug!("match cap reached in '{name}'");
                break;
            }
        }
    }
    Ok(results)
}

/// Entries worth searching: executable code and resource blobs. The
/// container's own metadata is skipped.
fn is_searchable(name: &str) -> bool {
    if name.starts_with("META-INF/") {
        return false;
    }
    name.ends_with(".dex")
        || name == "resources.arsc"
        || name.starts_with("res/")
        || name.starts_with("assets/")
        || name.starts_with("lib/")
}

fn snippet(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_RADIUS);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + SNIPPET_RADIUS).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to]
        .chars()
        .map(|c| if c.is_control() || c == '\u{FFFD}' { ' ' } else { c })
        .collect()
}
