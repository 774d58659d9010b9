// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rich-text style ranges.
//!
//! The platform attaches `[{start, len, st}]` ranges to text messages, where
//! `st` is a comma-separated list of style tokens. Offsets count characters.
//! [`segment`] cuts the text at every range edge and tags each piece with the
//! styles covering it; concatenating the pieces yields the original text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::raw;

/// One recognised style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum TextStyle {
    Bold,
    Italic,
    Underline,
    Strike,
    Color { value: String },
    Size { value: u32 },
    OrderedList,
    UnorderedList,
    Indent { level: u32 },
}

/// A parsed style range. Offsets are in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRange {
    pub start: usize,
    pub len: usize,
    pub styles: Vec<TextStyle>,
}

/// A run of text with uniform styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<TextStyle>,
}

/// Parses a single style token; unknown tokens yield `None`.
///
/// Both the compact wire form (`c_ff0000`, `f_18`) and the long form
/// (`color:ff0000`, `size:18`) are accepted.
pub fn parse_style_token(token: &str) -> Option<TextStyle> {
    let token = token.trim();
    match token {
        "b" => return Some(TextStyle::Bold),
        "i" => return Some(TextStyle::Italic),
        "u" => return Some(TextStyle::Underline),
        "s" => return Some(TextStyle::Strike),
        "lst_1" => return Some(TextStyle::OrderedList),
        "lst_2" => return Some(TextStyle::UnorderedList),
        _ => {}
    }

    if let Some(hex) = token
        .strip_prefix("c_")
        .or_else(|| token.strip_prefix("color:"))
    {
        let hex = hex.trim_start_matches('#');
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(TextStyle::Color {
                value: hex.to_ascii_lowercase(),
            });
        }
        return None;
    }
    if let Some(size) = token
        .strip_prefix("f_")
        .or_else(|| token.strip_prefix("size:"))
    {
        return size.parse().ok().map(|value| TextStyle::Size { value });
    }
    if let Some(level) = token.strip_prefix("ind_") {
        return level.parse().ok().map(|level| TextStyle::Indent { level });
    }
    None
}

/// Parses a comma-separated style string, dropping unknown tokens and duplicates.
pub fn parse_style_list(st: &str) -> Vec<TextStyle> {
    let mut styles = Vec::new();
    for style in st.split(',').filter_map(parse_style_token) {
        if !styles.contains(&style) {
            styles.push(style);
        }
    }
    styles
}

/// Reads style ranges from a JSON array, skipping malformed entries.
pub fn parse_ranges(value: &Value) -> Vec<StyleRange> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let start = raw::u64_field(item, &["start"])?;
            let len = raw::u64_field(item, &["len", "length"])?;
            let st = raw::str_field(item, &["st", "style"]).unwrap_or_default();
            Some(StyleRange {
                start: usize::try_from(start).ok()?,
                len: usize::try_from(len).ok()?,
                styles: parse_style_list(&st),
            })
        })
        .collect()
}

/// Cuts `text` at every range edge and attaches the covering styles.
///
/// Edges beyond the end of the text are clamped. Adjacent segments are not
/// merged, so segment boundaries are exactly the range edges.
pub fn segment(text: &str, ranges: &[StyleRange]) -> Vec<TextSegment> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }

    let mut edges = vec![0, n];
    for range in ranges {
        let start = range.start.min(n);
        let end = range.start.saturating_add(range.len).min(n);
        edges.push(start);
        edges.push(end);
    }
    edges.sort_unstable();
    edges.dedup();

    edges
        .windows(2)
        .map(|pair| {
            let (from, to) = (pair[0], pair[1]);
            let mut styles: Vec<TextStyle> = Vec::new();
            for range in ranges {
                let end = range.start.saturating_add(range.len);
                if range.start <= from && end >= to {
                    for style in &range.styles {
                        if !styles.contains(style) {
                            styles.push(style.clone());
                        }
                    }
                }
            }
            TextSegment {
                text: chars[from..to].iter().collect(),
                styles,
            }
        })
        .collect()
}
