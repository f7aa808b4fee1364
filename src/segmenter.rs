//! Newline-aligned, size-bounded content partitioning for remote analysis.
//!
//! The remote workflow has an input budget expressed in tokens; content is
//! split into segments whose character count stays under the derived limit,
//! preferring to cut right after a newline so segments stay line-aligned.
//! Segments always concatenate back to the exact original content.

use serde::Deserialize;

use crate::models::Segment;

const MIN_TOKEN_LIMIT: usize = 500;
const MIN_CHARS_PER_TOKEN: f64 = 1.0;
const MIN_SAFETY_MARGIN: f64 = 0.3;
const MAX_SAFETY_MARGIN: f64 = 1.0;
const MIN_MAX_CHARS: usize = 400;

/// A newline inside the window is honored only when it falls at or past
/// this fraction of the window.
const NEWLINE_CUT_FRACTION: f64 = 0.3;

/// Immutable sizing configuration, constructed once and passed in.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Remote input budget in tokens.
    pub token_limit: usize,
    /// Approximate characters represented by one token.
    pub chars_per_token: f64,
    /// Fraction of the theoretical budget actually used.
    pub safety_margin: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            token_limit: 3000,
            chars_per_token: 3.5,
            safety_margin: 0.9,
        }
    }
}

impl SegmenterConfig {
    /// Derived per-segment character budget, with every factor clamped to a
    /// safe minimum.
    pub fn max_chars(&self) -> usize {
        let tokens = self.token_limit.max(MIN_TOKEN_LIMIT) as f64;
        let cpt = self.chars_per_token.max(MIN_CHARS_PER_TOKEN);
        let margin = self
            .safety_margin
            .clamp(MIN_SAFETY_MARGIN, MAX_SAFETY_MARGIN);
        ((tokens * cpt * margin) as usize).max(MIN_MAX_CHARS)
    }
}

/// Split `text` into windows of at most `max_chars` characters, cutting
/// after the last newline of each window unless it falls in the leading 30%.
pub fn partition_content(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut rest = text;
    loop {
        // byte index one past the max_chars-th character, if the remainder
        // still exceeds the window
        let window_end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                if !rest.is_empty() {
                    segments.push(rest.to_string());
                }
                break;
            }
        };
        let window = &rest[..window_end];
        let cut = match window.rfind('\n') {
            Some(nl_idx) => {
                let nl_char_pos = window[..nl_idx].chars().count();
                if (nl_char_pos as f64) < (max_chars as f64) * NEWLINE_CUT_FRACTION {
                    window_end
                } else {
                    nl_idx + 1
                }
            }
            None => window_end,
        };
        segments.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    segments
}

/// Partition `text` per `config` and attach 1-based indexes, the total, and
/// original line ranges.
pub fn plan_segments(text: &str, config: &SegmenterConfig) -> Vec<Segment> {
    let parts = partition_content(text, config.max_chars());
    let total = parts.len();
    let mut start_line: u32 = 1;
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let newlines = part.bytes().filter(|b| *b == b'\n').count() as u32;
            let trailing = part.ends_with('\n') as u32;
            let segment = Segment {
                index: i + 1,
                total,
                start_line: Some(start_line),
                end_line: Some(start_line + newlines.saturating_sub(trailing)),
                text: part,
            };
            start_line += newlines;
            segment
        })
        .collect()
}
