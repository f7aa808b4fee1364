//! Offset-to-position mapping and source-line snippet extraction.
//!
//! Every rule reports its location through these two helpers, so they must
//! be exact across multi-line and CRLF-containing inputs. Offsets are byte
//! offsets into UTF-8 text; offsets beyond the text length clamp to the
//! final line.

/// Maximum snippet length before the ellipsis suffix is applied.
pub const SNIPPET_MAX_LEN: usize = 240;

/// Convert a 0-based byte offset to a 1-based `(line, column)` pair.
///
/// `line` is 1 plus the number of `\n` strictly before `offset`; `column`
/// counts from the byte after the last preceding newline.
pub fn offset_to_line_col(text: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(text.len());
    let bytes = text.as_bytes();
    let mut line: u32 = 1;
    let mut last_nl: Option<usize> = None;
    for (i, b) in bytes.iter().enumerate().take(offset) {
        if *b == b'\n' {
            line += 1;
            last_nl = Some(i);
        }
    }
    let line_start = last_nl.map(|i| i + 1).unwrap_or(0);
    let col = (offset - line_start) as u32 + 1;
    (line, col)
}

/// Return the full line containing `offset`, with any trailing `\r`
/// stripped and an `...` suffix when longer than `max_len` characters.
pub fn line_snippet(text: &str, offset: usize, max_len: usize) -> String {
    let offset = offset.min(text.len());
    let bytes = text.as_bytes();
    let start = bytes[..offset]
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = bytes[offset..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    let snippet = text[start..end].trim_end_matches('\r');
    truncate_chars(snippet, max_len)
}

/// Char-boundary-safe truncation with an `...` suffix.
pub fn truncate_chars(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_single_line() {
        assert_eq!(offset_to_line_col("SELECT 1", 0), (1, 1));
        assert_eq!(offset_to_line_col("SELECT 1", 7), (1, 8));
    }

    #[test]
    fn test_line_col_multiline_and_crlf() {
        let text = "line one\r\nline two\nline three";
        // 'l' of "line two" sits right after the \r\n pair
        let idx = text.find("line two").unwrap();
        assert_eq!(offset_to_line_col(text, idx), (2, 1));
        let idx3 = text.find("three").unwrap();
        assert_eq!(offset_to_line_col(text, idx3), (3, 6));
    }

    #[test]
    fn test_line_col_clamps_past_end() {
        let text = "a\nbc";
        assert_eq!(offset_to_line_col(text, 999), (2, 3));
    }

    #[test]
    fn test_snippet_extracts_full_line() {
        let text = "first\nSECOND LINE\r\nthird";
        let idx = text.find("COND").unwrap();
        assert_eq!(line_snippet(text, idx, SNIPPET_MAX_LEN), "SECOND LINE");
    }

    #[test]
    fn test_snippet_truncates_with_ellipsis() {
        let long = "x".repeat(300);
        let out = line_snippet(&long, 10, SNIPPET_MAX_LEN);
        assert_eq!(out.len(), SNIPPET_MAX_LEN + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_snippet_offset_on_newline() {
        let text = "ab\ncd";
        // offset pointing at the separator itself still yields the line before it
        assert_eq!(line_snippet(text, 2, SNIPPET_MAX_LEN), "ab");
    }
}
