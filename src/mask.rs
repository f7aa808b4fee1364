//! Masking of comment and string literals.
//!
//! Rule patterns scan the masked text so they cannot fire inside comments or
//! string literals. Masked spans are overwritten with spaces while every
//! `\n` is preserved, so the masked text has identical byte length and line
//! breaks to the original and matched offsets remain valid offsets into the
//! original text.

use regex::Regex;

/// Mask block comments (`/* ... */`), line comments (`-- ...`), and
/// single/double-quoted strings (doubled-quote escaping), one pattern at a
/// time.
pub fn mask_comments_and_strings(sql: &str) -> String {
    let mut masked = mask_block_comments(sql);
    for pattern in [
        r"(?m)--.*?$",
        r"(?s)'(?:''|[^'])*'",
        r#"(?s)"(?:""|[^"])*""#,
    ] {
        let re = Regex::new(pattern).expect("valid mask pattern");
        masked = mask_pattern(&masked, &re);
    }
    masked
}

/// Mask only block comments. `DELETE ... ;` spans may legitimately cross
/// line comments, so some callers need this narrower mask.
pub fn mask_block_comments(sql: &str) -> String {
    let re = Regex::new(r"(?s)/\*.*?\*/").expect("valid mask pattern");
    mask_pattern(sql, &re)
}

/// Replace every match of `re` with spaces, keeping `\n` bytes in place.
/// Zero-length matches force the cursor forward to avoid an infinite loop.
fn mask_pattern(text: &str, re: &Regex) -> String {
    let mut out = text.as_bytes().to_vec();
    let mut pos = 0usize;
    while pos <= text.len() {
        let m = match re.find_at(text, pos) {
            Some(m) => m,
            None => break,
        };
        for b in &mut out[m.start()..m.end()] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
        pos = if m.end() > m.start() {
            m.end()
        } else {
            // empty match: step past the next char boundary
            let mut next = m.end() + 1;
            while next < text.len() && !text.is_char_boundary(next) {
                next += 1;
            }
            next
        };
    }
    // only ASCII spaces were written over complete match spans
    String::from_utf8(out).expect("masking preserves utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn newline_count(s: &str) -> usize {
        s.bytes().filter(|b| *b == b'\n').count()
    }

    #[test]
    fn test_mask_preserves_length_and_newlines() {
        let sql = "SELECT 'a\nb' /* block\ncomment */ FROM t -- tail\n;";
        let masked = mask_comments_and_strings(sql);
        assert_eq!(masked.len(), sql.len());
        assert_eq!(newline_count(&masked), newline_count(sql));
    }

    #[test]
    fn test_block_comment_body_blanked() {
        let sql = "A /* DELETE FROM t */ B";
        let masked = mask_comments_and_strings(sql);
        assert!(!masked.contains("DELETE"));
        assert!(masked.starts_with("A "));
        assert!(masked.ends_with(" B"));
    }

    #[test]
    fn test_line_comment_blanked_per_line() {
        let sql = "SELECT 1 -- CREATE TABLE X\nSELECT 2";
        let masked = mask_comments_and_strings(sql);
        assert!(!masked.contains("CREATE"));
        assert!(masked.contains("SELECT 2"));
    }

    #[test]
    fn test_doubled_quote_escaping() {
        let sql = "INSERT INTO t VALUES ('it''s a DELETE FROM trap')";
        let masked = mask_comments_and_strings(sql);
        assert!(!masked.contains("DELETE"));
        // the literal is one string; nothing after it got eaten
        assert_eq!(masked.len(), sql.len());
    }

    #[test]
    fn test_double_quoted_identifiers_masked() {
        let sql = r#"SELECT "列名" FROM T_A"#;
        let masked = mask_comments_and_strings(sql);
        assert!(!masked.contains("列名"));
        assert!(masked.contains("FROM T_A"));
        assert_eq!(masked.len(), sql.len());
    }

    #[test]
    fn test_mask_block_comments_keeps_line_comments() {
        let sql = "/* x */ -- y";
        let masked = mask_block_comments(sql);
        assert!(masked.contains("-- y"));
        assert!(!masked.contains('x'));
    }
}
