//! JS string escaping for generated module source.
//!
//! Everything interpolated into generated code goes through one of these so
//! compiled CSS or a module name can never break out of its literal.

/// Escape a string for safe embedding inside a JS template literal (backtick string).
/// Escapes backticks, backslashes, and `${`.
pub fn escape_js_template_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => {
                out.push_str("\\${");
                chars.next();
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape a string for safe embedding inside a JS double-quoted string literal.
pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

/// `s` as a complete double-quoted JS string literal.
pub fn js_string_literal(s: &str) -> String {
    format!("\"{}\"", escape_js_string(s))
}
