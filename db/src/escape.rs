//! Quoting helpers for SQL text built at runtime.

/// Wrap `s` in `quote_char`, doubling any embedded occurrence of it.
pub fn quote_with(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push(quote_char);
    for c in s.chars() {
        if c == quote_char {
            result.push(c);
        }
        result.push(c);
    }
    result.push(quote_char);
    result
}

/// Quote a table or column name: `my "col"` becomes `"my ""col"""`.
#[inline]
pub fn quote_identifier(s: &str) -> String {
    quote_with(s, '"')
}

/// Quote a string literal: `it's` becomes `'it''s'`.
#[inline]
pub fn quote_literal(s: &str) -> String {
    quote_with(s, '\'')
}
