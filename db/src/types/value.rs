//! Owned cell values.
//!
//! [`SqlValue`] is what `get_object` hands back: the cell's content tagged with
//! the storage class the engine chose for this particular row.

use std::fmt;

use serde::{Serialize, Serializer};

use super::ColumnType;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            SqlValue::Null => ColumnType::Null,
            SqlValue::Integer(_) => ColumnType::Integer,
            SqlValue::Float(_) => ColumnType::Float,
            SqlValue::Text(_) => ColumnType::Text,
            SqlValue::Blob(_) => ColumnType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    // Conversions below follow SQLite's column accessor rules: text is read
    // through its longest numeric prefix and NULL reads as zero or absent.

    pub fn coerce_i64(&self) -> i64 {
        match self {
            SqlValue::Null => 0,
            SqlValue::Integer(i) => *i,
            SqlValue::Float(f) => *f as i64,
            SqlValue::Text(s) => parse_integer_prefix(s),
            SqlValue::Blob(b) => parse_integer_prefix(&String::from_utf8_lossy(b)),
        }
    }

    pub fn coerce_f64(&self) -> f64 {
        match self {
            SqlValue::Null => 0.0,
            SqlValue::Integer(i) => *i as f64,
            SqlValue::Float(f) => *f,
            SqlValue::Text(s) => parse_real_prefix(s),
            SqlValue::Blob(b) => parse_real_prefix(&String::from_utf8_lossy(b)),
        }
    }

    pub fn coerce_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(format_real(*f)),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    pub fn coerce_bytes(&self) -> Option<Vec<u8>> {
        match self {
            SqlValue::Null => None,
            SqlValue::Blob(b) => Some(b.clone()),
            other => other.coerce_text().map(String::into_bytes),
        }
    }
}

/// Render a float the way SQLite does: integral values keep a `.0`.
pub fn format_real(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn numeric_prefix(text: &str) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if end > digits_start && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            while bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                exp += 1;
            }
            end = exp;
        }
    }
    &text[..end]
}

fn parse_real_prefix(text: &str) -> f64 {
    numeric_prefix(text).parse().unwrap_or(0.0)
}

fn parse_integer_prefix(text: &str) -> i64 {
    let prefix = numeric_prefix(text);
    prefix
        .parse::<i64>()
        .unwrap_or_else(|_| prefix.parse::<f64>().map_or(0, |f| f as i64))
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Blob(b) => write!(f, "x'{}'", hex::encode(b)),
        }
    }
}

/// Blobs serialize as lowercase hex so JSON output stays printable.
impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Float(v) => serializer.serialize_f64(*v),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(b) => serializer.serialize_str(&hex::encode(b)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SqlValue::Null, ColumnType::Null)]
    #[case(SqlValue::Integer(1), ColumnType::Integer)]
    #[case(SqlValue::Float(1.5), ColumnType::Float)]
    #[case(SqlValue::from("a"), ColumnType::Text)]
    #[case(SqlValue::Blob(vec![1]), ColumnType::Blob)]
    fn test_column_type(#[case] value: SqlValue, #[case] expected: ColumnType) {
        assert_eq!(value.column_type(), expected);
    }

    #[test]
    fn test_as_i64_truncates_float() {
        assert_eq!(SqlValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(SqlValue::from("2").as_i64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Blob(vec![0xde, 0xad]).to_string(), "x'dead'");
        assert_eq!(SqlValue::from("hello").to_string(), "hello");
    }

    #[test]
    fn test_serialize_json() {
        let values = vec![
            SqlValue::Null,
            SqlValue::Integer(7),
            SqlValue::from("x"),
            SqlValue::Blob(vec![0x01, 0xff]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,7,"x","01ff"]"#);
    }

    #[rstest]
    #[case("42", 42)]
    #[case("  -7 apples", -7)]
    #[case("3.9", 3)]
    #[case("1e3", 1000)]
    #[case("abc", 0)]
    #[case("", 0)]
    fn test_coerce_text_to_integer(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(SqlValue::from(text).coerce_i64(), expected);
    }

    #[rstest]
    #[case("2.5kg", 2.5)]
    #[case(".5", 0.5)]
    #[case("1e", 1.0)]
    #[case("x", 0.0)]
    fn test_coerce_text_to_real(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(SqlValue::from(text).coerce_f64(), expected);
    }

    #[rstest]
    #[case(SqlValue::Integer(12), Some("12"))]
    #[case(SqlValue::Float(3.0), Some("3.0"))]
    #[case(SqlValue::Float(0.25), Some("0.25"))]
    #[case(SqlValue::Blob(b"hi".to_vec()), Some("hi"))]
    #[case(SqlValue::Null, None)]
    fn test_coerce_text(#[case] value: SqlValue, #[case] expected: Option<&str>) {
        assert_eq!(value.coerce_text().as_deref(), expected);
    }

    #[test]
    fn test_coerce_bytes() {
        assert_eq!(SqlValue::Integer(5).coerce_bytes(), Some(b"5".to_vec()));
        assert_eq!(SqlValue::Null.coerce_bytes(), None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
    }
}
