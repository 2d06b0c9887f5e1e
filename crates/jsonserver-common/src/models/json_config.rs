//! JSON 文档校验
//!
//! JsonServer 的 `spec.jsonConfig` 字段必须是一个语法合法的 JSON 值。
//! 字段名虽然叫 config，但任何 JSON 值（对象、数组、标量）都被接受，
//! 这里只做语法校验，不关心文档内容。

use serde::de::IgnoredAny;

use crate::error::{Error, Result};

/// ConfigMap 中保存 JSON 文档的键名
pub const JSON_CONFIG_KEY: &str = "db.json";

/// 校验字符串是否为单个合法的 JSON 值
///
/// 允许前后空白；空字符串、截断的文档以及尾随的多余字符都会被拒绝。
pub fn validate_json(input: &str) -> Result<()> {
    serde_json::from_str::<IgnoredAny>(input)
        .map(|_| ())
        .map_err(|e| Error::InvalidJson {
            line: e.line(),
            column: e.column(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::object(r#"{"posts": [{"id": 1, "title": "hello"}]}"#)]
    #[case::empty_object("{}")]
    #[case::array("[1, 2, 3]")]
    #[case::string(r#""plain string""#)]
    #[case::number("42.5")]
    #[case::boolean("true")]
    #[case::null("null")]
    #[case::surrounding_whitespace("\n  {\"a\": 1}\t\n")]
    #[case::unicode(r#"{"名称": "测试"}"#)]
    fn test_valid_json(#[case] input: &str) {
        assert!(validate_json(input).is_ok(), "应该接受: {input}");
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace_only("   ")]
    #[case::truncated("{not valid")]
    #[case::unterminated_object(r#"{"a": 1"#)]
    #[case::wrong_brackets(r#"{"a": [1, 2}"#)]
    #[case::trailing_comma(r#"{"a": 1,}"#)]
    #[case::trailing_garbage(r#"{"a": 1} extra"#)]
    #[case::two_values("{} {}")]
    #[case::single_quotes("{'a': 1}")]
    #[case::bare_word("hello")]
    fn test_invalid_json(#[case] input: &str) {
        assert!(validate_json(input).is_err(), "应该拒绝: {input}");
    }

    #[test]
    fn test_invalid_json_reports_position() {
        let err = validate_json("{\n  \"a\": 1,\n}").unwrap_err();
        match err {
            Error::InvalidJson { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
