//! 命名约定
//!
//! JsonServer 对象的名称必须以 `app-` 开头，准入 Webhook 在创建和更新时
//! 强制执行这一约定。

use crate::error::{Error, Result};

/// JsonServer 名称必须携带的前缀
pub const NAME_PREFIX: &str = "app-";

/// 校验资源名称是否符合 `app-${name}` 约定
pub fn validate_name(name: &str) -> Result<()> {
    if name.starts_with(NAME_PREFIX) {
        Ok(())
    } else {
        Err(Error::Naming(format!(
            "JsonServer name must follow the convention '{NAME_PREFIX}${{name}}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("app-widget")]
    #[case("app-")]
    #[case("app-a-b-c")]
    fn test_valid_names(#[case] name: &str) {
        assert!(validate_name(name).is_ok());
    }

    #[rstest]
    #[case("widget")]
    #[case("App-widget")]
    #[case("application")]
    #[case("my-app-widget")]
    #[case("")]
    fn test_invalid_names(#[case] name: &str) {
        let err = validate_name(name).unwrap_err();
        assert_eq!(
            err.to_string(),
            "JsonServer name must follow the convention 'app-${name}'"
        );
    }
}
