//! 错误处理模块
//!
//! Operator 内部统一使用的错误类型。控制器运行时要求协调错误实现
//! `std::error::Error`，因此这里使用 thiserror 而不是 anyhow。

use thiserror::Error;

/// Operator 错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API 错误
    #[error("Kubernetes API 错误: {0}")]
    Kube(#[from] kube::Error),

    /// 资源缺少必要的元数据字段
    #[error("资源缺少字段: {0}")]
    MissingObjectKey(&'static str),

    /// 序列化/反序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML 序列化错误
    #[error("YAML 序列化错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 配置加载错误
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    /// TLS 证书加载错误
    #[error("TLS 错误: {0}")]
    Tls(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP 服务器错误
    #[error("HTTP 服务器错误: {0}")]
    Hyper(#[from] hyper::Error),
}

/// Operator 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 资源在集群中不存在
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    #[test]
    fn test_not_found_detection() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(500).is_not_found());
        assert!(!Error::MissingObjectKey("metadata.uid").is_not_found());
    }
}
