//! 错误处理模块
//!
//! 该模块提供 JsonServer 领域规则的统一错误类型，控制器和准入 Webhook
//! 都基于这些错误生成状态消息或拒绝原因。

use thiserror::Error;

/// JsonServer 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// JSON 文档无法解析
    #[error("无效的 JSON 文档 (第 {line} 行, 第 {column} 列): {reason}")]
    InvalidJson {
        /// 出错行号
        line: usize,
        /// 出错列号
        column: usize,
        /// 解析器给出的原因
        reason: String,
    },

    /// 资源名称不符合命名约定
    #[error("{0}")]
    Naming(String),
}

/// JsonServer 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;
