//! JsonServer Common - 控制器与准入 Webhook 共享的校验规则
//!
//! 该模块提供 JsonServer Operator 各组件共享的纯函数校验规则与统一的错误类型，
//! 包括 JSON 文档校验和资源命名约定校验。

pub mod models;
pub mod error;

/// 重新导出常用类型，方便使用
pub use error::Error;
pub use error::Result;
pub use models::json_config::*;
pub use models::naming::*;
