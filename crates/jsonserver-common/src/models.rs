//! 数据模型模块
//!
//! 该模块定义了 JsonServer 资源的领域规则：JSON 文档格式校验和命名约定。

pub mod json_config;
pub mod naming;
