//! 配置管理模块
//!
//! 该模块负责加载 Operator 配置。配置来源按优先级从低到高依次为：
//! 内置默认值、可选的 YAML/JSON 配置文件、`JSONSERVER_` 前缀的环境变量
//! （嵌套字段使用 `__` 分隔，例如 `JSONSERVER_WEBHOOK__ENABLED=false`）。

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::resources::{DEFAULT_IMAGE, MANAGER_NAME};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "JSONSERVER";

/// Operator 配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OperatorConfig {
    /// 只监听该命名空间，未设置时监听全部命名空间
    pub watch_namespace: Option<String>,
    /// json-server 容器镜像
    pub image: String,
    /// 服务端应用使用的字段管理者名称
    pub field_manager: String,
    /// 协调失败后重新入队的间隔（秒）
    pub error_requeue_secs: u64,
    /// 健康检查服务器监听地址
    pub health_addr: SocketAddr,
    /// 准入 Webhook 配置
    pub webhook: WebhookConfig,
}

/// 准入 Webhook 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    /// 是否启动 Webhook 服务器
    pub enabled: bool,
    /// 监听地址
    pub addr: SocketAddr,
    /// TLS 证书路径（PEM）
    pub cert_path: Option<PathBuf>,
    /// TLS 私钥路径（PEM）
    pub key_path: Option<PathBuf>,
    /// 指向 Webhook 的 Service 名称，用于生成 Webhook 配置清单
    pub service_name: String,
    /// 指向 Webhook 的 Service 所在命名空间
    pub service_namespace: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            image: DEFAULT_IMAGE.to_string(),
            field_manager: MANAGER_NAME.to_string(),
            error_requeue_secs: 30,
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: SocketAddr::from(([0, 0, 0, 0], 9443)),
            cert_path: Some(PathBuf::from("/tmp/k8s-webhook-server/serving-certs/tls.crt")),
            key_path: Some(PathBuf::from("/tmp/k8s-webhook-server/serving-certs/tls.key")),
            service_name: "jsonserver-operator-webhook-service".to_string(),
            service_namespace: "jsonserver-operator-system".to_string(),
        }
    }
}

impl OperatorConfig {
    /// 加载配置：默认值 → 配置文件 → 环境变量
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            let format = file_format(path)?;
            builder = builder.add_source(File::from(path).format(format).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let operator_config = config.try_deserialize::<OperatorConfig>()?;
        operator_config.validate()?;

        Ok(operator_config)
    }

    /// 校验配置一致性
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(invalid("image 不能为空"));
        }

        if self.field_manager.trim().is_empty() {
            return Err(invalid("field_manager 不能为空"));
        }

        if self.webhook.cert_path.is_some() != self.webhook.key_path.is_some() {
            return Err(invalid("webhook.cert_path 与 webhook.key_path 必须同时设置"));
        }

        Ok(())
    }

    /// 协调失败后的重新入队间隔
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}

/// 根据扩展名确定配置文件格式
fn file_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        Some("json") => Ok(FileFormat::Json),
        _ => Err(invalid(format!(
            "不支持的配置文件格式，仅支持 YAML 或 JSON: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "jsonserver-operator-{}-{}",
            std::process::id(),
            name
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_operator_config_default() {
        let config = OperatorConfig::default();
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert_eq!(config.field_manager, "jsonserver-operator");
        assert_eq!(config.error_requeue(), Duration::from_secs(30));
        assert!(config.webhook.enabled);
        assert_eq!(config.webhook.addr.port(), 9443);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_file_overrides_defaults() {
        let path = write_temp(
            "override.yaml",
            "watch_namespace: demo\nimage: registry.local/json-server:1\nwebhook:\n  enabled: false\n",
        );

        let config = OperatorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.watch_namespace.as_deref(), Some("demo"));
        assert_eq!(config.image, "registry.local/json-server:1");
        assert!(!config.webhook.enabled);
        // 未出现在文件中的字段保持默认值
        assert_eq!(config.error_requeue_secs, 30);
        assert_eq!(config.webhook.addr.port(), 9443);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_unsupported_file_format() {
        assert!(file_format(Path::new("operator.toml")).is_err());
        assert!(matches!(file_format(Path::new("a.yml")), Ok(FileFormat::Yaml)));
        assert!(matches!(file_format(Path::new("a.json")), Ok(FileFormat::Json)));
    }

    #[test]
    fn test_validate_rejects_half_configured_tls() {
        let mut config = OperatorConfig::default();
        config.webhook.key_path = None;
        assert!(config.validate().is_err());

        config.webhook.cert_path = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_image() {
        let config = OperatorConfig {
            image: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
