//! JsonServer Operator - Kubernetes Operator 自动化管理 JsonServer 资源
//!
//! 该模块实现了 JsonServer 的 Kubernetes Operator：为每个 JsonServer 自定义资源
//! 维护一个 ConfigMap、一个 Deployment 和一个 Service，并通过准入 Webhook
//! 强制 `app-` 命名约定。

pub mod admission;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod health;
pub mod manifests;
pub mod reconcile;
pub mod resources;
pub mod server;
pub mod store;

use kube::Client;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::OperatorConfig;
use crate::error::Result;

/// Operator 主结构体
pub struct JsonServerOperator {
    /// Kubernetes 客户端
    client: Client,
    /// Operator 配置
    config: OperatorConfig,
}

impl JsonServerOperator {
    /// 创建新的 Operator 实例
    pub async fn new(config: OperatorConfig) -> Result<Self> {
        let client = Client::try_default().await?;

        Ok(Self { client, config })
    }

    /// 启动 Operator，直到控制器退出
    pub async fn run(self) -> Result<()> {
        let ready = Arc::new(AtomicBool::new(false));

        let health = health::HealthServer::new(self.config.health_addr, ready.clone());
        tokio::spawn(async move {
            if let Err(e) = health.run().await {
                error!("健康检查服务器错误: {}", e);
            }
        });

        if self.config.webhook.enabled {
            let webhook = server::WebhookServer::new(&self.config.webhook)?;
            tokio::spawn(async move {
                if let Err(e) = webhook.run().await {
                    error!("Webhook 服务器错误: {}", e);
                }
            });
        } else {
            info!("准入 Webhook 已禁用");
        }

        controller::Controller::new(self.client, &self.config, ready)
            .run()
            .await
    }
}
