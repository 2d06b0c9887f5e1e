//! 资源协调模块
//!
//! 该模块负责协调 JsonServer 资源，确保 ConfigMap、Deployment 和 Service
//! 与 JsonServer 声明的期望状态一致，并把结果记录在状态子资源中。
//!
//! 协调流程：
//! 1. 读取 JsonServer，不存在则视为已删除（子资源由 owner reference 级联回收）；
//! 2. 校验 `spec.jsonConfig`，无效时记录 Error 状态并停止，不触发重试；
//! 3. 依次应用 ConfigMap → Deployment → Service；
//! 4. 任一应用失败时记录 Error 状态并返回错误，由控制器运行时重试；
//! 5. 全部成功时记录 Synced 状态。

use jsonserver_common::{validate_json, validate_name};
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{JsonServer, JsonServerStatus, ServerState};
use crate::error::Result;
use crate::resources::{ResourceBuilder, DEFAULT_IMAGE};
use crate::store::{ClusterStore, ResourceKey};

/// JSON 文档无效时的状态消息
pub const INVALID_JSON_MESSAGE: &str = "Error: spec.jsonConfig is not a valid json object";

/// 子资源应用失败时的状态消息
pub const APPLY_FAILED_MESSAGE: &str =
    "Error: unexpected failure while applying managed resources";

/// 协调成功时的状态消息
pub const SYNCED_MESSAGE: &str = "Synced successfully!";

/// 协调器结构体
pub struct Reconciler<S> {
    /// 集群操作
    store: S,
    /// json-server 容器镜像
    image: String,
    /// 协调失败后的重新入队间隔
    error_requeue: Duration,
}

impl<S: ClusterStore> Reconciler<S> {
    /// 创建新的协调器
    pub fn new(store: S) -> Self {
        Self {
            store,
            image: DEFAULT_IMAGE.to_string(),
            error_requeue: Duration::from_secs(30),
        }
    }

    /// 设置 json-server 容器镜像
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// 设置协调失败后的重新入队间隔
    pub fn with_error_requeue(mut self, error_requeue: Duration) -> Self {
        self.error_requeue = error_requeue;
        self
    }

    /// 协调指定的 JsonServer
    ///
    /// 幂等：重复调用只会在状态发生变化时写入状态子资源，
    /// 子资源通过服务端应用写入，内容不变时不会产生新的版本。
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<Action> {
        let server = match self.store.get_server(key).await? {
            Some(server) => server,
            None => {
                info!("JsonServer {} 不存在，视为已删除", key);
                return Ok(Action::await_change());
            }
        };

        info!("协调 JsonServer {}", key);

        if validate_name(&key.name).is_err() {
            warn!("JsonServer {} 的名称不符合 app- 命名约定", key);
        }

        if let Err(e) = validate_json(&server.spec.json_config) {
            warn!("JsonServer {} 的 jsonConfig 无效: {}", key, e);
            let status = JsonServerStatus::new(ServerState::Error, INVALID_JSON_MESSAGE);
            self.update_status(key, &server, &status).await?;
            return Ok(Action::await_change());
        }

        if let Err(e) = self.apply_resources(&server).await {
            error!("应用 JsonServer {} 的子资源失败: {}", key, e);
            let status = JsonServerStatus::new(ServerState::Error, APPLY_FAILED_MESSAGE);
            if let Err(status_err) = self.update_status(key, &server, &status).await {
                warn!("记录 JsonServer {} 的错误状态失败: {}", key, status_err);
            }
            return Err(e);
        }

        let status = JsonServerStatus::new(ServerState::Synced, SYNCED_MESSAGE);
        self.update_status(key, &server, &status).await?;

        info!("JsonServer {} 已同步", key);

        Ok(Action::await_change())
    }

    /// 依次应用 ConfigMap、Deployment、Service
    async fn apply_resources(&self, server: &JsonServer) -> Result<()> {
        let builder = ResourceBuilder::new(server)?.with_image(self.image.clone());

        self.store.apply_config_map(&builder.build_config_map()).await?;
        self.store.apply_deployment(&builder.build_deployment()).await?;
        self.store.apply_service(&builder.build_service()).await?;

        debug!("JsonServer {} 的子资源已全部应用", builder.name());

        Ok(())
    }

    /// 仅在状态发生变化时写入状态子资源
    async fn update_status(
        &self,
        key: &ResourceKey,
        server: &JsonServer,
        status: &JsonServerStatus,
    ) -> Result<()> {
        if server.status_matches(status) {
            debug!("JsonServer {} 状态未变化，跳过更新", key);
            return Ok(());
        }

        match self.store.patch_status(key, status).await {
            Err(e) if e.is_not_found() => {
                info!("JsonServer {} 在更新状态前已被删除", key);
                Ok(())
            }
            other => other,
        }
    }

    /// 处理错误：交给控制器运行时在固定间隔后重新入队
    pub fn handle_error(&self, server: Arc<JsonServer>, error: &crate::error::Error) -> Action {
        let key = ResourceKey::from_resource(server.as_ref())
            .map(|k| k.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());

        error!("协调 JsonServer {} 失败: {}", key, error);

        Action::requeue(self.error_requeue)
    }
}
