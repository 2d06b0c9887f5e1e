//! 控制器模块
//!
//! 该模块把协调器挂接到 kube-rs 控制器运行时上：监听 JsonServer 以及它拥有的
//! ConfigMap、Deployment、Service，任一对象变化都会为对应的 JsonServer 触发协调。
//! 同一对象的协调由运行时串行执行，不同对象之间并发执行。

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller as KubeController},
        watcher,
    },
    Resource,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::OperatorConfig;
use crate::crd::JsonServer;
use crate::error::{Error, Result};
use crate::reconcile::Reconciler;
use crate::store::{KubeClusterStore, ResourceKey};

/// 控制器使用的协调器类型
pub type KubeReconciler = Reconciler<KubeClusterStore>;

/// 控制器结构体
pub struct Controller {
    /// Kubernetes 客户端
    client: Client,
    /// 协调器
    reconciler: Arc<KubeReconciler>,
    /// 只监听该命名空间
    namespace: Option<String>,
    /// 控制器是否已开始运行
    ready: Arc<AtomicBool>,
}

impl Controller {
    /// 创建新的控制器
    pub fn new(client: Client, config: &OperatorConfig, ready: Arc<AtomicBool>) -> Self {
        let store = KubeClusterStore::new(client.clone(), config.field_manager.clone());
        let reconciler = Reconciler::new(store)
            .with_image(config.image.clone())
            .with_error_requeue(config.error_requeue());

        Self {
            client,
            reconciler: Arc::new(reconciler),
            namespace: config.watch_namespace.clone(),
            ready,
        }
    }

    /// 运行控制器，直到收到 SIGTERM/SIGINT
    pub async fn run(self) -> Result<()> {
        let servers: Api<JsonServer> = self.api();
        let config_maps: Api<ConfigMap> = self.api();
        let deployments: Api<Deployment> = self.api();
        let services: Api<Service> = self.api();

        info!(
            "启动 JsonServer 控制器，监听命名空间: {}",
            self.namespace.as_deref().unwrap_or("全部")
        );

        let controller = KubeController::new(servers, watcher::Config::default())
            .owns(config_maps, watcher::Config::default())
            .owns(deployments, watcher::Config::default())
            .owns(services, watcher::Config::default())
            .shutdown_on_signal();

        self.ready.store(true, Ordering::SeqCst);

        controller
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|result| async move {
                match result {
                    Ok((obj, action)) => debug!("协调完成: {} ({:?})", obj, action),
                    Err(e) => error!("协调错误: {}", e),
                }
            })
            .await;

        self.ready.store(false, Ordering::SeqCst);
        info!("JsonServer 控制器已停止");

        Ok(())
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// 控制器运行时的协调入口
async fn reconcile(server: Arc<JsonServer>, reconciler: Arc<KubeReconciler>) -> Result<Action> {
    let key = ResourceKey::from_resource(server.as_ref())?;
    reconciler.reconcile(&key).await
}

/// 控制器运行时的错误处理入口
fn error_policy(server: Arc<JsonServer>, error: &Error, reconciler: Arc<KubeReconciler>) -> Action {
    reconciler.handle_error(server, error)
}
