//! 集群访问模块
//!
//! 协调器对集群的全部读写都经过 [`ClusterStore`]：读取 JsonServer、
//! 以服务端应用（server-side apply）方式创建或更新子资源、更新状态子资源。
//! 服务端应用只接管清单中出现的字段，其他控制器写入的注解、
//! 默认值和状态都会被保留，且请求不携带 resourceVersion，不会产生乐观锁冲突。

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, Patch, PatchParams},
    client::Client,
    Resource,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::crd::{JsonServer, JsonServerStatus};
use crate::error::{Error, Result};

/// 资源键：命名空间 + 名称
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// 命名空间
    pub namespace: String,
    /// 名称
    pub name: String,
}

impl ResourceKey {
    /// 创建新的资源键
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// 从资源对象提取资源键
    pub fn from_resource<K: Resource>(resource: &K) -> Result<Self> {
        let meta = resource.meta();
        let name = meta
            .name
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.name"))?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// 协调器使用的集群操作
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// 读取 JsonServer，不存在时返回 `None`
    async fn get_server(&self, key: &ResourceKey) -> Result<Option<JsonServer>>;

    /// 创建或更新 ConfigMap
    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    /// 创建或更新 Deployment
    async fn apply_deployment(&self, deployment: &Deployment) -> Result<()>;

    /// 创建或更新 Service
    async fn apply_service(&self, service: &Service) -> Result<()>;

    /// 更新 JsonServer 的状态子资源
    async fn patch_status(&self, key: &ResourceKey, status: &JsonServerStatus) -> Result<()>;
}

/// 基于 kube 客户端的集群操作实现
#[derive(Clone)]
pub struct KubeClusterStore {
    /// Kubernetes 客户端
    client: Client,
    /// 服务端应用使用的字段管理者名称
    field_manager: String,
}

impl KubeClusterStore {
    /// 创建新的集群操作实现
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    /// 以服务端应用方式写入命名空间内的资源
    async fn apply<K>(&self, resource: &K) -> Result<()>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
        K: Clone + fmt::Debug + Serialize + DeserializeOwned,
    {
        let key = ResourceKey::from_resource(resource)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        let params = PatchParams::apply(&self.field_manager).force();

        debug!("应用 {} {}", K::kind(&()), key);
        api.patch(&key.name, &params, &Patch::Apply(resource)).await?;

        Ok(())
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get_server(&self, key: &ResourceKey) -> Result<Option<JsonServer>> {
        let api: Api<JsonServer> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        self.apply(config_map).await
    }

    async fn apply_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.apply(deployment).await
    }

    async fn apply_service(&self, service: &Service) -> Result<()> {
        self.apply(service).await
    }

    async fn patch_status(&self, key: &ResourceKey, status: &JsonServerStatus) -> Result<()> {
        let api: Api<JsonServer> = Api::namespaced(self.client.clone(), &key.namespace);
        let patch = serde_json::json!({ "status": status });

        api.patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!(
            "已更新 JsonServer {} 状态: {}",
            key,
            status.state.map(|s| s.to_string()).unwrap_or_default()
        );

        Ok(())
    }
}
