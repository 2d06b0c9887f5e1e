//! Kubernetes 资源构建模块
//!
//! 根据 JsonServer 生成期望的 ConfigMap、Deployment 和 Service 清单。
//! 所有构建函数都是纯函数：同样的输入总是得到同样的清单，
//! 真正写入集群由 [`crate::store::ClusterStore`] 通过服务端应用完成。

use jsonserver_common::JSON_CONFIG_KEY;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

use crate::crd::JsonServer;
use crate::error::{Error, Result};

/// 受管资源的 managed-by 标签值，同时也是服务端应用的字段管理者名称
pub const MANAGER_NAME: &str = "jsonserver-operator";

/// 默认的 json-server 容器镜像
pub const DEFAULT_IMAGE: &str = "clue/json-server:latest";

/// 容器名称
pub const CONTAINER_NAME: &str = "json-server";

/// 容器与 Service 暴露的端口
pub const HTTP_PORT: i32 = 3000;

/// 端口名称
pub const HTTP_PORT_NAME: &str = "http";

/// ConfigMap 卷名称
pub const CONFIG_VOLUME_NAME: &str = "json-config";

/// ConfigMap 在容器内的挂载目录
pub const CONFIG_MOUNT_PATH: &str = "/data";

/// 生成 JsonServer 子资源共享的标签
///
/// 这组标签同时用作 Deployment 和 Service 的选择器，创建后不能再改变。
pub fn labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), name.to_string()),
        ("managed-by".to_string(), MANAGER_NAME.to_string()),
    ])
}

/// 容器内 JSON 文档的完整路径
pub fn config_file_path() -> String {
    format!("{CONFIG_MOUNT_PATH}/{JSON_CONFIG_KEY}")
}

/// 根据 JsonServer 生成子资源的构建器
pub struct ResourceBuilder<'a> {
    server: &'a JsonServer,
    name: String,
    namespace: String,
    owner: OwnerReference,
    image: String,
}

impl<'a> ResourceBuilder<'a> {
    /// 创建新的构建器
    ///
    /// JsonServer 必须已经持久化（具有名称、命名空间和 UID），
    /// 否则无法生成指回它的 owner reference。
    pub fn new(server: &'a JsonServer) -> Result<Self> {
        let name = server
            .metadata
            .name
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.name"))?;
        let namespace = server
            .namespace()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let owner = server
            .controller_owner_ref(&())
            .ok_or(Error::MissingObjectKey("metadata.uid"))?;

        Ok(Self {
            server,
            name,
            namespace,
            owner,
            image: DEFAULT_IMAGE.to_string(),
        })
    }

    /// 使用指定的容器镜像
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// 子资源名称（与 JsonServer 同名）
    pub fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> ObjectMeta {
        let mut owner = self.owner.clone();
        owner.block_owner_deletion = Some(true);

        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(labels(&self.name)),
            owner_references: Some(vec![owner]),
            ..Default::default()
        }
    }

    /// 构建 ConfigMap：唯一的键保存原样的 JSON 文本
    pub fn build_config_map(&self) -> ConfigMap {
        ConfigMap {
            metadata: self.metadata(),
            data: Some(BTreeMap::from([(
                JSON_CONFIG_KEY.to_string(),
                self.server.spec.json_config.clone(),
            )])),
            ..Default::default()
        }
    }

    /// 构建 Deployment：挂载 ConfigMap 并以其中的文件启动 json-server
    pub fn build_deployment(&self) -> Deployment {
        let labels = labels(&self.name);

        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            args: Some(vec![
                "--watch".to_string(),
                config_file_path(),
                "--host".to_string(),
                "0.0.0.0".to_string(),
                "--port".to_string(),
                HTTP_PORT.to_string(),
            ]),
            ports: Some(vec![ContainerPort {
                name: Some(HTTP_PORT_NAME.to_string()),
                container_port: HTTP_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            volume_mounts: Some(vec![VolumeMount {
                name: CONFIG_VOLUME_NAME.to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let volume = Volume {
            name: CONFIG_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(self.name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        Deployment {
            metadata: self.metadata(),
            spec: Some(DeploymentSpec {
                replicas: Some(self.server.spec.replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes: Some(vec![volume]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// 构建 Service：单端口映射到容器端口
    pub fn build_service(&self) -> Service {
        Service {
            metadata: self.metadata(),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(labels(&self.name)),
                ports: Some(vec![ServicePort {
                    name: Some(HTTP_PORT_NAME.to_string()),
                    port: HTTP_PORT,
                    target_port: Some(IntOrString::Int(HTTP_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
