//! 自定义资源定义模块
//!
//! 该模块定义了 JsonServer 自定义资源：期望状态为副本数和要提供的 JSON 文档，
//! 观测状态为同步结果与说明消息。

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JsonServer 期望状态
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "example.example.com",
    version = "v1",
    kind = "JsonServer",
    plural = "jsonservers",
    namespaced,
    status = "JsonServerStatus",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas","description":"Number of replicas"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.state","description":"Current status"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","description":"Status message"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct JsonServerSpec {
    /// 运行的实例数量
    #[schemars(range(min = 1))]
    pub replicas: i32,

    /// 要提供的 JSON 文档，原样写入 ConfigMap
    pub json_config: String,
}

/// 同步状态
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ServerState {
    /// 子资源已与期望状态一致
    Synced,
    /// 期望状态无效或协调失败
    Error,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Synced => write!(f, "Synced"),
            ServerState::Error => write!(f, "Error"),
        }
    }
}

/// JsonServer 观测状态
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct JsonServerStatus {
    /// 状态：Synced 或 Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ServerState>,

    /// 状态消息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JsonServerStatus {
    /// 创建新的状态
    pub fn new(state: ServerState, message: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            message: Some(message.into()),
        }
    }
}

impl JsonServer {
    /// 当前记录的状态是否已经等于目标状态
    pub fn status_matches(&self, desired: &JsonServerStatus) -> bool {
        self.status.as_ref() == Some(desired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_crd_generation() {
        let crd = JsonServer::crd();
        assert_eq!(crd.metadata.name.as_deref(), Some("jsonservers.example.example.com"));
        assert_eq!(crd.spec.group, "example.example.com");
        assert_eq!(crd.spec.names.kind, "JsonServer");
        assert_eq!(crd.spec.scope, "Namespaced");

        let version = &crd.spec.versions[0];
        assert_eq!(version.name, "v1");
        assert!(version.subresources.as_ref().and_then(|s| s.status.as_ref()).is_some());

        let columns: Vec<_> = version
            .additional_printer_columns
            .as_ref()
            .expect("printer columns")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(columns, vec!["Replicas", "Status", "Message", "Age"]);
    }

    #[test]
    fn test_replicas_minimum_in_schema() {
        let crd = JsonServer::crd();
        let schema = serde_json::to_value(&crd.spec.versions[0].schema).unwrap();
        let replicas = &schema["openAPIV3Schema"]["properties"]["spec"]["properties"]["replicas"];
        assert_eq!(replicas["minimum"], json!(1.0));

        let required = &schema["openAPIV3Schema"]["properties"]["spec"]["required"];
        assert_eq!(required, &json!(["jsonConfig", "replicas"]));
    }

    #[test]
    fn test_spec_uses_camel_case() {
        let spec: JsonServerSpec =
            serde_json::from_value(json!({"replicas": 2, "jsonConfig": "{}"})).unwrap();
        assert_eq!(spec.replicas, 2);
        assert_eq!(spec.json_config, "{}");
    }

    #[test]
    fn test_status_serialization() {
        let status = JsonServerStatus::new(ServerState::Error, "bad");
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"state": "Error", "message": "bad"})
        );
        assert_eq!(serde_json::to_value(JsonServerStatus::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_status_matches() {
        let mut server = JsonServer::new(
            "app-widget",
            JsonServerSpec {
                replicas: 1,
                json_config: "{}".to_string(),
            },
        );
        let synced = JsonServerStatus::new(ServerState::Synced, "ok");
        assert!(!server.status_matches(&synced));

        server.status = Some(synced.clone());
        assert!(server.status_matches(&synced));
        assert!(!server.status_matches(&JsonServerStatus::new(ServerState::Synced, "other")));
    }
}
