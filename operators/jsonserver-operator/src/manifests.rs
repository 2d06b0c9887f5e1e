//! 部署清单生成模块
//!
//! 生成安装 Operator 所需的 CRD、ClusterRole 以及准入 Webhook 配置，
//! 供 `--print-crd` / `--print-manifests` 输出为 YAML。

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::CustomResourceExt;
use serde::Serialize;

use crate::config::WebhookConfig;
use crate::crd::JsonServer;
use crate::error::Result;
use crate::resources::MANAGER_NAME;
use crate::server::{MUTATE_PATH, VALIDATE_PATH};

/// 默认值 Webhook 名称
pub const MUTATING_WEBHOOK_NAME: &str = "mjsonserver-v1.kb.io";

/// 校验 Webhook 名称
pub const VALIDATING_WEBHOOK_NAME: &str = "vjsonserver-v1.kb.io";

const GROUP: &str = "example.example.com";
const CRUD_VERBS: &[&str] = &["get", "list", "watch", "create", "update", "patch", "delete"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(strings(resources)),
        verbs: strings(verbs),
        ..Default::default()
    }
}

/// Operator 需要的集群权限
pub fn cluster_role() -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(format!("{}-role", MANAGER_NAME)),
            ..Default::default()
        },
        rules: Some(vec![
            rule(GROUP, &["jsonservers"], CRUD_VERBS),
            rule(GROUP, &["jsonservers/status"], &["get", "update", "patch"]),
            rule(GROUP, &["jsonservers/finalizers"], &["update"]),
            rule("apps", &["deployments"], CRUD_VERBS),
            rule("", &["services", "configmaps"], CRUD_VERBS),
        ]),
        ..Default::default()
    }
}

fn client_config(config: &WebhookConfig, path: &str, ca_bundle: Option<&[u8]>) -> WebhookClientConfig {
    WebhookClientConfig {
        ca_bundle: ca_bundle.map(|ca| ByteString(ca.to_vec())),
        service: Some(ServiceReference {
            name: config.service_name.clone(),
            namespace: config.service_namespace.clone(),
            path: Some(path.to_string()),
            port: Some(443),
        }),
        url: None,
    }
}

fn jsonserver_rules() -> Option<Vec<RuleWithOperations>> {
    Some(vec![RuleWithOperations {
        api_groups: Some(vec![GROUP.to_string()]),
        api_versions: Some(vec!["v1".to_string()]),
        operations: Some(strings(&["CREATE", "UPDATE"])),
        resources: Some(vec!["jsonservers".to_string()]),
        ..Default::default()
    }])
}

/// 默认值 Webhook 配置
pub fn mutating_webhook_configuration(
    config: &WebhookConfig,
    ca_bundle: Option<&[u8]>,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(format!("{}-mutating-webhook-configuration", MANAGER_NAME)),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: MUTATING_WEBHOOK_NAME.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: client_config(config, MUTATE_PATH, ca_bundle),
            failure_policy: Some("Fail".to_string()),
            side_effects: "None".to_string(),
            rules: jsonserver_rules(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// 校验 Webhook 配置
pub fn validating_webhook_configuration(
    config: &WebhookConfig,
    ca_bundle: Option<&[u8]>,
) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(format!("{}-validating-webhook-configuration", MANAGER_NAME)),
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: VALIDATING_WEBHOOK_NAME.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: client_config(config, VALIDATE_PATH, ca_bundle),
            failure_policy: Some("Fail".to_string()),
            side_effects: "None".to_string(),
            rules: jsonserver_rules(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// JsonServer CRD 的 YAML
pub fn crd_yaml() -> Result<String> {
    Ok(serde_yaml::to_string(&JsonServer::crd())?)
}

/// 全部安装清单，以 `---` 分隔
pub fn all_manifests_yaml(config: &WebhookConfig, ca_bundle: Option<&[u8]>) -> Result<String> {
    let documents = vec![
        crd_yaml()?,
        to_yaml(&cluster_role())?,
        to_yaml(&mutating_webhook_configuration(config, ca_bundle))?,
        to_yaml(&validating_webhook_configuration(config, ca_bundle))?,
    ];

    Ok(documents.join("---\n"))
}

fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}
