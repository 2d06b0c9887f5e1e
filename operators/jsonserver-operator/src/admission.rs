//! 准入 Webhook 模块
//!
//! JsonServer 在持久化之前会经过两个准入钩子：
//! - 默认值钩子（mutating）：为未设置的可选字段填充默认值，以 JSON Patch 返回改动；
//! - 校验钩子（validating）：创建和更新时强制 `app-` 命名约定，删除时直接放行。

use jsonserver_common::validate_name;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
    DynamicObject,
};
use tracing::{debug, info, warn};

use crate::crd::JsonServer;
use crate::error::Result;

/// 为 JsonServer 填充默认值
#[derive(Debug, Default, Clone)]
pub struct JsonServerDefaulter;

impl JsonServerDefaulter {
    /// 原地填充未设置的可选字段
    ///
    /// JsonServer 目前没有可选字段，因此不做任何修改。
    pub fn apply_defaults(&self, server: &mut JsonServer) {
        info!("为 JsonServer {} 填充默认值", server.metadata.name.as_deref().unwrap_or_default());
    }
}

/// 校验 JsonServer 的创建、更新和删除请求
#[derive(Debug, Default, Clone)]
pub struct JsonServerValidator;

impl JsonServerValidator {
    /// 创建时校验命名约定
    pub fn validate_create(&self, server: &JsonServer) -> jsonserver_common::Result<()> {
        let name = server.metadata.name.as_deref().unwrap_or_default();
        info!("校验 JsonServer {} 的创建请求", name);
        validate_name(name)
    }

    /// 更新时校验命名约定，规则与创建相同
    pub fn validate_update(
        &self,
        _old: &JsonServer,
        new: &JsonServer,
    ) -> jsonserver_common::Result<()> {
        let name = new.metadata.name.as_deref().unwrap_or_default();
        info!("校验 JsonServer {} 的更新请求", name);
        validate_name(name)
    }

    /// 删除请求不做校验
    pub fn validate_delete(&self, server: &JsonServer) -> jsonserver_common::Result<()> {
        info!(
            "校验 JsonServer {} 的删除请求",
            server.metadata.name.as_deref().unwrap_or_default()
        );
        Ok(())
    }
}

/// 处理 AdmissionReview 请求
#[derive(Debug, Default, Clone)]
pub struct AdmissionHandler {
    defaulter: JsonServerDefaulter,
    validator: JsonServerValidator,
}

impl AdmissionHandler {
    /// 创建新的准入处理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理默认值请求
    pub fn mutate(&self, review: AdmissionReview<DynamicObject>) -> AdmissionReview<DynamicObject> {
        let req: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(req) => req,
            Err(e) => {
                warn!("无效的准入请求: {}", e);
                return AdmissionResponse::invalid(e.to_string()).into_review();
            }
        };

        let res = AdmissionResponse::from(&req);
        let Some(obj) = &req.object else {
            return res.into_review();
        };

        let patch = match defaulting_patch(obj, |server| self.defaulter.apply_defaults(server)) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("为 {} 计算默认值失败: {}", req.name, e);
                return res.deny(e.to_string()).into_review();
            }
        };

        match patch {
            Some(patch) => match res.with_patch(patch) {
                Ok(res) => res.into_review(),
                Err(e) => AdmissionResponse::from(&req).deny(e.to_string()).into_review(),
            },
            None => res.into_review(),
        }
    }

    /// 处理校验请求
    pub fn validate(&self, review: AdmissionReview<DynamicObject>) -> AdmissionReview<DynamicObject> {
        let req: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(req) => req,
            Err(e) => {
                warn!("无效的准入请求: {}", e);
                return AdmissionResponse::invalid(e.to_string()).into_review();
            }
        };

        let res = AdmissionResponse::from(&req);
        match self.check(&req) {
            Ok(()) => {
                debug!("允许 {:?} {}", req.operation, req.name);
                res.into_review()
            }
            Err(reason) => {
                warn!("拒绝 {:?} {}: {}", req.operation, req.name, reason);
                res.deny(reason).into_review()
            }
        }
    }

    fn check(&self, req: &AdmissionRequest<DynamicObject>) -> std::result::Result<(), String> {
        match req.operation {
            Operation::Create => {
                let server = typed(req.object.as_ref())?;
                self.validator
                    .validate_create(&server)
                    .map_err(|e| e.to_string())
            }
            Operation::Update => {
                let new = typed(req.object.as_ref())?;
                let old = typed(req.old_object.as_ref())?;
                self.validator
                    .validate_update(&old, &new)
                    .map_err(|e| e.to_string())
            }
            Operation::Delete => match typed(req.old_object.as_ref()) {
                Ok(server) => self.validator.validate_delete(&server).map_err(|e| e.to_string()),
                Err(_) => Ok(()),
            },
            Operation::Connect => Ok(()),
        }
    }
}

/// 把动态对象解析为 JsonServer
fn typed(obj: Option<&DynamicObject>) -> std::result::Result<JsonServer, String> {
    let obj = obj.ok_or_else(|| "准入请求缺少对象".to_string())?;
    to_json_server(obj).map_err(|e| format!("无法解析 JsonServer: {e}"))
}

fn to_json_server(obj: &DynamicObject) -> Result<JsonServer> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// 计算默认值函数产生的 JSON Patch
///
/// 对象无法解析为 JsonServer 时不做修改，交给后续的 schema 校验拒绝。
/// 补丁只包含默认值函数改动过的字段。
pub fn defaulting_patch<F>(obj: &DynamicObject, defaults: F) -> Result<Option<json_patch::Patch>>
where
    F: FnOnce(&mut JsonServer),
{
    let mut server = match to_json_server(obj) {
        Ok(server) => server,
        Err(e) => {
            debug!("对象无法解析为 JsonServer，跳过默认值: {}", e);
            return Ok(None);
        }
    };

    let before = serde_json::to_value(&server)?;
    defaults(&mut server);
    let after = serde_json::to_value(&server)?;

    let patch = json_patch::diff(&before, &after);
    if patch.0.is_empty() {
        Ok(None)
    } else {
        Ok(Some(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn review(
        operation: &str,
        object: Option<Value>,
        old_object: Option<Value>,
    ) -> AdmissionReview<DynamicObject> {
        let name = object
            .as_ref()
            .or(old_object.as_ref())
            .and_then(|o| o["metadata"]["name"].as_str())
            .unwrap_or_default()
            .to_string();

        serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "example.example.com", "version": "v1", "kind": "JsonServer"},
                "resource": {"group": "example.example.com", "version": "v1", "resource": "jsonservers"},
                "requestKind": {"group": "example.example.com", "version": "v1", "kind": "JsonServer"},
                "requestResource": {"group": "example.example.com", "version": "v1", "resource": "jsonservers"},
                "name": name,
                "namespace": "default",
                "operation": operation,
                "userInfo": {"username": "admin"},
                "object": object,
                "oldObject": old_object,
                "dryRun": false
            }
        }))
        .unwrap()
    }

    fn server_json(name: &str) -> Value {
        json!({
            "apiVersion": "example.example.com/v1",
            "kind": "JsonServer",
            "metadata": {"name": name, "namespace": "default"},
            "spec": {"replicas": 1, "jsonConfig": "{}"}
        })
    }

    fn response(review: AdmissionReview<DynamicObject>) -> AdmissionResponse {
        review.response.expect("response")
    }

    #[test]
    fn test_create_without_prefix_is_denied() {
        let handler = AdmissionHandler::new();
        let res = response(handler.validate(review("CREATE", Some(server_json("widget")), None)));

        assert!(!res.allowed);
        assert!(res.result.message.contains("app-"));
        assert_eq!(res.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
    }

    #[test]
    fn test_create_with_prefix_is_allowed() {
        let handler = AdmissionHandler::new();
        let res = response(handler.validate(review("CREATE", Some(server_json("app-widget")), None)));
        assert!(res.allowed);
    }

    #[test]
    fn test_update_applies_same_rule() {
        let handler = AdmissionHandler::new();

        let denied = response(handler.validate(review(
            "UPDATE",
            Some(server_json("widget")),
            Some(server_json("widget")),
        )));
        assert!(!denied.allowed);

        let allowed = response(handler.validate(review(
            "UPDATE",
            Some(server_json("app-widget")),
            Some(server_json("app-widget")),
        )));
        assert!(allowed.allowed);
    }

    #[test]
    fn test_delete_is_always_allowed() {
        let handler = AdmissionHandler::new();
        let res = response(handler.validate(review("DELETE", None, Some(server_json("widget")))));
        assert!(res.allowed);
    }

    #[test]
    fn test_undecodable_object_is_denied() {
        let handler = AdmissionHandler::new();
        let broken = json!({
            "apiVersion": "example.example.com/v1",
            "kind": "JsonServer",
            "metadata": {"name": "app-widget"},
            "spec": {"replicas": "many"}
        });
        let res = response(handler.validate(review("CREATE", Some(broken), None)));
        assert!(!res.allowed);
    }

    #[test]
    fn test_review_without_request_is_invalid() {
        let handler = AdmissionHandler::new();
        let empty: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview"
        }))
        .unwrap();

        let res = response(handler.validate(empty));
        assert!(!res.allowed);
    }

    #[test]
    fn test_mutate_identity_produces_no_patch() {
        let handler = AdmissionHandler::new();
        let res = response(handler.mutate(review("CREATE", Some(server_json("app-widget")), None)));
        assert!(res.allowed);
        assert!(res.patch.is_none());
    }

    #[test]
    fn test_mutate_allows_unparsable_object() {
        let handler = AdmissionHandler::new();
        let partial = json!({
            "apiVersion": "example.example.com/v1",
            "kind": "JsonServer",
            "metadata": {"name": "app-widget"}
        });
        let res = response(handler.mutate(review("CREATE", Some(partial), None)));
        assert!(res.allowed);
        assert!(res.patch.is_none());
    }

    #[test]
    fn test_defaulting_patch_contains_only_changed_fields() {
        let obj: DynamicObject = serde_json::from_value(server_json("app-widget")).unwrap();
        let patch = defaulting_patch(&obj, |server| server.spec.replicas = 2)
            .unwrap()
            .expect("patch");

        let ops = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            ops,
            json!([{"op": "replace", "path": "/spec/replicas", "value": 2}])
        );
    }

    #[test]
    fn test_defaulter_is_identity() {
        let obj: DynamicObject = serde_json::from_value(server_json("app-widget")).unwrap();
        let defaulter = JsonServerDefaulter;
        assert!(defaulting_patch(&obj, |s| defaulter.apply_defaults(s)).unwrap().is_none());
    }
}
