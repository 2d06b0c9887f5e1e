//! 健康检查模块
//!
//! 该模块提供 Kubernetes 探针使用的 HTTP 接口：
//! - `/healthz`：进程存活即返回 200；
//! - `/readyz`：控制器开始运行后返回 200，否则返回 503。

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;

/// 健康检查服务器
pub struct HealthServer {
    /// 监听地址
    addr: SocketAddr,
    /// 控制器就绪标志
    ready: Arc<AtomicBool>,
}

impl HealthServer {
    /// 创建新的健康检查服务器
    pub fn new(addr: SocketAddr, ready: Arc<AtomicBool>) -> Self {
        Self { addr, ready }
    }

    /// 运行健康检查服务器
    pub async fn run(self) -> Result<()> {
        let ready = self.ready;
        let make_svc = make_service_fn(move |_| {
            let ready = ready.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let ready = ready.clone();
                    async move { Ok::<_, Infallible>(respond(req.uri().path(), &ready)) }
                }))
            }
        });

        let server = Server::try_bind(&self.addr)?.serve(make_svc);
        info!("健康检查服务器启动在 {}", self.addr);
        server.await?;

        Ok(())
    }
}

/// 根据请求路径生成探针响应
pub fn respond(path: &str, ready: &AtomicBool) -> Response<Body> {
    match path {
        "/healthz" => plain(StatusCode::OK, "ok"),
        "/readyz" if ready.load(Ordering::SeqCst) => plain(StatusCode::OK, "ok"),
        "/readyz" => plain(StatusCode::SERVICE_UNAVAILABLE, "not ready"),
        _ => plain(StatusCode::NOT_FOUND, "Not Found"),
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}
