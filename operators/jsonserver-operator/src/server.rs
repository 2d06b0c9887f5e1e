//! Webhook 服务器模块
//!
//! 该模块通过 HTTPS 对外提供准入 Webhook。配置了证书和私钥时使用 rustls 终止 TLS，
//! 否则退化为明文 HTTP（仅用于本地调试，API Server 只接受 HTTPS Webhook）。

use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::Http,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use kube::core::{
    admission::{AdmissionResponse, AdmissionReview},
    DynamicObject,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::convert::Infallible;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::admission::AdmissionHandler;
use crate::config::WebhookConfig;
use crate::error::{Error, Result};

/// 默认值 Webhook 路径
pub const MUTATE_PATH: &str = "/mutate-example-example-com-v1-jsonserver";

/// 校验 Webhook 路径
pub const VALIDATE_PATH: &str = "/validate-example-example-com-v1-jsonserver";

/// 准入 Webhook 服务器
pub struct WebhookServer {
    /// 监听地址
    addr: SocketAddr,
    /// TLS 配置，未配置时使用明文 HTTP
    tls: Option<Arc<ServerConfig>>,
    /// 准入处理器
    handler: Arc<AdmissionHandler>,
}

impl WebhookServer {
    /// 根据配置创建 Webhook 服务器，证书在此时加载
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let tls = match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => Some(load_tls_config(cert, key)?),
            _ => None,
        };

        Ok(Self {
            addr: config.addr,
            tls,
            handler: Arc::new(AdmissionHandler::new()),
        })
    }

    /// 运行 Webhook 服务器
    pub async fn run(self) -> Result<()> {
        match self.tls.clone() {
            Some(tls) => self.serve_tls(tls).await,
            None => self.serve_plain().await,
        }
    }

    async fn serve_tls(self, tls: Arc<ServerConfig>) -> Result<()> {
        let acceptor = TlsAcceptor::from(tls);
        let listener = TcpListener::bind(self.addr).await?;
        info!("Webhook 服务器启动在 https://{}", self.addr);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("接受连接失败: {}", e);
                    continue;
                }
            };

            let acceptor = acceptor.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                let stream = match acceptor.accept(stream).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        debug!("与 {} 的 TLS 握手失败: {}", peer, e);
                        return;
                    }
                };

                let service = service_fn(move |req: Request<Body>| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handle(req, handler).await) }
                });

                if let Err(e) = Http::new().serve_connection(stream, service).await {
                    debug!("与 {} 的连接异常结束: {}", peer, e);
                }
            });
        }
    }

    async fn serve_plain(self) -> Result<()> {
        let handler = self.handler;
        let make_svc = make_service_fn(move |_| {
            let handler = handler.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handle(req, handler).await) }
                }))
            }
        });

        let server = Server::try_bind(&self.addr)?.serve(make_svc);
        warn!("Webhook 服务器以明文 HTTP 启动在 {}", self.addr);
        server.await?;

        Ok(())
    }
}

/// 路由并处理一次 Webhook 请求
pub async fn handle(req: Request<Body>, handler: Arc<AdmissionHandler>) -> Response<Body> {
    let path = req.uri().path().to_string();
    if path != MUTATE_PATH && path != VALIDATE_PATH {
        return plain(StatusCode::NOT_FOUND, "Not Found");
    }
    if req.method() != Method::POST {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }

    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            warn!("读取 Webhook 请求体失败: {}", e);
            return plain(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    let review = match serde_json::from_slice::<AdmissionReview<DynamicObject>>(&body) {
        Ok(review) => review,
        Err(e) => {
            warn!("无法解析 AdmissionReview: {}", e);
            return json(&AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let reviewed = if path == MUTATE_PATH {
        handler.mutate(review)
    } else {
        handler.validate(review)
    };

    json(&reviewed)
}

fn json(review: &AdmissionReview<DynamicObject>) -> Response<Body> {
    match serde_json::to_vec(review) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("序列化 AdmissionReview 失败: {}", e);
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

/// 从 PEM 文件加载 TLS 服务端配置
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<std::result::Result<Vec<CertificateDer<'static>>, _>>()?;
    if certs.is_empty() {
        return Err(Error::Tls(format!("证书文件中没有证书: {}", cert_path.display())));
    }

    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
            .ok_or_else(|| Error::Tls(format!("私钥文件中没有私钥: {}", key_path.display())))?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    info!("已加载 Webhook 证书: {}", cert_path.display());
    Ok(Arc::new(config))
}
