//! JsonServer Operator 可执行入口

use anyhow::{Context, Result};
use clap::Parser;
use jsonserver_operator::{config::OperatorConfig, manifests, JsonServerOperator};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// JsonServer Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "jsonserver-operator")]
#[command(about = "Kubernetes operator for JsonServer resources")]
#[command(version)]
struct Args {
    /// 配置文件路径（YAML 或 JSON）
    #[arg(long, env = "JSONSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// 日志级别，RUST_LOG 优先
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// 以 JSON 格式输出日志
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    log_json: bool,

    /// 输出 CRD YAML 后退出
    #[arg(long)]
    print_crd: bool,

    /// 输出全部安装清单后退出
    #[arg(long)]
    print_manifests: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_crd {
        println!("{}", manifests::crd_yaml().context("生成 CRD 失败")?);
        return Ok(());
    }

    let config = OperatorConfig::load(args.config.as_deref()).context("加载配置失败")?;

    if args.print_manifests {
        let yaml = manifests::all_manifests_yaml(&config.webhook, None)
            .context("生成安装清单失败")?;
        println!("{}", yaml);
        return Ok(());
    }

    init_logging(&args);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = config.watch_namespace.as_deref().unwrap_or("all"),
        "启动 JsonServer Operator"
    );

    let operator = JsonServerOperator::new(config)
        .await
        .context("创建 Kubernetes 客户端失败")?;

    operator.run().await.context("Operator 运行失败")?;

    Ok(())
}

/// 初始化日志
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
