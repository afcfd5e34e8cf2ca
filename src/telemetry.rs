use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// 启动Prometheus指标导出
pub fn init_metrics(address: &str) -> Result<()> {
    let address: SocketAddr = address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {address}"))?;
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .context("安装Prometheus指标导出器失败")?;

    info!("Prometheus指标导出已启动: {address}");
    Ok(())
}
