// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Prometheus导出器监听地址
const METRICS_ADDR: &str = "0.0.0.0:9000";

/// 安装Prometheus指标导出器
///
/// 编排计数器（会话创建/失败、抓取完成/失败、任务完成/失败/
/// 重试）都通过全局recorder上报，由这里的HTTP端点暴露
pub fn init_metrics() {
    let addr: SocketAddr = METRICS_ADDR.parse().expect("Invalid metrics address");

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        tracing::warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    info!("Metrics exporter listening on {}", addr);
}
