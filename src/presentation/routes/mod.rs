// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::orchestrator::controller::OrchestratorController;
use crate::presentation::handlers::orchestrator_handler;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 参数
///
/// * `controller` - 编排控制器
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(controller: Arc<OrchestratorController>) -> Router {
    Router::new()
        .route("/health", get(orchestrator_handler::health_check))
        .route(
            "/v1/orchestrator/start",
            post(orchestrator_handler::start_orchestrator),
        )
        .route(
            "/v1/orchestrator/stop",
            post(orchestrator_handler::stop_orchestrator),
        )
        .route(
            "/v1/orchestrator/status",
            get(orchestrator_handler::orchestrator_status),
        )
        .route(
            "/v1/missions/{id}/cancel",
            post(orchestrator_handler::cancel_mission),
        )
        .layer(Extension(controller))
        .layer(TraceLayer::new_for_http())
}
