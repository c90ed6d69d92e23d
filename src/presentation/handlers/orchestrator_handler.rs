// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::orchestrator::controller::OrchestratorController;
use crate::orchestrator::OrchestratorError;

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// 启动编排器
pub async fn start_orchestrator(
    Extension(controller): Extension<Arc<OrchestratorController>>,
) -> impl IntoResponse {
    match controller.start().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "running": true }))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// 停止编排器
pub async fn stop_orchestrator(
    Extension(controller): Extension<Arc<OrchestratorController>>,
) -> impl IntoResponse {
    match controller.stop().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "running": false }))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// 读取编排器状态快照
pub async fn orchestrator_status(
    Extension(controller): Extension<Arc<OrchestratorController>>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(controller.status()))
}

/// 取消任务
pub async fn cancel_mission(
    Extension(controller): Extension<Arc<OrchestratorController>>,
    Path(mission_id): Path<Uuid>,
) -> impl IntoResponse {
    match controller.cancel_mission(mission_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "cancelled": true }))).into_response(),
        Err(OrchestratorError::MissionNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "mission not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
