//! 动作与执行历史的 HTTP 处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{error::AppError, middleware::AppState, models::action::*};

// ==================== Actions ====================

/// 列出动作
pub async fn list_actions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let actions = state.action_service.list_actions().await?;

    Ok(Json(json!({
        "actions": actions,
        "count": actions.len()
    })))
}

/// 创建动作
pub async fn create_action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = state.action_service.create_action(req).await?;

    Ok((StatusCode::CREATED, Json(action)))
}

/// 获取动作
pub async fn get_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let action = state.action_service.get_action(id).await?;

    Ok(Json(action))
}

/// 更新动作
pub async fn update_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = state.action_service.update_action(id, req).await?;

    Ok(Json(action))
}

/// 删除动作
pub async fn delete_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.action_service.delete_action(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 执行动作
///
/// 进程失败同样返回 200，结果看记录中的 status 和 exit_code。
pub async fn run_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<RunActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let run = state
        .action_service
        .run(id, &req.server_name, req.dry_run)
        .await?;

    Ok(Json(run))
}

// ==================== Runs ====================

/// 某个动作的执行历史
pub async fn list_action_runs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<RunListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let runs = state
        .action_service
        .list_runs_for_action(id, query.limit)
        .await?;

    Ok(Json(json!({
        "runs": runs,
        "count": runs.len()
    })))
}

/// 最近的执行历史
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let runs = state.action_service.list_runs(query.limit).await?;

    Ok(Json(json!({
        "runs": runs,
        "count": runs.len()
    })))
}

/// 获取执行记录
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let run = state.action_service.get_run(id).await?;

    Ok(Json(run))
}

// ==================== SSH preview ====================

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default)]
    pub command: String,
}

/// 完整 ssh 调用预览
pub async fn ssh_preview(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let invocation = state
        .action_service
        .ssh_preview(&name, &query.command)
        .await?;

    Ok(Json(json!({ "invocation": invocation })))
}
