//! 服务器、SSH 配置的 HTTP 处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::AppState,
    models::{identity::SshProfileRequest, server::ServerRequest},
    services::import_service::SshConfigImportRequest,
};

pub async fn list_servers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let servers = state.server_service.list().await?;

    Ok(Json(json!({
        "servers": servers,
        "count": servers.len()
    })))
}

pub async fn create_server(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ServerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let server = state.server_service.create(req).await?;

    Ok((StatusCode::CREATED, Json(server)))
}

pub async fn get_server(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let server = state.server_service.get(&name).await?;

    Ok(Json(server))
}

pub async fn update_server(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<ServerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let server = state.server_service.update(&name, req).await?;

    Ok(Json(server))
}

pub async fn delete_server(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.server_service.delete(&name).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 获取 SSH 配置，未设置时返回 null
pub async fn get_ssh_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.identity_service.get_ssh_profile(&name).await?;

    Ok(Json(json!({ "profile": profile })))
}

/// 设置 SSH 配置（upsert）
pub async fn set_ssh_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<SshProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.identity_service.set_ssh_profile(&name, req).await?;

    Ok(Json(profile))
}

/// 从 OpenSSH 配置导入服务器；`preview` 为 true 时只返回解析结果
pub async fn import_ssh_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SshConfigImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.import_service.import_ssh_config(req).await?;

    Ok(Json(summary))
}
