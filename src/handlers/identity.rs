//! 身份的 HTTP 处理器
//!
//! 秘密只能写入，任何响应都不会带出秘密。

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{error::AppError, middleware::AppState, models::identity::IdentityPayload};

pub async fn list_identities(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let identities = state.identity_service.list().await?;

    Ok(Json(json!({
        "identities": identities,
        "count": identities.len()
    })))
}

pub async fn create_identity(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IdentityPayload>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.identity_service.create(payload).await?;

    Ok((StatusCode::CREATED, Json(identity)))
}

pub async fn get_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.identity_service.get(id).await?;

    Ok(Json(identity))
}

pub async fn update_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<IdentityPayload>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.identity_service.update(id, payload).await?;

    Ok(Json(identity))
}

pub async fn delete_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.identity_service.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
