//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{handlers, middleware::AppState};

/// 请求体大小上限
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    let api_routes = Router::new()
        // 动作
        .route(
            "/api/v1/actions",
            get(handlers::action::list_actions)
                .post(handlers::action::create_action)
        )
        .route(
            "/api/v1/actions/{id}",
            get(handlers::action::get_action)
                .put(handlers::action::update_action)
                .delete(handlers::action::delete_action)
        )
        .route("/api/v1/actions/{id}/run", post(handlers::action::run_action))
        .route("/api/v1/actions/{id}/runs", get(handlers::action::list_action_runs))

        // 执行历史
        .route("/api/v1/runs", get(handlers::action::list_runs))
        .route("/api/v1/runs/{id}", get(handlers::action::get_run))

        // 服务器
        .route(
            "/api/v1/servers",
            get(handlers::server::list_servers)
                .post(handlers::server::create_server)
        )
        .route(
            "/api/v1/servers/{name}",
            get(handlers::server::get_server)
                .put(handlers::server::update_server)
                .delete(handlers::server::delete_server)
        )
        .route(
            "/api/v1/servers/{name}/ssh-profile",
            get(handlers::server::get_ssh_profile)
                .put(handlers::server::set_ssh_profile)
        )
        .route("/api/v1/servers/{name}/ssh-preview", get(handlers::action::ssh_preview))
        .route("/api/v1/import/ssh-config", post(handlers::server::import_ssh_config))

        // 身份
        .route(
            "/api/v1/identities",
            get(handlers::identity::list_identities)
                .post(handlers::identity::create_identity)
        )
        .route(
            "/api/v1/identities/{id}",
            get(handlers::identity::get_identity)
                .put(handlers::identity::update_identity)
                .delete(handlers::identity::delete_identity)
        );

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
