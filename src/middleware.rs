//! HTTP 中间件
//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::services::{ActionService, IdentityService, ImportService, ServerService};
use crate::vault::CredentialVault;

/// 应用状态
///
/// 动作服务不持有保险库；只有身份服务能读写秘密。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: SqlitePool,
    pub action_service: Arc<ActionService>,
    pub server_service: Arc<ServerService>,
    pub identity_service: Arc<IdentityService>,
    pub import_service: Arc<ImportService>,
}

impl AppState {
    pub fn new(config: AppConfig, db: SqlitePool, vault: Arc<dyn CredentialVault>) -> Self {
        let action_service = Arc::new(ActionService::new(db.clone(), &config.execution));
        let server_service = Arc::new(ServerService::new(db.clone()));
        let identity_service = Arc::new(IdentityService::new(db.clone(), vault));
        let import_service = Arc::new(ImportService::new(db.clone()));

        Self {
            config,
            db,
            action_service,
            server_service,
            identity_service,
            import_service,
        }
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签只使用有限取值
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "other",
        };

        metrics::counter!(crate::telemetry::METRIC_HTTP_REQUESTS, "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!(crate::telemetry::METRIC_HTTP_DURATION).record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
