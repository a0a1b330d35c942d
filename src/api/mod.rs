use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{api::middleware::trace_id_middleware, app_state::AppState};

pub mod balance_api;
pub mod chain_api;
pub mod middleware;
pub mod response; // 统一响应格式
pub mod transaction_api;

/// 组装路由
///
/// 派生与签名只在密钥持有端以库的形式调用，不暴露 HTTP 接口。
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/v1/chains", get(chain_api::list_chains))
        .route(
            "/api/v1/addresses/validate",
            post(chain_api::validate_address),
        )
        .route(
            "/api/v1/wallets/:wallet_id/transactions/prepare",
            post(transaction_api::prepare_transaction),
        )
        .route(
            "/api/v1/wallets/:wallet_id/transactions/broadcast",
            post(transaction_api::broadcast_transaction),
        )
        .route(
            "/api/v1/wallets/:wallet_id/addresses/:address_id/balance",
            get(balance_api::get_address_balance),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(from_fn(trace_id_middleware)),
        )
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render_prometheus(),
    )
}
