// 交易 API
// POST /api/v1/wallets/:wallet_id/transactions/prepare
// POST /api/v1/wallets/:wallet_id/transactions/broadcast
//
// 签名在客户端完成，服务端只接触未签名交易与已签名载荷。

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    api::{
        middleware::TraceId,
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    domain::transaction::{BroadcastResult, PreparedTransaction},
    error::AppError,
    service::{BroadcastTransactionInput, PrepareTransactionInput},
};

pub async fn prepare_transaction(
    State(state): State<Arc<AppState>>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    Path(wallet_id): Path<Uuid>,
    payload: Result<Json<PrepareTransactionInput>, JsonRejection>,
) -> Result<Json<ApiResponse<PreparedTransaction>>, AppError> {
    let Json(input) =
        payload.map_err(|e| AppError::bad_request(e.body_text()).with_trace_id(trace_id.clone()))?;

    let prepared = state
        .prepare_service
        .prepare_transaction(wallet_id, input)
        .await
        .map_err(|e| e.with_trace_id(trace_id))?;

    success_response(prepared)
}

pub async fn broadcast_transaction(
    State(state): State<Arc<AppState>>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    Path(wallet_id): Path<Uuid>,
    payload: Result<Json<BroadcastTransactionInput>, JsonRejection>,
) -> Result<Json<ApiResponse<BroadcastResult>>, AppError> {
    let Json(input) =
        payload.map_err(|e| AppError::bad_request(e.body_text()).with_trace_id(trace_id.clone()))?;

    let result = state
        .broadcast_service
        .broadcast_transaction(wallet_id, input)
        .await
        .map_err(|e| e.with_trace_id(trace_id))?;

    success_response(result)
}
