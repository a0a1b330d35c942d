// 余额 API
// GET /api/v1/wallets/:wallet_id/addresses/:address_id/balance?refresh=true

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{
        middleware::TraceId,
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    error::AppError,
    service::AddressBalance,
};

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn get_address_balance(
    State(state): State<Arc<AppState>>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    Path((wallet_id, address_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<ApiResponse<AddressBalance>>, AppError> {
    let balance = state
        .balance_service
        .get_address_balance(wallet_id, address_id, query.refresh)
        .await
        .map_err(|e| e.with_trace_id(trace_id))?;

    success_response(balance)
}
