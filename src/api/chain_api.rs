// 链信息与地址校验 API
// GET  /api/v1/chains
// POST /api/v1/addresses/validate

use axum::{extract::rejection::JsonRejection, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::response::{success_response, ApiResponse},
    domain::chain_config::{Chain, ChainFamily, ChainRegistry, CurveType},
    error::AppError,
    utils::address_validator::AddressValidator,
};

/// 链信息（公开数据）
#[derive(Debug, Serialize)]
pub struct ChainInfo {
    pub code: Chain,
    pub name: &'static str,
    pub symbol: &'static str,
    pub family: ChainFamily,
    pub curve_type: CurveType,
    pub decimals: u32,
    pub base_chain: Option<Chain>,
    pub token_contract: Option<&'static str>,
    pub transactable: bool,
}

pub async fn list_chains() -> Result<Json<ApiResponse<Vec<ChainInfo>>>, AppError> {
    let chains = ChainRegistry::list_all()
        .into_iter()
        .map(|config| ChainInfo {
            code: config.chain,
            name: config.name,
            symbol: config.symbol,
            family: config.family,
            curve_type: config.curve_type,
            decimals: config.decimals,
            base_chain: config.base_chain,
            token_contract: config.token_contract,
            transactable: config.chain.is_transactable(),
        })
        .collect();

    success_response(chains)
}

#[derive(Debug, Deserialize)]
pub struct ValidateAddressRequest {
    pub chain: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateAddressResponse {
    pub chain: Chain,
    pub address: String,
    pub valid: bool,
}

pub async fn validate_address(
    payload: Result<Json<ValidateAddressRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ValidateAddressResponse>>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let chain: Chain = request.chain.parse()?;
    let valid = AddressValidator::validate(chain, &request.address);

    success_response(ValidateAddressResponse {
        chain,
        address: request.address,
        valid,
    })
}
