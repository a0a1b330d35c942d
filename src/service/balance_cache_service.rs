//! 余额读穿缓存
//!
//! TTL 内直接返回缓存；过期或强制刷新时查询链上并回写。
//! 链上查询失败时返回旧值并标记 `stale`，读取接口不会因节点故障报错。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blockchain_client::ChainClient;
use crate::{
    domain::chain_config::Chain,
    error::AppError,
    infrastructure::log_redact::redact_address,
    repository::{BalanceCacheRepository, WalletAddressRepository},
    utils::amount::format_amount,
};

/// 余额查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    /// 显示单位十进制字符串
    pub balance: String,
    pub chain: Chain,
    pub address: String,
    /// 从未成功查询过时为 None
    pub updated_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

pub struct BalanceCacheService {
    addresses: Arc<dyn WalletAddressRepository>,
    cache: Arc<dyn BalanceCacheRepository>,
    client: Arc<dyn ChainClient>,
    ttl: chrono::Duration,
}

impl BalanceCacheService {
    pub fn new(
        addresses: Arc<dyn WalletAddressRepository>,
        cache: Arc<dyn BalanceCacheRepository>,
        client: Arc<dyn ChainClient>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            addresses,
            cache,
            client,
            ttl,
        }
    }

    pub async fn get_address_balance(
        &self,
        wallet_id: Uuid,
        address_id: Uuid,
        force_refresh: bool,
    ) -> Result<AddressBalance, AppError> {
        let address = self
            .addresses
            .find_by_id(wallet_id, address_id)
            .await
            .map_err(|e| AppError::database_error(format!("{:#}", e)))?
            .ok_or_else(|| {
                AppError::address_not_found(format!("address {} not found", address_id))
            })?;

        let cached = address.cached();
        let now = Utc::now();

        if !force_refresh {
            if let Some(cached) = cached.as_ref().filter(|c| c.is_fresh(now, self.ttl)) {
                crate::metrics::inc_balance_cache_hit();
                return Ok(AddressBalance {
                    balance: cached.balance.clone(),
                    chain: address.chain,
                    address: address.address,
                    updated_at: Some(cached.updated_at),
                    stale: false,
                });
            }
        }

        crate::metrics::inc_balance_cache_miss();

        match self.client.get_balance(address.chain, &address.address).await {
            Ok(minor) => {
                let balance = format_amount(minor, address.chain.decimals());
                let updated_at = Utc::now();

                if let Err(e) = self
                    .cache
                    .store_balance(address.id, &balance, updated_at)
                    .await
                {
                    tracing::warn!(
                        address_id = %address.id,
                        chain = %address.chain,
                        error = ?e,
                        "Failed to persist cached balance"
                    );
                }

                Ok(AddressBalance {
                    balance,
                    chain: address.chain,
                    address: address.address,
                    updated_at: Some(updated_at),
                    stale: false,
                })
            }
            Err(e) => {
                crate::metrics::inc_balance_stale();
                tracing::warn!(
                    address = %redact_address(&address.address),
                    chain = %address.chain,
                    error = %format!("{:#}", e),
                    "Live balance query failed, serving cached value"
                );

                Ok(match cached {
                    Some(cached) => AddressBalance {
                        balance: cached.balance,
                        chain: address.chain,
                        address: address.address,
                        updated_at: Some(cached.updated_at),
                        stale: true,
                    },
                    None => AddressBalance {
                        balance: "0".to_string(),
                        chain: address.chain,
                        address: address.address,
                        updated_at: None,
                        stale: true,
                    },
                })
            }
        }
    }
}
