// 余额缓存 Repository（写入地址行上的缓存列）

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::chain_config::Chain;

/// 已缓存余额（显示单位十进制字符串）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedBalance {
    pub wallet_id: Uuid,
    pub address_id: Uuid,
    pub chain: Chain,
    pub address: String,
    pub balance: String,
    pub updated_at: DateTime<Utc>,
}

impl CachedBalance {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.updated_at < ttl
    }
}

#[async_trait]
pub trait BalanceCacheRepository: Send + Sync {
    /// 覆盖写入地址的缓存余额
    async fn store_balance(
        &self,
        address_id: Uuid,
        balance: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

pub struct PgBalanceCacheRepository {
    pool: PgPool,
}

impl PgBalanceCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceCacheRepository for PgBalanceCacheRepository {
    async fn store_balance(
        &self,
        address_id: Uuid,
        balance: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wallet_addresses
             SET cached_balance = $2, cached_balance_updated_at = $3
             WHERE id = $1",
        )
        .bind(address_id)
        .bind(balance)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to store cached balance")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("wallet address {} not found", address_id);
        }
        Ok(())
    }
}
