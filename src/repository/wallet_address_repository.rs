// 钱包地址数据访问 Repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{domain::chain_config::Chain, repository::balance_cache_repository::CachedBalance};

// ============ 领域模型 ============

/// 钱包地址
///
/// 余额缓存直接存放在地址行上（`cached_balance` / `cached_balance_updated_at`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAddress {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub chain: Chain,
    pub address: String,
    pub derivation_index: u32,
    pub is_active: bool,
    pub cached_balance: Option<String>,
    pub cached_balance_updated_at: Option<DateTime<Utc>>,
}

impl WalletAddress {
    pub fn new(wallet_id: Uuid, chain: Chain, address: impl Into<String>, index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            chain,
            address: address.into(),
            derivation_index: index,
            is_active: true,
            cached_balance: None,
            cached_balance_updated_at: None,
        }
    }

    /// 已缓存的余额（从未查询过则为 None）
    pub fn cached(&self) -> Option<CachedBalance> {
        match (&self.cached_balance, self.cached_balance_updated_at) {
            (Some(balance), Some(updated_at)) => Some(CachedBalance {
                wallet_id: self.wallet_id,
                address_id: self.id,
                chain: self.chain,
                address: self.address.clone(),
                balance: balance.clone(),
                updated_at,
            }),
            _ => None,
        }
    }
}

// ============ Repository Trait ============

#[async_trait]
pub trait WalletAddressRepository: Send + Sync {
    /// 根据钱包与地址 ID 查询
    async fn find_by_id(&self, wallet_id: Uuid, address_id: Uuid)
        -> Result<Option<WalletAddress>>;

    /// 查询钱包在指定链上的活跃地址
    async fn find_active(
        &self,
        wallet_id: Uuid,
        chain: Chain,
        address: &str,
    ) -> Result<Option<WalletAddress>>;

    /// 登记新地址
    async fn insert(&self, address: &WalletAddress) -> Result<()>;
}

// ============ PostgreSQL 实现 ============

pub struct PgWalletAddressRepository {
    pool: PgPool,
}

impl PgWalletAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, wallet_id, chain, address, derivation_index, is_active,
        cached_balance, cached_balance_updated_at
     FROM wallet_addresses";

fn map_row(row: PgRow) -> Result<WalletAddress> {
    let chain: String = row.try_get("chain")?;
    let derivation_index: i64 = row.try_get("derivation_index")?;
    Ok(WalletAddress {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        chain: chain
            .parse()
            .with_context(|| format!("unknown chain in wallet_addresses: {chain}"))?,
        address: row.try_get("address")?,
        derivation_index: u32::try_from(derivation_index)
            .context("derivation_index out of range")?,
        is_active: row.try_get("is_active")?,
        cached_balance: row.try_get("cached_balance")?,
        cached_balance_updated_at: row.try_get("cached_balance_updated_at")?,
    })
}

#[async_trait]
impl WalletAddressRepository for PgWalletAddressRepository {
    async fn find_by_id(
        &self,
        wallet_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<WalletAddress>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1 AND wallet_id = $2"))
            .bind(address_id)
            .bind(wallet_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query wallet address")?;

        row.map(map_row).transpose()
    }

    async fn find_active(
        &self,
        wallet_id: Uuid,
        chain: Chain,
        address: &str,
    ) -> Result<Option<WalletAddress>> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE wallet_id = $1 AND chain = $2 AND address = $3 AND is_active"
        ))
        .bind(wallet_id)
        .bind(chain.as_str())
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query active wallet address")?;

        row.map(map_row).transpose()
    }

    async fn insert(&self, address: &WalletAddress) -> Result<()> {
        sqlx::query(
            "INSERT INTO wallet_addresses
                (id, wallet_id, chain, address, derivation_index, is_active,
                 cached_balance, cached_balance_updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(address.id)
        .bind(address.wallet_id)
        .bind(address.chain.as_str())
        .bind(&address.address)
        .bind(i64::from(address.derivation_index))
        .bind(address.is_active)
        .bind(&address.cached_balance)
        .bind(address.cached_balance_updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert wallet address")?;

        Ok(())
    }
}
