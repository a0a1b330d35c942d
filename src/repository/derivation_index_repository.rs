// 派生索引计数器

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::chain_config::Chain;

#[async_trait]
pub trait DerivationIndexRepository: Send + Sync {
    /// 原子地自增并返回自增前的值（首次调用返回 0）
    async fn next_index(&self, chain: Chain) -> Result<u32>;
}

pub struct PgDerivationIndexRepository {
    pool: PgPool,
}

impl PgDerivationIndexRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DerivationIndexRepository for PgDerivationIndexRepository {
    async fn next_index(&self, chain: Chain) -> Result<u32> {
        // 单条语句完成读改写，不存在 SELECT/UPDATE 之间的竞争窗口
        let (index,): (i64,) = sqlx::query_as(
            "INSERT INTO derivation_indices (chain, next_index) VALUES ($1, 1)
             ON CONFLICT (chain) DO UPDATE SET next_index = derivation_indices.next_index + 1
             RETURNING next_index - 1",
        )
        .bind(chain.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to allocate derivation index")?;

        u32::try_from(index).context("derivation index exhausted")
    }
}
