// 预备交易数据访问 Repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    transaction::{PreparedTransactionRecord, UnsignedTransaction},
    transaction_status::TransactionStatus,
};

/// 状态迁移时附带写入的字段
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait PreparedTransactionRepository: Send + Sync {
    async fn insert(&self, record: &PreparedTransactionRecord) -> Result<()>;

    /// 查询钱包下的预备交易
    async fn find_for_wallet(
        &self,
        wallet_id: Uuid,
        tx_id: Uuid,
    ) -> Result<Option<PreparedTransactionRecord>>;

    /// 条件更新 `from -> to`，返回是否命中
    ///
    /// 必须是单条原子语句，并发调用者中至多一个返回 true。
    async fn transition_status(
        &self,
        tx_id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<bool>;
}

pub struct PgPreparedTransactionRepository {
    pool: PgPool,
}

impl PgPreparedTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_row(row: PgRow) -> Result<PreparedTransactionRecord> {
    let chain: String = row.try_get("chain")?;
    let fee: String = row.try_get("fee")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let Json(unsigned_tx): Json<UnsignedTransaction> = row.try_get("unsigned_tx")?;

    Ok(PreparedTransactionRecord {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        address_id: row.try_get("address_id")?,
        chain: chain
            .parse()
            .with_context(|| format!("unknown chain in prepared_transactions: {chain}"))?,
        from_address: row.try_get("from_address")?,
        to_address: row.try_get("to_address")?,
        amount: row.try_get("amount")?,
        fee: fee.parse().context("fee column is not an integer")?,
        priority: priority.parse().map_err(anyhow::Error::msg)?,
        unsigned_tx,
        status: TransactionStatus::from_db_str(&status)
            .with_context(|| format!("unknown transaction status: {status}"))?,
        tx_hash: row.try_get("tx_hash")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl PreparedTransactionRepository for PgPreparedTransactionRepository {
    async fn insert(&self, record: &PreparedTransactionRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO prepared_transactions
                (id, wallet_id, address_id, chain, from_address, to_address, amount, fee,
                 priority, unsigned_tx, status, tx_hash, error_message, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(record.id)
        .bind(record.wallet_id)
        .bind(record.address_id)
        .bind(record.chain.as_str())
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(&record.amount)
        .bind(record.fee.to_string())
        .bind(record.priority.as_str())
        .bind(Json(&record.unsigned_tx))
        .bind(record.status.to_db_string())
        .bind(&record.tx_hash)
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert prepared transaction")?;

        Ok(())
    }

    async fn find_for_wallet(
        &self,
        wallet_id: Uuid,
        tx_id: Uuid,
    ) -> Result<Option<PreparedTransactionRecord>> {
        let row = sqlx::query(
            "SELECT id, wallet_id, address_id, chain, from_address, to_address, amount, fee,
                    priority, unsigned_tx, status, tx_hash, error_message, created_at, expires_at
             FROM prepared_transactions
             WHERE id = $1 AND wallet_id = $2",
        )
        .bind(tx_id)
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query prepared transaction")?;

        row.map(map_row).transpose()
    }

    async fn transition_status(
        &self,
        tx_id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE prepared_transactions
             SET status = $3,
                 tx_hash = COALESCE($4, tx_hash),
                 error_message = COALESCE($5, error_message),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = $1 AND status = $2",
        )
        .bind(tx_id)
        .bind(from.to_db_string())
        .bind(to.to_db_string())
        .bind(update.tx_hash)
        .bind(update.error_message)
        .execute(&self.pool)
        .await
        .context("Failed to update prepared transaction status")?;

        Ok(result.rows_affected() == 1)
    }
}
