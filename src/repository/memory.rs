//! 内存实现
//!
//! 与 PostgreSQL 实现语义一致（条件更新、原子计数器），用于测试与本地联调。

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    balance_cache_repository::BalanceCacheRepository,
    derivation_index_repository::DerivationIndexRepository,
    prepared_transaction_repository::{PreparedTransactionRepository, StatusUpdate},
    wallet_address_repository::{WalletAddress, WalletAddressRepository},
};
use crate::domain::{
    chain_config::Chain, transaction::PreparedTransactionRecord,
    transaction_status::TransactionStatus,
};

#[derive(Default)]
struct State {
    addresses: HashMap<Uuid, WalletAddress>,
    transactions: HashMap<Uuid, PreparedTransactionRecord>,
    indices: HashMap<Chain, u32>,
}

/// 四个 Repository trait 共用的内存存储
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_balance_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    /// 让后续的余额写入失败
    pub fn set_fail_balance_writes(&self, fail: bool) {
        self.fail_balance_writes.store(fail, Ordering::SeqCst);
    }

    pub fn transaction(&self, tx_id: Uuid) -> Option<PreparedTransactionRecord> {
        self.lock().ok()?.transactions.get(&tx_id).cloned()
    }

    pub fn address(&self, address_id: Uuid) -> Option<WalletAddress> {
        self.lock().ok()?.addresses.get(&address_id).cloned()
    }

    /// 直接覆盖记录（测试构造过期、已处理等状态）
    pub fn put_transaction(&self, record: PreparedTransactionRecord) -> Result<()> {
        self.lock()?.transactions.insert(record.id, record);
        Ok(())
    }
}

#[async_trait]
impl WalletAddressRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        wallet_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<WalletAddress>> {
        Ok(self
            .lock()?
            .addresses
            .get(&address_id)
            .filter(|a| a.wallet_id == wallet_id)
            .cloned())
    }

    async fn find_active(
        &self,
        wallet_id: Uuid,
        chain: Chain,
        address: &str,
    ) -> Result<Option<WalletAddress>> {
        Ok(self
            .lock()?
            .addresses
            .values()
            .find(|a| {
                a.wallet_id == wallet_id && a.chain == chain && a.address == address && a.is_active
            })
            .cloned())
    }

    async fn insert(&self, address: &WalletAddress) -> Result<()> {
        let mut state = self.lock()?;
        if state.addresses.contains_key(&address.id) {
            anyhow::bail!("wallet address {} already exists", address.id);
        }
        state.addresses.insert(address.id, address.clone());
        Ok(())
    }
}

#[async_trait]
impl BalanceCacheRepository for InMemoryStore {
    async fn store_balance(
        &self,
        address_id: Uuid,
        balance: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        if self.fail_balance_writes.load(Ordering::SeqCst) {
            anyhow::bail!("balance write rejected");
        }
        let mut state = self.lock()?;
        let address = state
            .addresses
            .get_mut(&address_id)
            .ok_or_else(|| anyhow!("wallet address {} not found", address_id))?;
        address.cached_balance = Some(balance.to_string());
        address.cached_balance_updated_at = Some(updated_at);
        Ok(())
    }
}

#[async_trait]
impl PreparedTransactionRepository for InMemoryStore {
    async fn insert(&self, record: &PreparedTransactionRecord) -> Result<()> {
        let mut state = self.lock()?;
        if state.transactions.contains_key(&record.id) {
            anyhow::bail!("prepared transaction {} already exists", record.id);
        }
        state.transactions.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_for_wallet(
        &self,
        wallet_id: Uuid,
        tx_id: Uuid,
    ) -> Result<Option<PreparedTransactionRecord>> {
        Ok(self
            .lock()?
            .transactions
            .get(&tx_id)
            .filter(|r| r.wallet_id == wallet_id)
            .cloned())
    }

    async fn transition_status(
        &self,
        tx_id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        match state.transactions.get_mut(&tx_id) {
            Some(record) if record.status == from => {
                record.status = to;
                if update.tx_hash.is_some() {
                    record.tx_hash = update.tx_hash;
                }
                if update.error_message.is_some() {
                    record.error_message = update.error_message;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DerivationIndexRepository for InMemoryStore {
    async fn next_index(&self, chain: Chain) -> Result<u32> {
        let mut state = self.lock()?;
        let counter = state.indices.entry(chain).or_insert(0);
        let index = *counter;
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| anyhow!("derivation index exhausted for {}", chain))?;
        Ok(index)
    }
}
