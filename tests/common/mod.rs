//! 测试辅助模块
//! 提供可编排的链客户端、内存存储与应用状态装配

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ironvault::{
    app_state::AppState,
    config::Config,
    domain::{chain_config::Chain, derivation::derive_key, transaction::Priority},
    repository::{InMemoryStore, WalletAddress, WalletAddressRepository},
    service::{ChainClient, RetryConfig, Utxo},
};
use uuid::Uuid;

pub const MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// 全零 32 字节的 base58 表示
pub const BLOCKHASH: &str = "11111111111111111111111111111111";

pub const BTC_RECIPIENT: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
pub const ETH_RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

// ============ 可编排链客户端 ============

#[derive(Default)]
struct Script {
    nonce: u64,
    gas_price: u128,
    utxos: Vec<Utxo>,
    fee_rate: Option<u64>,
    balances: VecDeque<Result<u128, String>>,
    send_results: VecDeque<Result<String, String>>,
    send_delay: Option<Duration>,
}

/// 链客户端替身
///
/// 每个方法都计数；余额与广播结果按队列依次返回，队列耗尽后
/// 余额返回错误、广播返回固定哈希。
#[derive(Default)]
pub struct MockChainClient {
    script: Mutex<Script>,
    nonce_calls: AtomicUsize,
    gas_price_calls: AtomicUsize,
    utxo_calls: AtomicUsize,
    fee_rate_calls: AtomicUsize,
    blockhash_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl MockChainClient {
    pub fn new() -> Self {
        let client = Self::default();
        {
            let mut script = client.script.lock().unwrap();
            script.nonce = 7;
            script.gas_price = 20_000_000_000;
            script.fee_rate = Some(10);
        }
        client
    }

    pub fn with_utxos(self, utxos: Vec<Utxo>) -> Self {
        self.script.lock().unwrap().utxos = utxos;
        self
    }

    pub fn with_fee_rate(self, fee_rate: Option<u64>) -> Self {
        self.script.lock().unwrap().fee_rate = fee_rate;
        self
    }

    pub fn push_balance(&self, result: Result<u128, &str>) {
        self.script
            .lock()
            .unwrap()
            .balances
            .push_back(result.map_err(str::to_string));
    }

    pub fn push_send(&self, result: Result<&str, &str>) {
        self.script
            .lock()
            .unwrap()
            .send_results
            .push_back(result.map(str::to_string).map_err(str::to_string));
    }

    pub fn set_send_delay(&self, delay: Duration) {
        self.script.lock().unwrap().send_delay = Some(delay);
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn fee_rate_calls(&self) -> usize {
        self.fee_rate_calls.load(Ordering::SeqCst)
    }

    /// 所有网络方法调用次数之和
    pub fn total_calls(&self) -> usize {
        [
            &self.nonce_calls,
            &self.gas_price_calls,
            &self.utxo_calls,
            &self.fee_rate_calls,
            &self.blockhash_calls,
            &self.balance_calls,
            &self.send_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_nonce(&self, _chain: Chain, _address: &str) -> Result<u64> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().nonce)
    }

    async fn get_gas_price(&self, _chain: Chain) -> Result<u128> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().gas_price)
    }

    async fn get_utxos(&self, _chain: Chain, _address: &str) -> Result<Vec<Utxo>> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().utxos.clone())
    }

    async fn get_fee_rate(&self, _chain: Chain, _priority: Priority) -> Result<u64> {
        self.fee_rate_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .fee_rate
            .ok_or_else(|| anyhow!("fee estimator unavailable"))
    }

    async fn get_recent_blockhash(&self, _chain: Chain) -> Result<String> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BLOCKHASH.to_string())
    }

    async fn get_balance(&self, _chain: Chain, _address: &str) -> Result<u128> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .balances
            .pop_front()
            .unwrap_or_else(|| Err("node unreachable".to_string()))
            .map_err(|e| anyhow!(e))
    }

    async fn send_raw_transaction(&self, _chain: Chain, _signed_tx: &str) -> Result<String> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = {
            let mut script = self.script.lock().unwrap();
            (script.send_delay, script.send_results.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
            .unwrap_or_else(|| Ok("0xabc123".to_string()))
            .map_err(|e| anyhow!(e))
    }
}

// ============ 装配 ============

/// 测试用重试配置（毫秒级退避）
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(5),
        backoff_multiplier: 2,
        attempt_timeout: Duration::from_millis(500),
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.broadcast_initial_backoff_ms = 5;
    config.engine.broadcast_attempt_timeout_secs = 1;
    config
}

/// 登记助记词索引 0 派生出的地址
pub async fn register_derived(store: &InMemoryStore, wallet_id: Uuid, chain: Chain) -> WalletAddress {
    let key = derive_key(MNEMONIC, chain, 0).expect("derive");
    let address = WalletAddress::new(wallet_id, chain, key.address.clone(), 0);
    WalletAddressRepository::insert(store, &address)
        .await
        .expect("insert address");
    address
}

pub fn create_test_app_state(
    store: Arc<InMemoryStore>,
    client: Arc<MockChainClient>,
) -> Arc<AppState> {
    Arc::new(AppState::with_components(
        Arc::new(test_config()),
        store.clone(),
        store.clone(),
        store,
        client,
    ))
}
