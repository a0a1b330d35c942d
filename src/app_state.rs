use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::db::PgPool,
    repository::{
        BalanceCacheRepository, PgBalanceCacheRepository, PgPreparedTransactionRepository,
        PgWalletAddressRepository, PreparedTransactionRepository, WalletAddressRepository,
    },
    service::{
        BalanceCacheService, BroadcastService, ChainClient, HttpChainClient, RetryConfig,
        TransactionPrepareService,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub prepare_service: Arc<TransactionPrepareService>,
    pub broadcast_service: Arc<BroadcastService>,
    pub balance_service: Arc<BalanceCacheService>,
}

impl AppState {
    /// 生产装配：PostgreSQL + HTTP 链客户端
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        let client: Arc<dyn ChainClient> =
            Arc::new(HttpChainClient::new(config.blockchain.clone()));

        Self::with_components(
            config,
            Arc::new(PgWalletAddressRepository::new(pool.clone())),
            Arc::new(PgPreparedTransactionRepository::new(pool.clone())),
            Arc::new(PgBalanceCacheRepository::new(pool)),
            client,
        )
    }

    /// 以任意存储与链客户端装配（测试使用内存实现）
    pub fn with_components(
        config: Arc<Config>,
        addresses: Arc<dyn WalletAddressRepository>,
        transactions: Arc<dyn PreparedTransactionRepository>,
        cache: Arc<dyn BalanceCacheRepository>,
        client: Arc<dyn ChainClient>,
    ) -> Self {
        let engine = &config.engine;

        let prepare_service = Arc::new(TransactionPrepareService::new(
            addresses.clone(),
            transactions.clone(),
            client.clone(),
            engine.prepared_tx_ttl(),
        ));
        let broadcast_service = Arc::new(BroadcastService::new(
            transactions,
            client.clone(),
            RetryConfig::from(engine),
        ));
        let balance_service = Arc::new(BalanceCacheService::new(
            addresses,
            cache,
            client,
            engine.balance_cache_ttl(),
        ));

        Self {
            config,
            prepare_service,
            broadcast_service,
            balance_service,
        }
    }
}
