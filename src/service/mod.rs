pub mod balance_cache_service;
pub mod blockchain_client;
pub mod broadcast_service;
pub mod gas_estimator;
pub mod transaction_prepare;
pub mod transaction_retry;

pub use balance_cache_service::{AddressBalance, BalanceCacheService};
pub use blockchain_client::{ChainClient, HttpChainClient, Utxo};
pub use broadcast_service::{BroadcastService, BroadcastTransactionInput};
pub use transaction_prepare::{PrepareTransactionInput, TransactionPrepareService};
pub use transaction_retry::{RetryConfig, RetryError};
