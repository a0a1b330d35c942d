// Repository 抽象层
pub mod balance_cache_repository;
pub mod derivation_index_repository;
pub mod memory;
pub mod prepared_transaction_repository;
pub mod wallet_address_repository;

pub use balance_cache_repository::{BalanceCacheRepository, CachedBalance, PgBalanceCacheRepository};
pub use derivation_index_repository::{DerivationIndexRepository, PgDerivationIndexRepository};
pub use memory::InMemoryStore;
pub use prepared_transaction_repository::{
    PgPreparedTransactionRepository, PreparedTransactionRepository, StatusUpdate,
};
pub use wallet_address_repository::{
    PgWalletAddressRepository, WalletAddress, WalletAddressRepository,
};
