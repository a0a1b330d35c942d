//! Domain 模块
//!
//! 链配置、密钥派生与交易模型

pub mod chain_config;
pub mod derivation;
pub mod transaction;
pub mod transaction_status;

// 重新导出常用类型
pub use chain_config::{
    AddressFormat, Chain, ChainConfig, ChainFamily, ChainRegistry, CurveType, UnsupportedChain,
};
pub use derivation::{
    derive_key, derive_key_for_code, derive_key_with_passphrase, derive_wallet_bundle,
    validate_mnemonic, DerivationError, DerivationStrategy, DerivationStrategyFactory, DerivedKey,
    WalletBundle,
};
pub use transaction::{
    BroadcastResult, PreparedTransaction, PreparedTransactionRecord, Priority, UnsignedTransaction,
};
pub use transaction_status::TransactionStatus;
