//! IronVault - 多链钱包交易引擎
//!
//! 非托管模式：助记词与私钥只在密钥持有端参与派生与签名，
//! 服务端负责准备未签名交易、广播已签名交易以及余额缓存。

pub mod api;
pub mod app_state;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod repository;
pub mod service;
pub mod signing;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{
            chain_config::{Chain, ChainConfig, ChainRegistry},
            derivation::{derive_key, derive_wallet_bundle, validate_mnemonic, DerivedKey},
            transaction::{PreparedTransaction, UnsignedTransaction},
        },
        error::{AppError, AppErrorCode},
        signing::{sign_transaction, sign_transaction_json, SignedTransaction},
    };
}
