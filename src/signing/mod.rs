//! 交易签名
//!
//! 在密钥持有端本地运行的纯函数：未签名交易 + 私钥 -> 可广播的线格式。
//! 私钥字节只存在于 `Zeroizing` 缓冲区，错误信息不包含任何密钥材料。

pub mod evm;
pub mod solana;
pub mod utxo;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::domain::{chain_config::ChainFamily, transaction::UnsignedTransaction};

/// 签名错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("unsupported transaction type: {0}")]
    UnsupportedType(String),
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("private key does not control {0}")]
    KeyMismatch(String),
    #[error("signing failed: {0}")]
    Signature(String),
}

/// 签名后载荷编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignedFormat {
    Hex,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub signed_tx: String,
    pub format: SignedFormat,
}

/// 解析 hex 私钥（可带 0x）
///
/// Solana 额外接受 64 字节 keypair（取前 32 字节种子）。
fn decode_private_key(
    private_key: &str,
    family: ChainFamily,
) -> Result<Zeroizing<[u8; 32]>, SigningError> {
    let trimmed = private_key.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = Zeroizing::new(hex::decode(raw).map_err(|_| SigningError::InvalidPrivateKey)?);

    let usable = match (bytes.len(), family) {
        (32, _) => &bytes[..],
        (64, ChainFamily::Solana) => &bytes[..32],
        _ => return Err(SigningError::InvalidPrivateKey),
    };

    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(usable);
    Ok(secret)
}

/// 按链族签名
pub fn sign_transaction(
    unsigned_tx: &UnsignedTransaction,
    private_key: &str,
) -> Result<SignedTransaction, SigningError> {
    let family = unsigned_tx.chain().family();
    let secret = decode_private_key(private_key, family)?;

    match unsigned_tx {
        UnsignedTransaction::Evm(tx) => Ok(SignedTransaction {
            signed_tx: evm::sign(tx, &secret)?,
            format: SignedFormat::Hex,
        }),
        UnsignedTransaction::Utxo(tx) => Ok(SignedTransaction {
            signed_tx: utxo::sign(tx, &secret)?,
            format: SignedFormat::Hex,
        }),
        UnsignedTransaction::Solana(tx) => Ok(SignedTransaction {
            signed_tx: solana::sign(tx, &secret)?,
            format: SignedFormat::Base64,
        }),
    }
}

/// 签名未类型化的 JSON（准备接口返回的 `unsigned_tx` 原样传入）
pub fn sign_transaction_json(
    value: &serde_json::Value,
    private_key: &str,
) -> Result<SignedTransaction, SigningError> {
    let tx_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    if !matches!(tx_type, "evm" | "utxo" | "solana") {
        return Err(SigningError::UnsupportedType(tx_type.to_string()));
    }

    let unsigned_tx: UnsignedTransaction = serde_json::from_value(value.clone())
        .map_err(|e| SigningError::Malformed(e.to_string()))?;
    sign_transaction(&unsigned_tx, private_key)
}

pub(crate) fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, SigningError> {
    let raw = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(raw).map_err(|_| SigningError::Malformed(format!("{field} is not hex")))
}
