//! 交易领域模型
//!
//! 未签名交易按链族区分为封闭的 tagged enum，所有金额均为最小单位整数。

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{chain_config::Chain, transaction_status::TransactionStatus},
    utils::amount::u128_string,
};

/// 手续费优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "slow" => Ok(Priority::Low),
            "medium" | "normal" | "standard" => Ok(Priority::Medium),
            "high" | "fast" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 未签名交易
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UnsignedTransaction {
    Evm(EvmUnsignedTx),
    Utxo(UtxoUnsignedTx),
    Solana(SolanaUnsignedTx),
}

impl UnsignedTransaction {
    pub fn chain(&self) -> Chain {
        match self {
            UnsignedTransaction::Evm(tx) => tx.chain,
            UnsignedTransaction::Utxo(tx) => tx.chain,
            UnsignedTransaction::Solana(tx) => tx.chain,
        }
    }

    /// 预估手续费（原生资产最小单位）
    pub fn fee(&self) -> u128 {
        match self {
            UnsignedTransaction::Evm(tx) => tx.max_fee(),
            UnsignedTransaction::Utxo(tx) => u128::from(tx.fee),
            UnsignedTransaction::Solana(tx) => u128::from(tx.fee),
        }
    }
}

/// EIP-1559 交易
///
/// 代币转账时 `to` 为合约地址、`value` 为 0、`data` 为 transfer 调用数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmUnsignedTx {
    pub chain: Chain,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: String,
    #[serde(with = "u128_string")]
    pub value: u128,
    pub gas_limit: u64,
    #[serde(with = "u128_string")]
    pub max_fee_per_gas: u128,
    #[serde(with = "u128_string")]
    pub max_priority_fee_per_gas: u128,
    /// 0x 前缀 hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_contract: Option<String>,
}

impl EvmUnsignedTx {
    pub fn max_fee(&self) -> u128 {
        u128::from(self.gas_limit).saturating_mul(self.max_fee_per_gas)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoInput {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    /// 被花费输出的锁定脚本 (hex)
    pub script_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoOutput {
    pub address: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoUnsignedTx {
    pub chain: Chain,
    pub inputs: Vec<UtxoInput>,
    pub outputs: Vec<UtxoOutput>,
    /// 最小单位 / 字节
    pub fee_rate: u64,
    pub fee: u64,
}

/// 逐项累加，溢出返回 None
fn checked_total(values: impl IntoIterator<Item = u64>) -> Option<u64> {
    values
        .into_iter()
        .try_fold(0u64, |total, value| total.checked_add(value))
}

impl UtxoUnsignedTx {
    pub fn total_input(&self) -> Option<u64> {
        checked_total(self.inputs.iter().map(|i| i.value))
    }

    pub fn total_output(&self) -> Option<u64> {
        checked_total(self.outputs.iter().map(|o| o.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaAccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaInstruction {
    pub program_id: String,
    pub accounts: Vec<SolanaAccountMeta>,
    /// 指令数据 (hex)
    pub data: String,
}

/// Solana 交易
///
/// 代币转账只携带 mint、收款人与数量，指令列表留空由签名端构建。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaUnsignedTx {
    pub chain: Chain,
    pub fee_payer: String,
    pub recent_blockhash: String,
    pub instructions: Vec<SolanaInstruction>,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 准备 / 广播结果
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 返回给客户端签名的预备交易
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub tx_id: Uuid,
    pub chain: Chain,
    pub unsigned_tx: UnsignedTransaction,
    /// 最小单位
    #[serde(with = "u128_string")]
    pub fee: u128,
    pub expires_at: DateTime<Utc>,
    pub priority: Priority,
}

/// 预备交易持久化记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedTransactionRecord {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub address_id: Uuid,
    pub chain: Chain,
    pub from_address: String,
    pub to_address: String,
    /// 用户输入的显示单位金额
    pub amount: String,
    /// 最小单位
    #[serde(with = "u128_string")]
    pub fee: u128,
    pub priority: Priority,
    pub unsigned_tx: UnsignedTransaction,
    pub status: TransactionStatus,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PreparedTransactionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub chain: Chain,
    pub status: TransactionStatus,
    pub explorer_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_tx_tagging() {
        let tx = UnsignedTransaction::Evm(EvmUnsignedTx {
            chain: Chain::Eth,
            chain_id: 1,
            nonce: 7,
            to: "0x742d35cc6634c0532925a3b844bc9e7595f0beb6".into(),
            value: 1_000_000_000_000_000_000,
            gas_limit: 21_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            data: None,
            token_contract: None,
        });

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "evm");
        assert_eq!(json["chain"], "ETH");
        assert_eq!(json["value"], "1000000000000000000");
        assert!(json.get("data").is_none());

        let back: UnsignedTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.fee(), 21_000 * 30_000_000_000);
    }

    #[test]
    fn test_utxo_totals_are_checked() {
        let mut tx = UtxoUnsignedTx {
            chain: Chain::Btc,
            inputs: vec![UtxoInput {
                txid: "aa".repeat(32),
                vout: 0,
                value: 70_000,
                script_pubkey: String::new(),
            }],
            outputs: vec![UtxoOutput {
                address: "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH".into(),
                value: 60_000,
            }],
            fee_rate: 10,
            fee: 10_000,
        };
        assert_eq!(tx.total_input(), Some(70_000));
        assert_eq!(tx.total_output(), Some(60_000));

        tx.inputs.push(UtxoInput {
            txid: "bb".repeat(32),
            vout: 1,
            value: u64::MAX,
            script_pubkey: String::new(),
        });
        assert_eq!(tx.total_input(), None);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("FAST".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(Priority::default(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
