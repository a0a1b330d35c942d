// 手续费估算
// EVM 按优先级分档（EIP-1559），UTXO 按估算体积 × 费率，Solana 按签名数

use crate::domain::{chain_config::UtxoParams, transaction::Priority};

const GWEI: u128 = 1_000_000_000;

/// 原生转账 gas 上限
pub const NATIVE_GAS_LIMIT: u64 = 21_000;
/// ERC-20 transfer gas 上限
pub const TOKEN_GAS_LIMIT: u64 = 65_000;
/// Solana 每个签名的基础费用（lamports）
pub const SOLANA_FEE_PER_SIGNATURE: u64 = 5_000;

/// EIP-1559 费用报价
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmFeeQuote {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// 优先费（gwei）与 gas price 放大百分比
fn evm_tier(priority: Priority) -> (u128, u128) {
    match priority {
        Priority::Low => (1, 110),
        Priority::Medium => (2, 125),
        Priority::High => (3, 150),
    }
}

/// `max_fee = gas_price × pct / 100 + priority_fee`
pub fn evm_fee_for_priority(gas_price: u128, priority: Priority) -> EvmFeeQuote {
    let (priority_gwei, percent) = evm_tier(priority);
    let max_priority_fee_per_gas = priority_gwei * GWEI;
    let max_fee_per_gas = gas_price
        .saturating_mul(percent)
        / 100
        + max_priority_fee_per_gas;

    EvmFeeQuote {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    }
}

/// P2PKH 交易体积估算（字节）
pub fn utxo_estimated_size(inputs: usize, outputs: usize) -> u64 {
    10 + 148 * inputs as u64 + 34 * outputs as u64
}

/// 费率接口不可用时的静态费率
pub fn fallback_fee_rate(params: &UtxoParams, priority: Priority) -> u64 {
    let [low, medium, high] = params.fallback_fee_rates;
    match priority {
        Priority::Low => low,
        Priority::Medium => medium,
        Priority::High => high,
    }
}
