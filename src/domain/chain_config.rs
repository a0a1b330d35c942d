//! 多链配置模块
//!
//! 定义所有支持的区块链、所属链族及其加密曲线配置。
//! 链集合是封闭的：新增一条链只需要在 `CHAIN_CONFIGS` 中登记一项。

use std::{collections::HashMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 支持的链标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Chain {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "BCH")]
    Bch,
    #[serde(rename = "DOGE")]
    Doge,
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "POL")]
    Pol,
    #[serde(rename = "BNB")]
    Bnb,
    #[serde(rename = "SOL")]
    Sol,
    #[serde(rename = "ADA")]
    Ada,
    #[serde(rename = "USDT_ETH")]
    UsdtEth,
    #[serde(rename = "USDC_ETH")]
    UsdcEth,
    #[serde(rename = "USDT_POL")]
    UsdtPol,
    #[serde(rename = "USDC_POL")]
    UsdcPol,
    #[serde(rename = "USDT_BNB")]
    UsdtBnb,
    #[serde(rename = "USDT_SOL")]
    UsdtSol,
    #[serde(rename = "USDC_SOL")]
    UsdcSol,
}

impl Chain {
    pub const ALL: [Chain; 15] = [
        Chain::Btc,
        Chain::Bch,
        Chain::Doge,
        Chain::Eth,
        Chain::Pol,
        Chain::Bnb,
        Chain::Sol,
        Chain::Ada,
        Chain::UsdtEth,
        Chain::UsdcEth,
        Chain::UsdtPol,
        Chain::UsdcPol,
        Chain::UsdtBnb,
        Chain::UsdtSol,
        Chain::UsdcSol,
    ];

    /// 规范链代码（持久化与 API 使用）
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Btc => "BTC",
            Chain::Bch => "BCH",
            Chain::Doge => "DOGE",
            Chain::Eth => "ETH",
            Chain::Pol => "POL",
            Chain::Bnb => "BNB",
            Chain::Sol => "SOL",
            Chain::Ada => "ADA",
            Chain::UsdtEth => "USDT_ETH",
            Chain::UsdcEth => "USDC_ETH",
            Chain::UsdtPol => "USDT_POL",
            Chain::UsdcPol => "USDC_POL",
            Chain::UsdtBnb => "USDT_BNB",
            Chain::UsdtSol => "USDT_SOL",
            Chain::UsdcSol => "USDC_SOL",
        }
    }

    /// 获取链配置
    pub fn config(&self) -> &'static ChainConfig {
        // CHAIN_CONFIGS 覆盖 Chain::ALL，见 test_registry_covers_all_chains
        &CHAIN_CONFIGS[self]
    }

    pub fn family(&self) -> ChainFamily {
        self.config().family
    }

    /// 代币链返回其底层链，原生链返回自身
    pub fn base_chain(&self) -> Chain {
        self.config().base_chain.unwrap_or(*self)
    }

    pub fn is_token(&self) -> bool {
        self.config().base_chain.is_some()
    }

    /// 是否支持交易准备/签名/广播（ADA 仅支持派生与地址）
    pub fn is_transactable(&self) -> bool {
        self.family() != ChainFamily::Cardano
    }

    pub fn decimals(&self) -> u32 {
        self.config().decimals
    }

    /// 区块浏览器交易链接
    pub fn explorer_url(&self, tx_hash: &str) -> String {
        format!("{}{}", self.config().explorer_tx_prefix, tx_hash)
    }

    /// UTXO 链参数
    pub fn utxo_params(&self) -> Option<&'static UtxoParams> {
        self.config().utxo.as_ref()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 不支持的链标识
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported chain: {0}")]
pub struct UnsupportedChain(pub String);

impl FromStr for Chain {
    type Err = UnsupportedChain;

    /// 接受规范代码与常见别名（大小写不敏感）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        let chain = match normalized.as_str() {
            "BTC" | "BITCOIN" => Chain::Btc,
            "BCH" | "BITCOINCASH" | "BITCOIN_CASH" => Chain::Bch,
            "DOGE" | "DOGECOIN" => Chain::Doge,
            "ETH" | "ETHEREUM" => Chain::Eth,
            "POL" | "POLYGON" | "MATIC" => Chain::Pol,
            "BNB" | "BSC" => Chain::Bnb,
            "SOL" | "SOLANA" => Chain::Sol,
            "ADA" | "CARDANO" => Chain::Ada,
            "USDT_ETH" | "USDT" => Chain::UsdtEth,
            "USDC_ETH" | "USDC" => Chain::UsdcEth,
            "USDT_POL" | "USDT_MATIC" => Chain::UsdtPol,
            "USDC_POL" | "USDC_MATIC" => Chain::UsdcPol,
            "USDT_BNB" | "USDT_BSC" => Chain::UsdtBnb,
            "USDT_SOL" => Chain::UsdtSol,
            "USDC_SOL" => Chain::UsdcSol,
            _ => return Err(UnsupportedChain(s.to_string())),
        };
        Ok(chain)
    }
}

/// 加密曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// secp256k1 曲线 (Bitcoin 系列, EVM 系列)
    Secp256k1,
    /// ed25519 曲线 (Solana, Cardano)
    Ed25519,
}

/// 链族：决定派生、编码、构建、签名、广播的实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Utxo,
    Evm,
    Solana,
    Cardano,
}

/// 地址编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFormat {
    /// 0x + EIP-55 校验大小写
    Eip55Hex,
    /// 版本字节 + HASH160 + 双 SHA256 校验和
    Base58Check,
    /// bitcoincash: 前缀的 CashAddr
    CashAddr,
    /// 原始公钥 Base58
    SolanaBase58,
    /// Shelley enterprise 地址 bech32
    CardanoBech32,
}

/// UTXO 签名哈希算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighashAlgorithm {
    /// 传统 SIGHASH_ALL
    Legacy,
    /// BIP143 + FORKID
    ForkId,
}

/// UTXO 链参数
#[derive(Debug, Clone)]
pub struct UtxoParams {
    pub p2pkh_version: u8,
    pub p2sh_version: u8,
    pub tx_version: u32,
    pub sighash: SighashAlgorithm,
    /// 附加在签名后的 sighash 字节
    pub sighash_type: u32,
    /// 找零粉尘阈值（最小单位）
    pub dust_threshold: u64,
    /// 手续费率兜底值（最小单位/字节）：低、中、高
    pub fallback_fee_rates: [u64; 3],
}

/// 链配置
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain: Chain,
    pub name: &'static str,
    /// 资产符号
    pub symbol: &'static str,
    pub family: ChainFamily,
    pub curve_type: CurveType,
    pub address_format: AddressFormat,
    /// BIP44 coin type
    pub coin_type: u32,
    /// 最小单位精度
    pub decimals: u32,
    /// 代币所在的底层链
    pub base_chain: Option<Chain>,
    /// 代币合约地址 / SPL mint
    pub token_contract: Option<&'static str>,
    /// EIP-155 chain id
    pub evm_chain_id: Option<u64>,
    pub explorer_tx_prefix: &'static str,
    pub utxo: Option<UtxoParams>,
}

impl ChainConfig {
    /// 生成派生路径
    ///
    /// secp256k1 链使用 BIP44 `m/44'/coin'/0'/0/index`；
    /// ed25519 链只允许硬化路径（SLIP-0010）。
    pub fn derivation_path(&self, index: u32) -> String {
        match self.family {
            ChainFamily::Utxo | ChainFamily::Evm => {
                format!("m/44'/{}'/0'/0/{}", self.coin_type, index)
            }
            ChainFamily::Solana => format!("m/44'/{}'/{}'/0'", self.coin_type, index),
            ChainFamily::Cardano => format!("m/1852'/{}'/{}'/0'/0'", self.coin_type, index),
        }
    }
}

fn utxo_chain(
    chain: Chain,
    name: &'static str,
    symbol: &'static str,
    address_format: AddressFormat,
    coin_type: u32,
    explorer_tx_prefix: &'static str,
    utxo: UtxoParams,
) -> ChainConfig {
    ChainConfig {
        chain,
        name,
        symbol,
        family: ChainFamily::Utxo,
        curve_type: CurveType::Secp256k1,
        address_format,
        coin_type,
        decimals: 8,
        base_chain: None,
        token_contract: None,
        evm_chain_id: None,
        explorer_tx_prefix,
        utxo: Some(utxo),
    }
}

fn evm_chain(
    chain: Chain,
    name: &'static str,
    symbol: &'static str,
    evm_chain_id: u64,
    explorer_tx_prefix: &'static str,
) -> ChainConfig {
    ChainConfig {
        chain,
        name,
        symbol,
        family: ChainFamily::Evm,
        curve_type: CurveType::Secp256k1,
        address_format: AddressFormat::Eip55Hex,
        coin_type: 60,
        decimals: 18,
        base_chain: None,
        token_contract: None,
        evm_chain_id: Some(evm_chain_id),
        explorer_tx_prefix,
        utxo: None,
    }
}

fn token(
    chain: Chain,
    base: &ChainConfig,
    symbol: &'static str,
    contract: &'static str,
    decimals: u32,
) -> ChainConfig {
    ChainConfig {
        chain,
        symbol,
        decimals,
        base_chain: Some(base.chain),
        token_contract: Some(contract),
        ..base.clone()
    }
}

static CHAIN_CONFIGS: Lazy<HashMap<Chain, ChainConfig>> = Lazy::new(|| {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Secp256k1 UTXO 系列
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    let btc = utxo_chain(
        Chain::Btc,
        "Bitcoin",
        "BTC",
        AddressFormat::Base58Check,
        0,
        "https://mempool.space/tx/",
        UtxoParams {
            p2pkh_version: 0x00,
            p2sh_version: 0x05,
            tx_version: 1,
            sighash: SighashAlgorithm::Legacy,
            sighash_type: 0x01,
            dust_threshold: 546,
            fallback_fee_rates: [5, 10, 20],
        },
    );
    let bch = utxo_chain(
        Chain::Bch,
        "Bitcoin Cash",
        "BCH",
        AddressFormat::CashAddr,
        145,
        "https://blockchair.com/bitcoin-cash/transaction/",
        UtxoParams {
            p2pkh_version: 0x00,
            p2sh_version: 0x05,
            tx_version: 2,
            sighash: SighashAlgorithm::ForkId,
            sighash_type: 0x41,
            dust_threshold: 546,
            fallback_fee_rates: [1, 1, 2],
        },
    );
    let doge = utxo_chain(
        Chain::Doge,
        "Dogecoin",
        "DOGE",
        AddressFormat::Base58Check,
        3,
        "https://blockchair.com/dogecoin/transaction/",
        UtxoParams {
            p2pkh_version: 0x1e,
            p2sh_version: 0x16,
            tx_version: 1,
            sighash: SighashAlgorithm::Legacy,
            sighash_type: 0x01,
            dust_threshold: 1_000_000,
            fallback_fee_rates: [1_000, 1_000, 2_000],
        },
    );

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Secp256k1 EVM 系列（共享 m/44'/60' 路径，同一索引同一地址）
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    let eth = evm_chain(Chain::Eth, "Ethereum", "ETH", 1, "https://etherscan.io/tx/");
    let pol = evm_chain(Chain::Pol, "Polygon", "POL", 137, "https://polygonscan.com/tx/");
    let bnb = evm_chain(
        Chain::Bnb,
        "BNB Smart Chain",
        "BNB",
        56,
        "https://bscscan.com/tx/",
    );

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Ed25519 系列
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    let sol = ChainConfig {
        chain: Chain::Sol,
        name: "Solana",
        symbol: "SOL",
        family: ChainFamily::Solana,
        curve_type: CurveType::Ed25519,
        address_format: AddressFormat::SolanaBase58,
        coin_type: 501,
        decimals: 9,
        base_chain: None,
        token_contract: None,
        evm_chain_id: None,
        explorer_tx_prefix: "https://solscan.io/tx/",
        utxo: None,
    };
    let ada = ChainConfig {
        chain: Chain::Ada,
        name: "Cardano",
        symbol: "ADA",
        family: ChainFamily::Cardano,
        curve_type: CurveType::Ed25519,
        address_format: AddressFormat::CardanoBech32,
        coin_type: 1815,
        decimals: 6,
        base_chain: None,
        token_contract: None,
        evm_chain_id: None,
        explorer_tx_prefix: "https://cardanoscan.io/transaction/",
        utxo: None,
    };

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 代币（继承底层链的地址与密钥）
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    let tokens = vec![
        token(
            Chain::UsdtEth,
            &eth,
            "USDT",
            "0xdAC17F958D2ee523a2206206994597C13D831ec7",
            6,
        ),
        token(
            Chain::UsdcEth,
            &eth,
            "USDC",
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            6,
        ),
        token(
            Chain::UsdtPol,
            &pol,
            "USDT",
            "0xc2132D05D31c914a87C6611C10748AEb04B58e8F",
            6,
        ),
        token(
            Chain::UsdcPol,
            &pol,
            "USDC",
            "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
            6,
        ),
        token(
            Chain::UsdtBnb,
            &bnb,
            "USDT",
            "0x55d398326f99059fF775485246999027B3197955",
            18,
        ),
        token(
            Chain::UsdtSol,
            &sol,
            "USDT",
            "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
            6,
        ),
        token(
            Chain::UsdcSol,
            &sol,
            "USDC",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            6,
        ),
    ];

    let mut configs = HashMap::new();
    for config in [btc, bch, doge, eth, pol, bnb, sol, ada]
        .into_iter()
        .chain(tokens)
    {
        configs.insert(config.chain, config);
    }
    configs
});

/// 链配置注册表（只读视图）
pub struct ChainRegistry;

impl ChainRegistry {
    /// 通过链代码或别名获取配置
    pub fn get_by_symbol(symbol: &str) -> Option<&'static ChainConfig> {
        symbol.parse::<Chain>().ok().map(|c| c.config())
    }

    /// 按曲线类型分组获取所有链
    pub fn get_by_curve_type(curve_type: CurveType) -> Vec<&'static ChainConfig> {
        Self::list_all()
            .into_iter()
            .filter(|c| c.curve_type == curve_type)
            .collect()
    }

    /// 列出所有支持的链（按 Chain 顺序）
    pub fn list_all() -> Vec<&'static ChainConfig> {
        Chain::ALL.iter().map(|c| c.config()).collect()
    }

    /// 验证链配置完整性
    pub fn validate_configs() -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for config in Self::list_all() {
            match (config.family, config.curve_type, config.address_format) {
                (ChainFamily::Evm, CurveType::Secp256k1, AddressFormat::Eip55Hex)
                | (ChainFamily::Utxo, CurveType::Secp256k1, AddressFormat::Base58Check)
                | (ChainFamily::Utxo, CurveType::Secp256k1, AddressFormat::CashAddr)
                | (ChainFamily::Solana, CurveType::Ed25519, AddressFormat::SolanaBase58)
                | (ChainFamily::Cardano, CurveType::Ed25519, AddressFormat::CardanoBech32) => {}
                _ => errors.push(format!(
                    "Chain {} has incompatible family/curve/address format: {:?} / {:?} / {:?}",
                    config.chain, config.family, config.curve_type, config.address_format
                )),
            }

            if config.family == ChainFamily::Evm && config.evm_chain_id.is_none() {
                errors.push(format!("EVM chain {} has no chain id", config.chain));
            }
            if config.family == ChainFamily::Utxo && config.utxo.is_none() {
                errors.push(format!("UTXO chain {} has no utxo params", config.chain));
            }
            if config.base_chain.is_some() && config.token_contract.is_none() {
                errors.push(format!("Token {} has no contract", config.chain));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
