//! 钱包派生策略
//!
//! 从 BIP39 助记词派生各链密钥与地址：
//! - secp256k1 链走 BIP32（coins-bip32）
//! - ed25519 链走 SLIP-0010（仅硬化路径）
//!
//! 派生是同步纯函数，种子与私钥只存在于 `Zeroizing` 缓冲区中。

use std::fmt;

use bip39::{Language, Mnemonic};
use coins_bip32::{path::DerivationPath, xkeys::XPriv};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    codec,
    domain::chain_config::{Chain, ChainConfig, ChainFamily, CurveType, UnsupportedChain},
};

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;
const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

/// 派生错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerivationError {
    #[error("invalid mnemonic")]
    InvalidMnemonic,
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

impl From<UnsupportedChain> for DerivationError {
    fn from(err: UnsupportedChain) -> Self {
        DerivationError::UnsupportedChain(err.0)
    }
}

/// 派生结果
///
/// 私钥在 drop 时清零；`Debug` 输出不包含私钥。
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    #[zeroize(skip)]
    pub chain: Chain,
    #[zeroize(skip)]
    pub index: u32,
    #[zeroize(skip)]
    pub derivation_path: String,
    /// 公钥 (hex；secp256k1 为 33 字节压缩格式，ed25519 为 32 字节)
    #[zeroize(skip)]
    pub public_key: String,
    /// 私钥 (hex，32 字节)
    pub private_key: String,
    #[zeroize(skip)]
    pub address: String,
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("chain", &self.chain)
            .field("index", &self.index)
            .field("derivation_path", &self.derivation_path)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}

/// 钱包派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    /// 从种子派生指定链与索引的密钥
    fn derive(
        &self,
        seed: &[u8],
        chain_config: &ChainConfig,
        index: u32,
    ) -> Result<DerivedKey, DerivationError>;

    /// 根公钥 (hex)，用于钱包注册
    fn root_public_key(&self, seed: &[u8]) -> Result<String, DerivationError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Secp256k1 策略 (BTC, BCH, DOGE, EVM 系列)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Secp256k1Strategy;

impl DerivationStrategy for Secp256k1Strategy {
    fn derive(
        &self,
        seed: &[u8],
        chain_config: &ChainConfig,
        index: u32,
    ) -> Result<DerivedKey, DerivationError> {
        use k256::ecdsa::SigningKey;

        let path = chain_config.derivation_path(index);
        let derivation_path = path
            .parse::<DerivationPath>()
            .map_err(|e| DerivationError::InvalidPath(e.to_string()))?;

        let master_key = XPriv::root_from_seed(seed, None)
            .map_err(|e| DerivationError::KeyDerivation(e.to_string()))?;
        let derived_key = master_key
            .derive_path(&derivation_path)
            .map_err(|e| DerivationError::KeyDerivation(e.to_string()))?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        let verifying_key = signing_key.verifying_key();
        let compressed = verifying_key.to_encoded_point(true);

        let address = match chain_config.family {
            ChainFamily::Evm => {
                let uncompressed = verifying_key.to_encoded_point(false);
                codec::evm_address(uncompressed.as_bytes())
            }
            ChainFamily::Utxo => codec::p2pkh_address(chain_config.chain, compressed.as_bytes())
                .ok_or_else(|| {
                    DerivationError::KeyDerivation(format!(
                        "no address encoder for {}",
                        chain_config.chain
                    ))
                })?,
            _ => {
                return Err(DerivationError::UnsupportedChain(
                    chain_config.chain.to_string(),
                ))
            }
        };

        Ok(DerivedKey {
            chain: chain_config.chain,
            index,
            derivation_path: path,
            public_key: hex::encode(compressed.as_bytes()),
            private_key: hex::encode(signing_key.to_bytes()),
            address,
        })
    }

    fn root_public_key(&self, seed: &[u8]) -> Result<String, DerivationError> {
        use k256::ecdsa::SigningKey;

        let master_key = XPriv::root_from_seed(seed, None)
            .map_err(|e| DerivationError::KeyDerivation(e.to_string()))?;
        let signing_key: &SigningKey = master_key.as_ref();
        Ok(hex::encode(
            signing_key.verifying_key().to_encoded_point(true).as_bytes(),
        ))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ed25519 策略 (Solana, Cardano)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Ed25519Strategy;

impl DerivationStrategy for Ed25519Strategy {
    fn derive(
        &self,
        seed: &[u8],
        chain_config: &ChainConfig,
        index: u32,
    ) -> Result<DerivedKey, DerivationError> {
        use ed25519_dalek::SigningKey;

        let path = chain_config.derivation_path(index);
        let segments = parse_hardened_path(&path)?;
        let secret = slip10_derive(seed, &segments)?;

        let signing_key = SigningKey::from_bytes(&secret);
        let public_key = signing_key.verifying_key().to_bytes();

        let address = match chain_config.family {
            ChainFamily::Solana => codec::solana_address(&public_key),
            ChainFamily::Cardano => codec::cardano_enterprise_address(&public_key)
                .ok_or_else(|| DerivationError::KeyDerivation("bech32 encoding failed".into()))?,
            _ => {
                return Err(DerivationError::UnsupportedChain(
                    chain_config.chain.to_string(),
                ))
            }
        };

        Ok(DerivedKey {
            chain: chain_config.chain,
            index,
            derivation_path: path,
            public_key: hex::encode(public_key),
            private_key: hex::encode(secret.as_slice()),
            address,
        })
    }

    fn root_public_key(&self, seed: &[u8]) -> Result<String, DerivationError> {
        let (secret, _chain_code) = slip10_master(seed)?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
        Ok(hex::encode(signing_key.verifying_key().to_bytes()))
    }
}

/// 解析 SLIP-0010 路径，每一段都必须是硬化索引
fn parse_hardened_path(path: &str) -> Result<Vec<u32>, DerivationError> {
    let mut parts = path.split('/');
    if parts.next() != Some("m") {
        return Err(DerivationError::InvalidPath(path.to_string()));
    }

    parts
        .map(|segment| {
            let raw = segment
                .strip_suffix('\'')
                .or_else(|| segment.strip_suffix('h'))
                .ok_or_else(|| {
                    DerivationError::InvalidPath(format!("ed25519 requires hardened segment: {path}"))
                })?;
            let index = raw
                .parse::<u32>()
                .map_err(|_| DerivationError::InvalidPath(path.to_string()))?;
            if index >= HARDENED_OFFSET {
                return Err(DerivationError::InvalidPath(path.to_string()));
            }
            Ok(index)
        })
        .collect()
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<[u8; 64]>, DerivationError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| DerivationError::KeyDerivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

type KeyAndChainCode = (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>);

fn split_output(output: &[u8; 64]) -> KeyAndChainCode {
    let mut key = Zeroizing::new([0u8; 32]);
    let mut chain_code = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&output[..32]);
    chain_code.copy_from_slice(&output[32..]);
    (key, chain_code)
}

/// SLIP-0010 主密钥：HMAC-SHA512("ed25519 seed", seed)
fn slip10_master(seed: &[u8]) -> Result<KeyAndChainCode, DerivationError> {
    let output = hmac_sha512(ED25519_SEED_KEY, &[seed])?;
    Ok(split_output(&output))
}

/// SLIP-0010 硬化派生：HMAC-SHA512(chain_code, 0x00 ‖ key ‖ be32(index + 2^31))
fn slip10_derive(seed: &[u8], segments: &[u32]) -> Result<Zeroizing<[u8; 32]>, DerivationError> {
    let (mut key, mut chain_code) = slip10_master(seed)?;
    for index in segments {
        let hardened = (index | HARDENED_OFFSET).to_be_bytes();
        let output = hmac_sha512(chain_code.as_slice(), &[&[0u8], key.as_slice(), &hardened])?;
        (key, chain_code) = split_output(&output);
    }
    Ok(key)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 策略工厂
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 策略工厂
pub struct DerivationStrategyFactory;

impl DerivationStrategyFactory {
    /// 根据曲线类型创建策略
    pub fn create_strategy(curve_type: CurveType) -> Box<dyn DerivationStrategy> {
        match curve_type {
            CurveType::Secp256k1 => Box::new(Secp256k1Strategy),
            CurveType::Ed25519 => Box::new(Ed25519Strategy),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 对外操作
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 钱包注册用的公开数据
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WalletBundle {
    pub master_keys: MasterKeys,
    pub addresses: Vec<BundleAddress>,
}

/// 两条曲线的根公钥 (hex)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MasterKeys {
    pub secp256k1: String,
    pub ed25519: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BundleAddress {
    pub chain: Chain,
    pub address: String,
    pub public_key: String,
    pub derivation_path: String,
}

fn seed_from(mnemonic: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>, DerivationError> {
    let mnemonic = Mnemonic::parse_in(Language::English, mnemonic)
        .map_err(|_| DerivationError::InvalidMnemonic)?;
    Ok(Zeroizing::new(mnemonic.to_seed(passphrase)))
}

fn derive_from_seed(seed: &[u8], chain: Chain, index: u32) -> Result<DerivedKey, DerivationError> {
    // 代币与底层链共享密钥与地址
    let base_config = chain.base_chain().config();
    let strategy = DerivationStrategyFactory::create_strategy(base_config.curve_type);
    let mut key = strategy.derive(seed, base_config, index)?;
    key.chain = chain;
    Ok(key)
}

/// 校验助记词（英文词表、12–24 词、校验和）
pub fn validate_mnemonic(mnemonic: &str) -> bool {
    Mnemonic::parse_in(Language::English, mnemonic).is_ok()
}

/// 派生指定链与索引的密钥
pub fn derive_key(mnemonic: &str, chain: Chain, index: u32) -> Result<DerivedKey, DerivationError> {
    derive_key_with_passphrase(mnemonic, "", chain, index)
}

/// 带 BIP39 passphrase 的派生
pub fn derive_key_with_passphrase(
    mnemonic: &str,
    passphrase: &str,
    chain: Chain,
    index: u32,
) -> Result<DerivedKey, DerivationError> {
    let seed = seed_from(mnemonic, passphrase)?;
    derive_from_seed(seed.as_slice(), chain, index)
}

/// 按链代码派生（接受别名）
pub fn derive_key_for_code(
    mnemonic: &str,
    chain: &str,
    index: u32,
) -> Result<DerivedKey, DerivationError> {
    let chain = chain.parse::<Chain>()?;
    derive_key(mnemonic, chain, index)
}

/// 派生钱包注册数据：每条请求链索引 0 的地址，加两条曲线的根公钥
///
/// 全部成功才返回，不产生部分结果。
pub fn derive_wallet_bundle(
    mnemonic: &str,
    chains: &[Chain],
) -> Result<WalletBundle, DerivationError> {
    let seed = seed_from(mnemonic, "")?;

    let master_keys = MasterKeys {
        secp256k1: Secp256k1Strategy.root_public_key(seed.as_slice())?,
        ed25519: Ed25519Strategy.root_public_key(seed.as_slice())?,
    };

    let addresses = chains
        .iter()
        .map(|chain| {
            let key = derive_from_seed(seed.as_slice(), *chain, 0)?;
            Ok(BundleAddress {
                chain: *chain,
                address: key.address.clone(),
                public_key: key.public_key.clone(),
                derivation_path: key.derivation_path.clone(),
            })
        })
        .collect::<Result<Vec<_>, DerivationError>>()?;

    Ok(WalletBundle {
        master_keys,
        addresses,
    })
}
