//! 地址与线格式编解码
//!
//! 纯函数集合：哈希原语、各链地址编码以及交易序列化使用的底层编码。
//! 任何畸形输入都返回 `None`/`false`，不会 panic。

pub mod base58check;
pub mod cashaddr;
pub mod eip55;
pub mod wire;

use bitcoin::{
    hashes::{hash160, sha256d, Hash},
    Network, PublicKey,
};
use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use sha3::{Digest, Keccak256};

use crate::domain::chain_config::{AddressFormat, Chain};

/// Cardano Shelley enterprise 地址头（mainnet，payment key hash）
pub const CARDANO_ENTERPRISE_HEADER: u8 = 0x61;

/// SHA256(SHA256(data))
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Blake2b-224（Cardano key hash）
pub fn blake2b_224(data: &[u8]) -> [u8; 28] {
    let mut output = [0u8; 28];
    // 28 是 Blake2bVar 合法输出长度，两处均不会失败
    if let Ok(mut hasher) = Blake2bVar::new(28) {
        hasher.update(data);
        let _ = hasher.finalize_variable(&mut output);
    }
    output
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 地址编码
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// EVM 地址：keccak256(未压缩公钥去掉 0x04)[12..]，EIP-55 大小写
pub fn evm_address(uncompressed_pubkey: &[u8]) -> String {
    let body = match uncompressed_pubkey.len() {
        65 => &uncompressed_pubkey[1..],
        _ => uncompressed_pubkey,
    };
    let hash = keccak256(body);
    eip55::to_checksum(&hash[12..])
}

/// 压缩公钥 -> P2PKH 地址（BTC 走 bitcoin::Address，BCH/DOGE 按链编码）
pub fn p2pkh_address(chain: Chain, compressed_pubkey: &[u8]) -> Option<String> {
    let config = chain.base_chain().config();
    let params = config.utxo.as_ref()?;
    if chain.base_chain() == Chain::Btc {
        let public_key = PublicKey::from_slice(compressed_pubkey).ok()?;
        return Some(bitcoin::Address::p2pkh(&public_key, Network::Bitcoin).to_string());
    }
    let pubkey_hash = hash160(compressed_pubkey);
    match config.address_format {
        AddressFormat::CashAddr => Some(cashaddr::encode(
            cashaddr::MAINNET_PREFIX,
            cashaddr::AddressType::P2pkh,
            &pubkey_hash,
        )),
        _ => Some(base58check::encode(params.p2pkh_version, &pubkey_hash)),
    }
}

/// Solana 地址：32 字节公钥的 Base58
pub fn solana_address(pubkey: &[u8; 32]) -> String {
    bs58::encode(pubkey).into_string()
}

/// Cardano enterprise 地址：bech32("addr", 0x61 ‖ blake2b-224(pubkey))
pub fn cardano_enterprise_address(pubkey: &[u8; 32]) -> Option<String> {
    let mut payload = Vec::with_capacity(29);
    payload.push(CARDANO_ENTERPRISE_HEADER);
    payload.extend_from_slice(&blake2b_224(pubkey));

    let hrp = bech32::Hrp::parse("addr").ok()?;
    bech32::encode::<bech32::Bech32>(hrp, &payload).ok()
}
