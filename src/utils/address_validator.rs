//! 地址验证模块
//!
//! 统一的收款地址验证与 UTXO 输出脚本转换。
//! 所有函数对任意输入返回 bool / Option，不会 panic。

use std::str::FromStr;

use bitcoin::{address::NetworkUnchecked, hashes::Hash, Network, PubkeyHash, ScriptBuf, ScriptHash};

use crate::{
    codec::{base58check, cashaddr, eip55},
    domain::chain_config::{AddressFormat, Chain, ChainFamily},
};

/// DOGE / BCH 解码后的目标（BTC 直接交给 bitcoin::Address）
#[derive(Debug, Clone, PartialEq, Eq)]
enum UtxoDestination {
    P2pkh([u8; 20]),
    P2sh([u8; 20]),
}

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式（代币链按底层链规则）
    pub fn validate(chain: Chain, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }

        match chain.family() {
            ChainFamily::Evm => eip55::parse(address).is_some(),
            ChainFamily::Utxo => Self::output_script(chain, address).is_some(),
            ChainFamily::Solana => Self::decode_solana(address).is_some(),
            ChainFamily::Cardano => Self::validate_cardano_address(address),
        }
    }

    /// 按链代码验证；未知链返回 false
    pub fn validate_str(chain: &str, address: &str) -> bool {
        chain
            .parse::<Chain>()
            .map(|c| Self::validate(c, address))
            .unwrap_or(false)
    }

    /// UTXO 地址 -> 输出脚本（scriptPubKey）字节
    pub fn script_pubkey_for(chain: Chain, address: &str) -> Option<Vec<u8>> {
        Self::output_script(chain, address).map(ScriptBuf::into_bytes)
    }

    /// UTXO 地址 -> 输出脚本
    ///
    /// BTC 接受 P2PKH、P2SH 与 segwit（bech32 / bech32m）主网地址。
    pub fn output_script(chain: Chain, address: &str) -> Option<ScriptBuf> {
        let address = address.trim();
        if chain.base_chain() == Chain::Btc {
            return Self::parse_bitcoin(address).map(|a| a.script_pubkey());
        }

        Some(match Self::decode_utxo(chain, address)? {
            UtxoDestination::P2pkh(hash) => ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash)),
            UtxoDestination::P2sh(hash) => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash)),
        })
    }

    fn parse_bitcoin(address: &str) -> Option<bitcoin::Address> {
        bitcoin::Address::<NetworkUnchecked>::from_str(address)
            .ok()?
            .require_network(Network::Bitcoin)
            .ok()
    }

    /// Solana 地址 -> 32 字节公钥
    pub fn decode_solana(address: &str) -> Option<[u8; 32]> {
        if address.len() < 32 || address.len() > 44 {
            return None;
        }
        let decoded = bs58::decode(address).into_vec().ok()?;
        decoded.try_into().ok()
    }

    fn decode_utxo(chain: Chain, address: &str) -> Option<UtxoDestination> {
        let config = chain.base_chain().config();
        let params = config.utxo.as_ref()?;

        if config.address_format == AddressFormat::CashAddr {
            // BCH: CashAddr（可省略前缀）或传统 P2PKH
            if let Some((address_type, hash)) = cashaddr::decode(address, cashaddr::MAINNET_PREFIX)
            {
                return Some(match address_type {
                    cashaddr::AddressType::P2pkh => UtxoDestination::P2pkh(hash),
                    cashaddr::AddressType::P2sh => UtxoDestination::P2sh(hash),
                });
            }
            return match base58check::decode_hash160(address)? {
                (version, hash) if version == params.p2pkh_version => {
                    Some(UtxoDestination::P2pkh(hash))
                }
                _ => None,
            };
        }

        match base58check::decode_hash160(address)? {
            (version, hash) if version == params.p2pkh_version => Some(UtxoDestination::P2pkh(hash)),
            (version, hash) if version == params.p2sh_version => Some(UtxoDestination::P2sh(hash)),
            _ => None,
        }
    }

    /// Cardano Shelley mainnet 地址（enterprise 29 字节或 base 57 字节）
    fn validate_cardano_address(address: &str) -> bool {
        let Ok((hrp, data)) = bech32::decode(address) else {
            return false;
        };
        if hrp.as_str() != "addr" {
            return false;
        }
        match data.first() {
            Some(header) if header & 0x0f == 0x01 => matches!(data.len(), 29 | 57),
            _ => false,
        }
    }
}
