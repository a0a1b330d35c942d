//! 密钥派生集成测试
//!
//! 测试覆盖：参考向量、确定性、链间隔离、代币复用底层链、索引分配

mod common;

use std::{collections::HashSet, sync::Arc};

use common::MNEMONIC;
use ironvault::{
    domain::{
        chain_config::Chain,
        derivation::{derive_key, derive_key_for_code, derive_wallet_bundle, validate_mnemonic},
    },
    repository::{DerivationIndexRepository, InMemoryStore},
    utils::address_validator::AddressValidator,
};

#[test]
fn test_reference_addresses() {
    assert_eq!(
        derive_key(MNEMONIC, Chain::Btc, 0).unwrap().address,
        "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
    );
    assert_eq!(
        derive_key(MNEMONIC, Chain::Eth, 0).unwrap().address,
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );
}

#[test]
fn test_every_chain_derives_a_valid_address() {
    for chain in Chain::ALL {
        let key = derive_key(MNEMONIC, chain, 0).unwrap();
        assert_eq!(key.chain, chain);
        assert_eq!(key.private_key.len(), 64, "{}", chain);
        assert!(
            AddressValidator::validate(chain, &key.address),
            "{} produced invalid address {}",
            chain,
            key.address
        );
    }
}

#[test]
fn test_derivation_is_deterministic() {
    for chain in [Chain::Btc, Chain::Doge, Chain::Sol, Chain::Ada] {
        let a = derive_key(MNEMONIC, chain, 5).unwrap();
        let b = derive_key(MNEMONIC, chain, 5).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.public_key, b.public_key);
        assert_eq!(a.private_key, b.private_key);
    }
}

#[test]
fn test_indices_produce_distinct_addresses() {
    for chain in [Chain::Btc, Chain::Eth, Chain::Sol] {
        let addresses: HashSet<String> = (0..10)
            .map(|i| derive_key(MNEMONIC, chain, i).unwrap().address.clone())
            .collect();
        assert_eq!(addresses.len(), 10, "{}", chain);
    }
}

#[test]
fn test_tokens_share_base_chain_keys() {
    for chain in Chain::ALL.into_iter().filter(|c| c.is_token()) {
        let token = derive_key(MNEMONIC, chain, 3).unwrap();
        let base = derive_key(MNEMONIC, chain.base_chain(), 3).unwrap();
        assert_eq!(token.address, base.address, "{}", chain);
        assert_eq!(token.derivation_path, base.derivation_path);
    }
}

#[test]
fn test_chain_codes_and_aliases() {
    let by_alias = derive_key_for_code(MNEMONIC, "ethereum", 0).unwrap();
    let by_code = derive_key(MNEMONIC, Chain::Eth, 0).unwrap();
    assert_eq!(by_alias.address, by_code.address);

    assert!(derive_key_for_code(MNEMONIC, "XRP", 0).is_err());
}

#[test]
fn test_mnemonic_checks() {
    assert!(validate_mnemonic(MNEMONIC));
    // 校验和错误
    assert!(!validate_mnemonic(
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"
    ));
    assert!(derive_key("not a mnemonic", Chain::Btc, 0).is_err());
}

#[test]
fn test_wallet_bundle_matches_single_derivations() {
    let chains = [Chain::Btc, Chain::Eth, Chain::UsdtEth, Chain::Sol];
    let bundle = derive_wallet_bundle(MNEMONIC, &chains).unwrap();

    assert_eq!(bundle.addresses.len(), chains.len());
    for (entry, chain) in bundle.addresses.iter().zip(chains) {
        let key = derive_key(MNEMONIC, chain, 0).unwrap();
        assert_eq!(entry.chain, chain);
        assert_eq!(entry.address, key.address);
        assert_eq!(entry.public_key, key.public_key);
    }
    assert_ne!(bundle.master_keys.secp256k1, bundle.master_keys.ed25519);

    // 出现一个非法输入时整体失败
    assert!(derive_wallet_bundle("abandon", &chains).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_index_allocation_is_unique() {
    let store = Arc::new(InMemoryStore::new());

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.next_index(Chain::Eth).await })
        })
        .collect();

    let mut indices = Vec::new();
    for handle in handles {
        indices.push(handle.await.unwrap().unwrap());
    }
    indices.sort_unstable();
    assert_eq!(indices, (0..50).collect::<Vec<u32>>());

    // 各链独立计数
    assert_eq!(store.next_index(Chain::Btc).await.unwrap(), 0);
}
