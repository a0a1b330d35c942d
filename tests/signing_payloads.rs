//! 签名载荷集成测试
//!
//! 以准备接口返回的 JSON 形态输入，验证三类链族的签名输出

mod common;

use base64::Engine;
use common::{BLOCKHASH, ETH_RECIPIENT, MNEMONIC};
use ironvault::{
    domain::{
        chain_config::Chain,
        derivation::derive_key,
        transaction::{
            EvmUnsignedTx, SolanaUnsignedTx, UnsignedTransaction, UtxoInput, UtxoOutput,
            UtxoUnsignedTx,
        },
    },
    signing::{
        evm::transaction_hash, sign_transaction, sign_transaction_json, SignedFormat,
        SigningError,
    },
    utils::address_validator::AddressValidator,
};

fn evm_tx() -> UnsignedTransaction {
    UnsignedTransaction::Evm(EvmUnsignedTx {
        chain: Chain::Pol,
        chain_id: 137,
        nonce: 3,
        to: ETH_RECIPIENT.to_string(),
        value: 10_000_000_000_000_000,
        gas_limit: 21_000,
        max_fee_per_gas: 40_000_000_000,
        max_priority_fee_per_gas: 2_000_000_000,
        data: None,
        token_contract: None,
    })
}

fn utxo_tx(chain: Chain, owner: &str) -> UnsignedTransaction {
    let script = AddressValidator::script_pubkey_for(chain, owner).unwrap();
    UnsignedTransaction::Utxo(UtxoUnsignedTx {
        chain,
        inputs: vec![UtxoInput {
            txid: "11".repeat(32),
            vout: 1,
            value: 200_000,
            script_pubkey: hex::encode(script),
        }],
        outputs: vec![UtxoOutput {
            address: owner.to_string(),
            value: 190_000,
        }],
        fee_rate: 10,
        fee: 10_000,
    })
}

#[test]
fn test_evm_json_round_through_signer() {
    let key = derive_key(MNEMONIC, Chain::Pol, 0).unwrap();
    let json = serde_json::to_value(evm_tx()).unwrap();
    assert_eq!(json["type"], "evm");
    // u128 字段以字符串传输
    assert_eq!(json["value"], "10000000000000000");

    let signed = sign_transaction_json(&json, &key.private_key).unwrap();
    assert_eq!(signed.format, SignedFormat::Hex);
    assert!(signed.signed_tx.starts_with("0x02"));

    // RFC 6979 确定性签名
    let again = sign_transaction(&evm_tx(), &key.private_key).unwrap();
    assert_eq!(again.signed_tx, signed.signed_tx);

    let hash = transaction_hash(&signed.signed_tx).unwrap();
    assert_eq!(hash.len(), 66);
}

#[test]
fn test_bch_signature_uses_forkid_serialization() {
    let key = derive_key(MNEMONIC, Chain::Bch, 0).unwrap();
    let tx = utxo_tx(Chain::Bch, &key.address);

    let signed = sign_transaction(&tx, &key.private_key).unwrap();
    assert_eq!(signed.format, SignedFormat::Hex);
    let raw = hex::decode(&signed.signed_tx).unwrap();
    assert_eq!(&raw[..4], &2u32.to_le_bytes());
    assert_eq!(raw[4], 1);
    // version(4) ‖ count(1) ‖ outpoint(36) ‖ script_len(1) ‖ sig_len(1) ‖ DER ‖ sighash
    let sig_len = raw[42] as usize;
    // SIGHASH_ALL | FORKID，随后压入 33 字节压缩公钥
    assert_eq!(raw[42 + sig_len], 0x41);
    assert_eq!(raw[43 + sig_len], 0x21);
}

#[test]
fn test_utxo_rejects_key_for_other_address() {
    let owner = derive_key(MNEMONIC, Chain::Doge, 0).unwrap();
    let other = derive_key(MNEMONIC, Chain::Doge, 1).unwrap();
    let tx = utxo_tx(Chain::Doge, &owner.address);

    let err = sign_transaction(&tx, &other.private_key).unwrap_err();
    assert!(matches!(err, SigningError::KeyMismatch(_)));
}

#[test]
fn test_spl_transfer_signed_as_base64() {
    let key = derive_key(MNEMONIC, Chain::UsdcSol, 0).unwrap();
    let recipient = derive_key(MNEMONIC, Chain::Sol, 1).unwrap();
    let tx = UnsignedTransaction::Solana(SolanaUnsignedTx {
        chain: Chain::UsdcSol,
        fee_payer: key.address.clone(),
        recent_blockhash: BLOCKHASH.to_string(),
        instructions: Vec::new(),
        fee: 5_000,
        mint: Chain::UsdcSol.config().token_contract.map(str::to_string),
        recipient: Some(recipient.address.clone()),
        amount: Some(1_000_000),
    });
    let json = serde_json::to_value(&tx).unwrap();

    let signed = sign_transaction_json(&json, &key.private_key).unwrap();
    assert_eq!(signed.format, SignedFormat::Base64);

    let wire = base64::engine::general_purpose::STANDARD
        .decode(&signed.signed_tx)
        .unwrap();
    // 一个签名
    assert_eq!(wire[0], 1);
    // 消息头：1 个签名者，0 个只读签名者
    assert_eq!(wire[65], 1);
    assert_eq!(wire[66], 0);
}

#[test]
fn test_unsupported_payloads() {
    let key = derive_key(MNEMONIC, Chain::Eth, 0).unwrap();

    let err = sign_transaction_json(&serde_json::json!({ "type": "cardano" }), &key.private_key)
        .unwrap_err();
    assert!(matches!(err, SigningError::UnsupportedType(_)));

    let err = sign_transaction_json(&serde_json::json!({ "type": "evm" }), &key.private_key)
        .unwrap_err();
    assert!(matches!(err, SigningError::Malformed(_)));

    let err = sign_transaction(&evm_tx(), "zz").unwrap_err();
    assert!(matches!(err, SigningError::InvalidPrivateKey));
}
