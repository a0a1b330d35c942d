//! UTXO 交易签名（P2PKH 输入）
//!
//! 交易结构、传统 sighash 与序列化走 bitcoin crate：
//! - BTC / DOGE：传统 SIGHASH_ALL 原像
//! - BCH：BIP143 原像 + SIGHASH_ALL|FORKID（bitcoin crate 无对应实现）

use std::str::FromStr;

use bitcoin::{
    absolute::LockTime,
    consensus,
    hashes::Hash,
    script::{Builder, PushBytesBuf},
    sighash::SighashCache,
    transaction::Version,
    Amount, OutPoint, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};

use super::{decode_hex, SigningError};
use crate::{
    codec::sha256d,
    domain::{
        chain_config::{SighashAlgorithm, UtxoParams},
        transaction::UtxoUnsignedTx,
    },
    utils::address_validator::AddressValidator,
};

/// 未签名交易；`values[i]` 为第 i 个输入花费的金额（BIP143 需要）
struct UnsignedSpend {
    tx: Transaction,
    values: Vec<u64>,
}

fn build_inputs(tx: &UtxoUnsignedTx, own_script: &ScriptBuf) -> Result<Vec<TxIn>, SigningError> {
    tx.inputs
        .iter()
        .map(|input| {
            let txid = Txid::from_str(input.txid.trim_start_matches("0x"))
                .map_err(|_| SigningError::Malformed("txid must be 32 bytes of hex".into()))?;

            if !input.script_pubkey.is_empty() {
                let script = decode_hex("script_pubkey", &input.script_pubkey)?;
                if script.as_slice() != own_script.as_bytes() {
                    return Err(SigningError::KeyMismatch(format!(
                        "input {}:{}",
                        input.txid, input.vout
                    )));
                }
            }

            Ok(TxIn {
                previous_output: OutPoint::new(txid, input.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            })
        })
        .collect()
}

fn build_outputs(tx: &UtxoUnsignedTx) -> Result<Vec<TxOut>, SigningError> {
    tx.outputs
        .iter()
        .map(|output| {
            let script_pubkey = AddressValidator::output_script(tx.chain, &output.address)
                .ok_or_else(|| SigningError::InvalidAddress(output.address.clone()))?;
            Ok(TxOut {
                value: Amount::from_sat(output.value),
                script_pubkey,
            })
        })
        .collect()
}

fn build_unsigned(
    params: &UtxoParams,
    tx: &UtxoUnsignedTx,
    own_script: &ScriptBuf,
) -> Result<UnsignedSpend, SigningError> {
    let version = i32::try_from(params.tx_version)
        .map_err(|_| SigningError::Malformed("transaction version out of range".into()))?;
    Ok(UnsignedSpend {
        tx: Transaction {
            version: Version(version),
            lock_time: LockTime::ZERO,
            input: build_inputs(tx, own_script)?,
            output: build_outputs(tx)?,
        },
        values: tx.inputs.iter().map(|i| i.value).collect(),
    })
}

/// 传统 SIGHASH_ALL：仅被签输入携带 scriptCode
fn legacy_sighash(
    params: &UtxoParams,
    spend: &UnsignedSpend,
    script_code: &ScriptBuf,
    index: usize,
) -> Result<[u8; 32], SigningError> {
    SighashCache::new(&spend.tx)
        .legacy_signature_hash(index, script_code, params.sighash_type)
        .map(|hash| hash.to_byte_array())
        .map_err(|e| SigningError::Signature(e.to_string()))
}

/// BIP143 原像（BCH 使用 FORKID）
fn forkid_sighash(
    params: &UtxoParams,
    spend: &UnsignedSpend,
    script_code: &ScriptBuf,
    index: usize,
) -> [u8; 32] {
    let tx = &spend.tx;
    let prevouts: Vec<u8> = tx
        .input
        .iter()
        .flat_map(|input| consensus::serialize(&input.previous_output))
        .collect();
    let sequences: Vec<u8> = tx
        .input
        .iter()
        .flat_map(|input| input.sequence.to_consensus_u32().to_le_bytes())
        .collect();
    let outputs: Vec<u8> = tx.output.iter().flat_map(consensus::serialize).collect();

    let input = &tx.input[index];
    let mut preimage = Vec::with_capacity(4 + 32 * 3 + 36 + 26 + 8 + 4 + 4 + 4);
    preimage.extend_from_slice(&tx.version.0.to_le_bytes());
    preimage.extend_from_slice(&sha256d(&prevouts));
    preimage.extend_from_slice(&sha256d(&sequences));
    preimage.extend_from_slice(&consensus::serialize(&input.previous_output));
    preimage.extend_from_slice(&consensus::serialize(script_code));
    preimage.extend_from_slice(&spend.values[index].to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_consensus_u32().to_le_bytes());
    preimage.extend_from_slice(&sha256d(&outputs));
    preimage.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
    preimage.extend_from_slice(&params.sighash_type.to_le_bytes());
    sha256d(&preimage)
}

/// 签名并返回十六进制交易
pub fn sign(tx: &UtxoUnsignedTx, secret: &[u8; 32]) -> Result<String, SigningError> {
    let params = tx
        .chain
        .utxo_params()
        .ok_or_else(|| SigningError::Malformed(format!("{} is not a UTXO chain", tx.chain)))?;
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(SigningError::Malformed("transaction has no inputs or outputs".into()));
    }
    let total_input = tx
        .total_input()
        .ok_or_else(|| SigningError::Malformed("input values overflow".into()))?;
    let total_output = tx
        .total_output()
        .ok_or_else(|| SigningError::Malformed("output values overflow".into()))?;
    if total_input < total_output {
        return Err(SigningError::Malformed("outputs exceed inputs".into()));
    }

    let signing_key =
        SigningKey::from_bytes(secret.into()).map_err(|_| SigningError::InvalidPrivateKey)?;
    let public_key =
        PublicKey::from_slice(signing_key.verifying_key().to_encoded_point(true).as_bytes())
            .map_err(|_| SigningError::InvalidPrivateKey)?;
    let own_script = ScriptBuf::new_p2pkh(&public_key.pubkey_hash());

    let mut spend = build_unsigned(params, tx, &own_script)?;

    let mut script_sigs = Vec::with_capacity(spend.tx.input.len());
    for index in 0..spend.tx.input.len() {
        let digest = match params.sighash {
            SighashAlgorithm::Legacy => legacy_sighash(params, &spend, &own_script, index)?,
            SighashAlgorithm::ForkId => forkid_sighash(params, &spend, &own_script, index),
        };

        let signature: Signature = signing_key
            .sign_prehash(&digest)
            .map_err(|e| SigningError::Signature(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);

        let mut sig_with_type = signature.to_der().as_bytes().to_vec();
        sig_with_type.push(params.sighash_type as u8);
        let sig_push = PushBytesBuf::try_from(sig_with_type)
            .map_err(|e| SigningError::Signature(e.to_string()))?;

        script_sigs.push(
            Builder::new()
                .push_slice(sig_push)
                .push_key(&public_key)
                .into_script(),
        );
    }

    for (input, script_sig) in spend.tx.input.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }
    Ok(consensus::encode::serialize_hex(&spend.tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec,
        domain::{
            chain_config::Chain,
            transaction::{UtxoInput, UtxoOutput},
        },
    };

    const SECRET: [u8; 32] = [0x11; 32];

    fn own_address(chain: Chain) -> String {
        let key = SigningKey::from_bytes((&SECRET).into()).unwrap();
        codec::p2pkh_address(chain, key.verifying_key().to_encoded_point(true).as_bytes()).unwrap()
    }

    fn sample_tx(chain: Chain) -> UtxoUnsignedTx {
        UtxoUnsignedTx {
            chain,
            inputs: vec![
                UtxoInput {
                    txid: "aa".repeat(32),
                    vout: 0,
                    value: 60_000,
                    script_pubkey: String::new(),
                },
                UtxoInput {
                    txid: "bb".repeat(32),
                    vout: 1,
                    value: 50_000,
                    script_pubkey: String::new(),
                },
            ],
            outputs: vec![
                UtxoOutput {
                    address: codec::base58check::encode(
                        chain.utxo_params().unwrap().p2pkh_version,
                        &[0x33; 20],
                    ),
                    value: 80_000,
                },
                UtxoOutput {
                    address: own_address(chain),
                    value: 26_000,
                },
            ],
            fee_rate: 10,
            fee: 4_000,
        }
    }

    #[test]
    fn test_btc_legacy_shape() {
        let signed = sign(&sample_tx(Chain::Btc), &SECRET).unwrap();
        assert!(signed.starts_with("01000000"));
        assert!(signed.ends_with("00000000"));
        let raw = hex::decode(&signed).unwrap();
        // 版本之后是输入个数
        assert_eq!(raw[4], 2);
    }

    #[test]
    fn test_bch_forkid_shape() {
        let signed = sign(&sample_tx(Chain::Bch), &SECRET).unwrap();
        assert!(signed.starts_with("02000000"));
        // 签名末尾的 sighash 类型 0x41
        let raw = hex::decode(&signed).unwrap();
        let script_len = raw[4 + 1 + 36] as usize;
        let sig_len = raw[4 + 1 + 36 + 1] as usize;
        let sig_end = 4 + 1 + 36 + 1 + 1 + sig_len;
        assert!(script_len > sig_len);
        assert_eq!(raw[sig_end - 1], 0x41);
    }

    #[test]
    fn test_legacy_signature_verifies() {
        use k256::ecdsa::{signature::hazmat::PrehashVerifier, VerifyingKey};

        let signed = sign(&sample_tx(Chain::Doge), &SECRET).unwrap();
        let decoded: Transaction =
            consensus::deserialize(&hex::decode(&signed).unwrap()).unwrap();
        assert_eq!(decoded.input.len(), 2);
        assert_eq!(decoded.output[0].value, Amount::from_sat(80_000));

        let signing_key = SigningKey::from_bytes((&SECRET).into()).unwrap();
        let verifying_key = VerifyingKey::from(&signing_key);
        let public_key =
            PublicKey::from_slice(verifying_key.to_encoded_point(true).as_bytes()).unwrap();
        let own_script = ScriptBuf::new_p2pkh(&public_key.pubkey_hash());
        let cache = SighashCache::new(&decoded);

        for (index, input) in decoded.input.iter().enumerate() {
            let script_sig = input.script_sig.as_bytes();
            let sig_len = script_sig[0] as usize;
            let der = &script_sig[1..sig_len];
            assert_eq!(script_sig[sig_len], 0x01);
            let signature = Signature::from_der(der).unwrap();
            assert!(signature.normalize_s().is_none());

            let digest = cache
                .legacy_signature_hash(index, &own_script, 0x01)
                .unwrap()
                .to_byte_array();
            assert!(verifying_key.verify_prehash(&digest, &signature).is_ok());
        }
    }

    #[test]
    fn test_rejects_overflowing_input_values() {
        let mut tx = sample_tx(Chain::Btc);
        tx.inputs[0].value = u64::MAX;
        tx.inputs[1].value = 2;
        assert!(matches!(sign(&tx, &SECRET), Err(SigningError::Malformed(_))));
    }

    #[test]
    fn test_rejects_foreign_input_and_bad_output() {
        let mut tx = sample_tx(Chain::Btc);
        let foreign = ScriptBuf::new_p2pkh(&bitcoin::PubkeyHash::from_byte_array([0u8; 20]));
        tx.inputs[0].script_pubkey = hex::encode(foreign.as_bytes());
        assert!(matches!(sign(&tx, &SECRET), Err(SigningError::KeyMismatch(_))));

        let mut tx = sample_tx(Chain::Btc);
        tx.outputs[0].address = "not-an-address".into();
        assert!(matches!(sign(&tx, &SECRET), Err(SigningError::InvalidAddress(_))));

        let mut tx = sample_tx(Chain::Btc);
        tx.outputs[0].value = 1_000_000;
        assert!(matches!(sign(&tx, &SECRET), Err(SigningError::Malformed(_))));
    }
}
