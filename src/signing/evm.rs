//! EIP-1559 (type 2) 交易签名

use k256::ecdsa::SigningKey;
use rlp::RlpStream;

use super::{decode_hex, SigningError};
use crate::{
    codec::{eip55, keccak256, wire::trim_be},
    domain::transaction::EvmUnsignedTx,
};

const EIP1559_TX_TYPE: u8 = 0x02;

/// ERC-20 transfer(address,uint256)
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// ERC-20 balanceOf(address)
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

fn pad32(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend(std::iter::repeat(0u8).take(32usize.saturating_sub(bytes.len())));
    out.extend_from_slice(bytes);
}

/// `a9059cbb ‖ pad32(recipient) ‖ pad32(amount)`
pub fn transfer_call_data(recipient: &[u8; 20], amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    pad32(&mut data, recipient);
    pad32(&mut data, &amount.to_be_bytes());
    data
}

/// `70a08231 ‖ pad32(owner)`
pub fn balance_of_call_data(owner: &[u8; 20]) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    pad32(&mut data, owner);
    data
}

fn append_fields(stream: &mut RlpStream, tx: &EvmUnsignedTx, to: &[u8; 20], data: &[u8]) {
    stream.append(&tx.chain_id);
    stream.append(&tx.nonce);
    stream.append(&trim_be(tx.max_priority_fee_per_gas));
    stream.append(&trim_be(tx.max_fee_per_gas));
    stream.append(&tx.gas_limit);
    stream.append(&to.to_vec());
    stream.append(&trim_be(tx.value));
    stream.append(&data.to_vec());
    // access_list
    stream.begin_list(0);
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().skip_while(|b| **b == 0).copied().collect()
}

/// 签名并返回 `0x02…` hex
pub fn sign(tx: &EvmUnsignedTx, secret: &[u8; 32]) -> Result<String, SigningError> {
    let signing_key =
        SigningKey::from_bytes(secret.into()).map_err(|_| SigningError::InvalidPrivateKey)?;
    let to = eip55::parse(&tx.to).ok_or_else(|| SigningError::InvalidAddress(tx.to.clone()))?;
    let data = match &tx.data {
        Some(data) => decode_hex("data", data)?,
        None => Vec::new(),
    };

    let mut unsigned = RlpStream::new_list(9);
    append_fields(&mut unsigned, tx, &to, &data);
    let mut preimage = vec![EIP1559_TX_TYPE];
    preimage.extend_from_slice(&unsigned.out());
    let digest = keccak256(&preimage);

    // k256 返回的签名已是 low-S，奇偶位与之对应
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| SigningError::Signature(e.to_string()))?;

    let signature_bytes = signature.to_bytes();
    let mut signed = RlpStream::new_list(12);
    append_fields(&mut signed, tx, &to, &data);
    signed.append(&u8::from(recovery_id.is_y_odd()));
    signed.append(&strip_leading_zeros(&signature_bytes[..32]));
    signed.append(&strip_leading_zeros(&signature_bytes[32..]));

    let mut payload = vec![EIP1559_TX_TYPE];
    payload.extend_from_slice(&signed.out());
    Ok(format!("0x{}", hex::encode(payload)))
}

/// 签名交易哈希（keccak256 of payload）
pub fn transaction_hash(signed_tx: &str) -> Result<String, SigningError> {
    let payload = decode_hex("signed_tx", signed_tx)?;
    Ok(format!("0x{}", hex::encode(keccak256(&payload))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain_config::Chain;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    fn sample_tx() -> EvmUnsignedTx {
        EvmUnsignedTx {
            chain: Chain::Eth,
            chain_id: 1,
            nonce: 0,
            to: "0x742d35cc6634c0532925a3b844bc9e7595f0beb6".into(),
            value: 1_000_000_000_000_000,
            gas_limit: 21_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            data: None,
            token_contract: None,
        }
    }

    #[test]
    fn test_signed_payload_shape() {
        let secret = [0x42u8; 32];
        let signed = sign(&sample_tx(), &secret).unwrap();
        assert!(signed.starts_with("0x02"));

        let payload = hex::decode(&signed[2..]).unwrap();
        let rlp = rlp::Rlp::new(&payload[1..]);
        assert_eq!(rlp.item_count().unwrap(), 12);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 1);
        let y_parity: u8 = rlp.val_at(9).unwrap();
        assert!(y_parity <= 1);
    }

    #[test]
    fn test_signature_recovers_sender() {
        let secret = [0x42u8; 32];
        let tx = sample_tx();
        let signed = sign(&tx, &secret).unwrap();
        let payload = hex::decode(&signed[2..]).unwrap();
        let rlp = rlp::Rlp::new(&payload[1..]);

        let y_parity: u8 = rlp.val_at(9).unwrap();
        let r: Vec<u8> = rlp.val_at(10).unwrap();
        let s: Vec<u8> = rlp.val_at(11).unwrap();
        let mut sig_bytes = [0u8; 64];
        sig_bytes[32 - r.len()..32].copy_from_slice(&r);
        sig_bytes[64 - s.len()..].copy_from_slice(&s);
        let signature = Signature::from_slice(&sig_bytes).unwrap();
        assert!(signature.normalize_s().is_none(), "signature must be low-S");

        let mut unsigned = RlpStream::new_list(9);
        let to = eip55::parse(&tx.to).unwrap();
        append_fields(&mut unsigned, &tx, &to, &[]);
        let mut preimage = vec![EIP1559_TX_TYPE];
        preimage.extend_from_slice(&unsigned.out());
        let digest = keccak256(&preimage);

        let recovered = VerifyingKey::recover_from_prehash(
            &digest,
            &signature,
            RecoveryId::from_byte(y_parity).unwrap(),
        )
        .unwrap();
        let expected = SigningKey::from_bytes((&secret).into()).unwrap();
        assert_eq!(&recovered, expected.verifying_key());
    }

    #[test]
    fn test_transfer_call_data() {
        let data = transfer_call_data(&[0x11; 20], 1_000_000);
        assert_eq!(data.len(), 68);
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(hex::encode(&data[64..]), "000f4240");
        assert_eq!(hex::encode(&balance_of_call_data(&[0x22; 20])[..4]), "70a08231");
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut tx = sample_tx();
        tx.to = "0x1234".into();
        assert!(matches!(
            sign(&tx, &[0x42u8; 32]),
            Err(SigningError::InvalidAddress(_))
        ));
        assert_eq!(
            sign(&sample_tx(), &[0u8; 32]).unwrap_err(),
            SigningError::InvalidPrivateKey
        );
    }
}
