//! Solana legacy 消息编译与签名
//!
//! 账户表顺序：手续费支付者、可写签名者、只读签名者、可写非签名者、只读非签名者。
//! SPL 代币转账在签名端补全指令（接收方 ATA 幂等创建 + TransferChecked）。

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use super::{decode_hex, SigningError};
use crate::{
    codec::wire,
    domain::transaction::{SolanaAccountMeta, SolanaInstruction, SolanaUnsignedTx},
    utils::address_validator::AddressValidator,
};

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

const SYSTEM_TRANSFER_INDEX: u32 = 2;
const TOKEN_TRANSFER_CHECKED: u8 = 12;
const ATA_CREATE_IDEMPOTENT: u8 = 1;
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

type Pubkey = [u8; 32];

fn decode_pubkey(value: &str) -> Result<Pubkey, SigningError> {
    AddressValidator::decode_solana(value)
        .ok_or_else(|| SigningError::InvalidAddress(value.to_string()))
}

fn meta(pubkey: &Pubkey, is_signer: bool, is_writable: bool) -> SolanaAccountMeta {
    SolanaAccountMeta {
        pubkey: bs58::encode(pubkey).into_string(),
        is_signer,
        is_writable,
    }
}

/// System Program 转账：`u32le 2 ‖ u64le lamports`
pub fn system_transfer(from: &str, to: &str, lamports: u64) -> SolanaInstruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    SolanaInstruction {
        program_id: SYSTEM_PROGRAM_ID.to_string(),
        accounts: vec![
            SolanaAccountMeta {
                pubkey: from.to_string(),
                is_signer: true,
                is_writable: true,
            },
            SolanaAccountMeta {
                pubkey: to.to_string(),
                is_signer: false,
                is_writable: true,
            },
        ],
        data: hex::encode(data),
    }
}

/// 程序派生地址：从 bump 255 向下找第一个不在曲线上的哈希
fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<Pubkey> {
    (0u8..=255).rev().find_map(|bump| {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id);
        hasher.update(PDA_MARKER);
        let candidate: Pubkey = hasher.finalize().into();
        match VerifyingKey::from_bytes(&candidate) {
            Ok(_) => None,
            Err(_) => Some(candidate),
        }
    })
}

/// 关联代币账户地址
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Option<Pubkey> {
    let token_program = decode_pubkey(TOKEN_PROGRAM_ID).ok()?;
    let ata_program = decode_pubkey(ASSOCIATED_TOKEN_PROGRAM_ID).ok()?;
    find_program_address(
        &[owner.as_slice(), token_program.as_slice(), mint.as_slice()],
        &ata_program,
    )
}

/// SPL 代币转账指令：接收方 ATA 幂等创建 + TransferChecked
fn token_transfer_instructions(
    tx: &SolanaUnsignedTx,
    owner: &Pubkey,
) -> Result<Vec<SolanaInstruction>, SigningError> {
    let (Some(mint), Some(recipient), Some(amount)) = (&tx.mint, &tx.recipient, tx.amount) else {
        return Err(SigningError::Malformed(
            "token transfer requires mint, recipient and amount".into(),
        ));
    };
    let mint = decode_pubkey(mint)?;
    let recipient = decode_pubkey(recipient)?;
    let system_program = decode_pubkey(SYSTEM_PROGRAM_ID)?;
    let token_program = decode_pubkey(TOKEN_PROGRAM_ID)?;

    let derive = |wallet: &Pubkey| {
        associated_token_address(wallet, &mint)
            .ok_or_else(|| SigningError::Malformed("no associated token address".into()))
    };
    let source = derive(owner)?;
    let destination = derive(&recipient)?;

    let create_destination = SolanaInstruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID.to_string(),
        accounts: vec![
            meta(owner, true, true),
            meta(&destination, false, true),
            meta(&recipient, false, false),
            meta(&mint, false, false),
            meta(&system_program, false, false),
            meta(&token_program, false, false),
        ],
        data: hex::encode([ATA_CREATE_IDEMPOTENT]),
    };

    let decimals = tx.chain.decimals() as u8;
    let mut data = Vec::with_capacity(10);
    data.push(TOKEN_TRANSFER_CHECKED);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    let transfer = SolanaInstruction {
        program_id: TOKEN_PROGRAM_ID.to_string(),
        accounts: vec![
            meta(&source, false, true),
            meta(&mint, false, false),
            meta(&destination, false, true),
            meta(owner, true, false),
        ],
        data: hex::encode(data),
    };

    Ok(vec![create_destination, transfer])
}

struct AccountEntry {
    pubkey: Pubkey,
    is_signer: bool,
    is_writable: bool,
}

/// 编译 legacy 消息，返回 (消息字节, 所需签名数)
pub fn compile_message(
    fee_payer: &Pubkey,
    recent_blockhash: &str,
    instructions: &[SolanaInstruction],
) -> Result<(Vec<u8>, u8), SigningError> {
    let blockhash: [u8; 32] = bs58::decode(recent_blockhash)
        .into_vec()
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| SigningError::Malformed("recent_blockhash must be 32 bytes".into()))?;

    let mut entries = vec![AccountEntry {
        pubkey: *fee_payer,
        is_signer: true,
        is_writable: true,
    }];
    let mut upsert = |pubkey: Pubkey, is_signer: bool, is_writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= is_signer;
            entry.is_writable |= is_writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer,
                is_writable,
            });
        }
    };

    let mut decoded = Vec::with_capacity(instructions.len());
    for instruction in instructions {
        let program_id = decode_pubkey(&instruction.program_id)?;
        let mut accounts = Vec::with_capacity(instruction.accounts.len());
        for account in &instruction.accounts {
            let pubkey = decode_pubkey(&account.pubkey)?;
            upsert(pubkey, account.is_signer, account.is_writable);
            accounts.push(pubkey);
        }
        upsert(program_id, false, false);
        decoded.push((program_id, accounts, decode_hex("data", &instruction.data)?));
    }

    // 手续费支付者固定在首位，其余按 (签名, 可写) 分组且组内保持出现顺序
    let (payer, rest) = entries.split_at(1);
    let group = |signer: bool, writable: bool| {
        rest.iter()
            .filter(move |e| e.is_signer == signer && e.is_writable == writable)
    };
    let ordered: Vec<&AccountEntry> = payer
        .iter()
        .chain(group(true, true))
        .chain(group(true, false))
        .chain(group(false, true))
        .chain(group(false, false))
        .collect();

    if ordered.len() > u8::MAX as usize {
        return Err(SigningError::Malformed("too many accounts".into()));
    }
    let num_signers = ordered.iter().filter(|e| e.is_signer).count() as u8;
    let num_readonly_signed = ordered
        .iter()
        .filter(|e| e.is_signer && !e.is_writable)
        .count() as u8;
    let num_readonly_unsigned = ordered
        .iter()
        .filter(|e| !e.is_signer && !e.is_writable)
        .count() as u8;

    let index_of = |pubkey: &Pubkey| -> Result<u8, SigningError> {
        ordered
            .iter()
            .position(|e| &e.pubkey == pubkey)
            .map(|i| i as u8)
            .ok_or_else(|| SigningError::Malformed("account missing from key table".into()))
    };

    let mut message = vec![num_signers, num_readonly_signed, num_readonly_unsigned];
    wire::write_compact_u16(&mut message, ordered.len() as u16);
    for entry in &ordered {
        message.extend_from_slice(&entry.pubkey);
    }
    message.extend_from_slice(&blockhash);

    wire::write_compact_u16(&mut message, decoded.len() as u16);
    for (program_id, accounts, data) in &decoded {
        message.push(index_of(program_id)?);
        wire::write_compact_u16(&mut message, accounts.len() as u16);
        for account in accounts {
            message.push(index_of(account)?);
        }
        wire::write_compact_u16(&mut message, data.len() as u16);
        message.extend_from_slice(data);
    }

    Ok((message, num_signers))
}

/// 签名并返回 base64 交易（首字节为签名个数）
pub fn sign(tx: &SolanaUnsignedTx, secret: &[u8; 32]) -> Result<String, SigningError> {
    let signing_key = SigningKey::from_bytes(secret);
    let owner = signing_key.verifying_key().to_bytes();

    let fee_payer = decode_pubkey(&tx.fee_payer)?;
    if fee_payer != owner {
        return Err(SigningError::KeyMismatch(format!("fee payer {}", tx.fee_payer)));
    }

    let instructions = if tx.instructions.is_empty() {
        token_transfer_instructions(tx, &owner)?
    } else {
        tx.instructions.clone()
    };

    let (message, num_signers) = compile_message(&fee_payer, &tx.recent_blockhash, &instructions)?;
    if num_signers != 1 {
        return Err(SigningError::Malformed(format!(
            "message requires {num_signers} signatures, only the fee payer can sign"
        )));
    }

    let signature = signing_key.sign(&message);
    let mut wire_tx = Vec::with_capacity(1 + 64 + message.len());
    wire::write_compact_u16(&mut wire_tx, 1);
    wire_tx.extend_from_slice(&signature.to_bytes());
    wire_tx.extend_from_slice(&message);

    Ok(base64::engine::general_purpose::STANDARD.encode(wire_tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain_config::Chain;
    use ed25519_dalek::Verifier;

    const SECRET: [u8; 32] = [0x07; 32];
    const BLOCKHASH: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn owner() -> String {
        let key = SigningKey::from_bytes(&SECRET);
        bs58::encode(key.verifying_key().to_bytes()).into_string()
    }

    fn recipient() -> String {
        bs58::encode([0x09u8; 32]).into_string()
    }

    fn native_tx() -> SolanaUnsignedTx {
        SolanaUnsignedTx {
            chain: Chain::Sol,
            fee_payer: owner(),
            recent_blockhash: BLOCKHASH.into(),
            instructions: vec![system_transfer(&owner(), &recipient(), 1_000_000)],
            fee: 5_000,
            mint: None,
            recipient: None,
            amount: None,
        }
    }

    #[test]
    fn test_native_transfer_layout() {
        let encoded = sign(&native_tx(), &SECRET).unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(raw[0], 1);

        let message = &raw[65..];
        // header: 1 签名者, 0 只读签名者, 1 只读非签名者 (system program)
        assert_eq!(&message[..3], &[1, 0, 1]);
        assert_eq!(message[3], 3);
        assert_eq!(&message[4..36], &bs58::decode(owner()).into_vec().unwrap()[..]);
        assert_eq!(&message[36..68], &[0x09u8; 32]);
        assert_eq!(&message[68..100], &[0u8; 32]);

        let signature = ed25519_dalek::Signature::from_slice(&raw[1..65]).unwrap();
        let key = SigningKey::from_bytes(&SECRET);
        assert!(key.verifying_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_system_transfer_data() {
        let ix = system_transfer("a", "b", 5);
        assert_eq!(ix.data, "020000000500000000000000");
    }

    #[test]
    fn test_rejects_foreign_fee_payer() {
        let mut tx = native_tx();
        tx.fee_payer = recipient();
        assert!(matches!(sign(&tx, &SECRET), Err(SigningError::KeyMismatch(_))));
    }

    #[test]
    fn test_rejects_extra_signer() {
        let mut tx = native_tx();
        tx.instructions[0].accounts[1].is_signer = true;
        assert!(matches!(sign(&tx, &SECRET), Err(SigningError::Malformed(_))));
    }

    #[test]
    fn test_token_transfer_built_by_signer() {
        let tx = SolanaUnsignedTx {
            chain: Chain::UsdcSol,
            fee_payer: owner(),
            recent_blockhash: BLOCKHASH.into(),
            instructions: vec![],
            fee: 5_000,
            mint: Some("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into()),
            recipient: Some(recipient()),
            amount: Some(2_500_000),
        };
        let raw = base64::engine::general_purpose::STANDARD
            .decode(sign(&tx, &SECRET).unwrap())
            .unwrap();
        assert_eq!(raw[0], 1);
        // 只有 owner 签名
        assert_eq!(raw[65], 1);

        let missing = SolanaUnsignedTx {
            amount: None,
            ..tx
        };
        assert!(matches!(sign(&missing, &SECRET), Err(SigningError::Malformed(_))));
    }

    #[test]
    fn test_known_associated_token_address() {
        // ATA 是确定性的 PDA，且不在曲线上
        let owner = [0x05u8; 32];
        let mint = decode_pubkey("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap();
        let ata = associated_token_address(&owner, &mint).unwrap();
        assert!(VerifyingKey::from_bytes(&ata).is_err());
        assert_eq!(associated_token_address(&owner, &mint), Some(ata));
    }
}
