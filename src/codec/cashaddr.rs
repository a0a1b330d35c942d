//! Bitcoin Cash CashAddr 编解码
//!
//! 格式：`prefix:payload`，payload 为 5-bit 分组的 `版本字节 ‖ hash ‖ 40-bit 校验和`。
//! 版本字节 = 地址类型 << 3 | 长度码（160 位哈希为 0）。

pub const MAINNET_PREFIX: &str = "bitcoincash";

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    P2pkh,
    P2sh,
}

impl AddressType {
    fn type_bits(self) -> u8 {
        match self {
            AddressType::P2pkh => 0,
            AddressType::P2sh => 1,
        }
    }
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for value in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(*value);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

/// 前缀每个字符取低 5 位，后接一个 0 分隔
fn expand_prefix(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

/// 位宽转换；`pad = false` 时多余的填充位必须为 0
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for value in data {
        let v = u32::from(*value);
        if v >> from != 0 {
            return None;
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return None;
    }
    Some(out)
}

/// 编码 20 字节哈希为带前缀的 CashAddr
pub fn encode(prefix: &str, address_type: AddressType, hash: &[u8; 20]) -> String {
    let mut raw = Vec::with_capacity(21);
    raw.push(address_type.type_bits() << 3);
    raw.extend_from_slice(hash);
    // 8 -> 5 带填充总是成功
    let payload = convert_bits(&raw, 8, 5, true).unwrap_or_default();

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend_from_slice(&payload);
    checksum_input.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let checksum = polymod(&checksum_input);

    let mut address = String::with_capacity(prefix.len() + 1 + payload.len() + CHECKSUM_LEN);
    address.push_str(prefix);
    address.push(':');
    for group in &payload {
        address.push(CHARSET[*group as usize] as char);
    }
    for i in 0..CHECKSUM_LEN {
        let group = (checksum >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f;
        address.push(CHARSET[group as usize] as char);
    }
    address
}

/// 解码 CashAddr；缺少前缀时按 `default_prefix` 校验
pub fn decode(address: &str, default_prefix: &str) -> Option<(AddressType, [u8; 20])> {
    // 不允许大小写混用
    let has_lower = address.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = address.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return None;
    }
    let address = address.to_ascii_lowercase();

    let (prefix, payload) = match address.split_once(':') {
        Some((prefix, payload)) => (prefix.to_string(), payload),
        None => (default_prefix.to_string(), address.as_str()),
    };
    if prefix != default_prefix || payload.len() <= CHECKSUM_LEN {
        return None;
    }

    let mut values = Vec::with_capacity(payload.len());
    for ch in payload.bytes() {
        let position = CHARSET.iter().position(|c| *c == ch)?;
        values.push(position as u8);
    }

    let mut checksum_input = expand_prefix(&prefix);
    checksum_input.extend_from_slice(&values);
    if polymod(&checksum_input) != 0 {
        return None;
    }

    let data = &values[..values.len() - CHECKSUM_LEN];
    let raw = convert_bits(data, 5, 8, false)?;
    let (version, hash) = raw.split_first()?;

    // 仅支持 160 位哈希（长度码 0）
    if version & 0x07 != 0 || version & 0x80 != 0 {
        return None;
    }
    let address_type = match version >> 3 {
        0 => AddressType::P2pkh,
        1 => AddressType::P2sh,
        _ => return None,
    };
    let hash: [u8; 20] = hash.try_into().ok()?;
    Some((address_type, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::base58check;

    #[test]
    fn test_reference_vector() {
        let hash: [u8; 20] = hex::decode("F5BF48B397DAE70BE82B3CCA4793F8EB2B6CDAC9")
            .unwrap()
            .try_into()
            .unwrap();
        let address = encode(MAINNET_PREFIX, AddressType::P2pkh, &hash);
        assert_eq!(
            address,
            "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2"
        );
        assert_eq!(
            decode(&address, MAINNET_PREFIX),
            Some((AddressType::P2pkh, hash))
        );
    }

    #[test]
    fn test_matches_legacy_hash() {
        let (_, legacy_hash) =
            base58check::decode_hash160("1BpEi6DfDAUFd7GtittLSdBeYJvcoaVggu").unwrap();
        let (address_type, hash) = decode(
            "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a",
            MAINNET_PREFIX,
        )
        .unwrap();
        assert_eq!(address_type, AddressType::P2pkh);
        assert_eq!(hash, legacy_hash);
    }

    #[test]
    fn test_prefix_optional_and_case() {
        let hash = [0x11u8; 20];
        let full = encode(MAINNET_PREFIX, AddressType::P2sh, &hash);
        let bare = full.trim_start_matches("bitcoincash:");
        assert_eq!(decode(bare, MAINNET_PREFIX), Some((AddressType::P2sh, hash)));
        assert_eq!(
            decode(&full.to_ascii_uppercase(), MAINNET_PREFIX),
            Some((AddressType::P2sh, hash))
        );
    }

    #[test]
    fn test_rejects_corruption() {
        let full = encode(MAINNET_PREFIX, AddressType::P2pkh, &[0x22u8; 20]);
        let mut corrupted = full.clone().into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'q' { b'p' } else { b'q' };
        let corrupted = String::from_utf8(corrupted).unwrap();

        assert!(decode(&corrupted, MAINNET_PREFIX).is_none());
        assert!(decode("bchtest:qqqq", MAINNET_PREFIX).is_none());
        assert!(decode("bitcoincash:Qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a", MAINNET_PREFIX).is_none());
        assert!(decode("", MAINNET_PREFIX).is_none());
    }
}
