//! EIP-55 混合大小写校验地址
//! https://eips.ethereum.org/EIPS/eip-55

use super::keccak256;

/// 20 字节地址 -> `0x` + EIP-55 大小写
pub fn to_checksum(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// 解析 `0x` + 40 位十六进制地址
///
/// 全小写或全大写视为未带校验；大小写混合时必须满足 EIP-55。
pub fn parse(address: &str) -> Option<[u8; 20]> {
    let body = address.strip_prefix("0x")?;
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes: [u8; 20] = hex::decode(body).ok()?.try_into().ok()?;

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&bytes) != address {
        return None;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_vectors() {
        for address in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        ] {
            let bytes = parse(address).unwrap();
            assert_eq!(to_checksum(&bytes), address);
        }
    }

    #[test]
    fn test_parse_rules() {
        assert!(parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_some());
        assert!(parse("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").is_some());
        // 大小写混合但校验错误
        assert!(parse("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_none());
        assert!(parse("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_none());
        assert!(parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1bea").is_none());
        assert!(parse("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_none());
    }
}
