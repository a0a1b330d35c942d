//! Solana / RLP 线格式使用的整数编码

/// Solana compact-u16（每字节 7 位，低位在前）
pub fn write_compact_u16(out: &mut Vec<u8>, value: u16) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem != 0 {
            byte |= 0x80;
            out.push(byte);
        } else {
            out.push(byte);
            break;
        }
    }
}

/// 大端整数去掉前导零（RLP 整数编码）
pub fn trim_be(value: u128) -> Vec<u8> {
    value
        .to_be_bytes()
        .iter()
        .skip_while(|b| **b == 0)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_u16() {
        let cases: [(u16, &[u8]); 4] = [
            (0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0x3fff, &[0xff, 0x7f]),
        ];
        for (value, expected) in cases {
            let mut out = Vec::new();
            write_compact_u16(&mut out, value);
            assert_eq!(out, expected, "value {value}");
        }
    }

    #[test]
    fn test_trim_be() {
        assert!(trim_be(0).is_empty());
        assert_eq!(trim_be(0x0400), vec![0x04, 0x00]);
    }
}
