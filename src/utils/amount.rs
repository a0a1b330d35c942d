//! 金额换算
//!
//! 显示单位与最小单位之间的定点换算，全程不经过浮点数。

use std::str::FromStr;

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is not a decimal number: {0}")]
    Malformed(String),
    #[error("amount must be positive")]
    NonPositive,
    #[error("amount has more than {max} fractional digits")]
    TooManyDecimals { max: u32 },
    #[error("amount is too large")]
    Overflow,
}

/// 显示单位字符串 -> 最小单位整数
///
/// 末尾多余的 0 不计入小数位数（"1.50" 对 1 位精度合法）。
pub fn parse_amount(amount: &str, decimals: u32) -> Result<u128, AmountError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || trimmed.contains(|c: char| c == 'e' || c == 'E') {
        return Err(AmountError::Malformed(amount.to_string()));
    }
    let value =
        Decimal::from_str(trimmed).map_err(|_| AmountError::Malformed(amount.to_string()))?;
    if value.is_sign_negative() || value.is_zero() {
        return Err(AmountError::NonPositive);
    }

    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return Err(AmountError::TooManyDecimals { max: decimals });
    }

    let mantissa = u128::try_from(normalized.mantissa()).map_err(|_| AmountError::NonPositive)?;
    let factor = 10u128
        .checked_pow(decimals - scale)
        .ok_or(AmountError::Overflow)?;
    mantissa.checked_mul(factor).ok_or(AmountError::Overflow)
}

/// 最小单位整数 -> 显示单位字符串（去掉末尾 0）
pub fn format_amount(minor: u128, decimals: u32) -> String {
    if decimals == 0 {
        return minor.to_string();
    }
    let digits = minor.to_string();
    let decimals = decimals as usize;

    let (integer, fraction) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer
    } else {
        format!("{integer}.{fraction}")
    }
}

/// `u128` 以十进制字符串序列化（JSON 数字无法无损承载）
pub mod u128_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map_err(D::Error::custom)
    }
}
