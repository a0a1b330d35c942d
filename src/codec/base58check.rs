//! Base58Check：版本字节 ‖ payload ‖ SHA256d 前 4 字节

/// 编码 `version ‖ payload`
pub fn encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(version);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

/// 解码并校验，返回 `(version, payload)`
pub fn decode(address: &str) -> Option<(u8, Vec<u8>)> {
    let data = bs58::decode(address).with_check(None).into_vec().ok()?;
    let (version, payload) = data.split_first()?;
    Some((*version, payload.to_vec()))
}

/// 解码 HASH160 类地址（21 字节：版本 + 20 字节哈希）
pub fn decode_hash160(address: &str) -> Option<(u8, [u8; 20])> {
    let (version, payload) = decode(address)?;
    let hash: [u8; 20] = payload.try_into().ok()?;
    Some((version, hash))
}
