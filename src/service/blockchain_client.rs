// 区块链客户端
// EVM / Solana 走 JSON-RPC，UTXO 链走 Esplora 风格 REST

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    codec::eip55,
    config::BlockchainConfig,
    domain::{
        chain_config::{Chain, ChainFamily},
        transaction::Priority,
    },
    signing::evm::balance_of_call_data,
};

/// 未花费输出（Esplora `/address/{a}/utxo`）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
}

/// 链访问抽象，准备、广播与余额刷新共用
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// EVM: `eth_getTransactionCount(address, "pending")`
    async fn get_nonce(&self, chain: Chain, address: &str) -> Result<u64>;

    /// EVM: `eth_gasPrice`（wei）
    async fn get_gas_price(&self, chain: Chain) -> Result<u128>;

    async fn get_utxos(&self, chain: Chain, address: &str) -> Result<Vec<Utxo>>;

    /// UTXO: 最小单位/字节
    async fn get_fee_rate(&self, chain: Chain, priority: Priority) -> Result<u64>;

    async fn get_recent_blockhash(&self, chain: Chain) -> Result<String>;

    /// 最小单位余额；代币链查询合约 / mint 余额
    async fn get_balance(&self, chain: Chain, address: &str) -> Result<u128>;

    /// 提交签名交易，返回交易哈希
    async fn send_raw_transaction(&self, chain: Chain, signed_tx: &str) -> Result<String>;
}

/// Esplora `/fee-estimates` 的确认目标（区块数）
pub fn fee_target_blocks(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "1",
        Priority::Medium => "3",
        Priority::Low => "6",
    }
}

/// 解析 `0x` 十六进制数量（允许 32 字节 ABI 返回值，高位必须为 0）
pub fn parse_quantity(value: &str) -> Result<u128> {
    let digits = value.trim_start_matches("0x").trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        anyhow::bail!("quantity exceeds 128 bits: {}", value);
    }
    u128::from_str_radix(digits, 16).with_context(|| format!("invalid hex quantity: {value}"))
}

pub struct HttpChainClient {
    http_client: reqwest::Client,
    endpoints: BlockchainConfig,
}

impl HttpChainClient {
    pub fn new(endpoints: BlockchainConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client: client,
            endpoints,
        }
    }

    fn endpoint(&self, chain: Chain) -> Result<&str> {
        self.endpoints
            .endpoint_for(chain)
            .with_context(|| format!("No endpoint configured for chain: {}", chain))
    }

    fn expect_family(chain: Chain, family: ChainFamily) -> Result<()> {
        if chain.family() != family {
            anyhow::bail!("{} is not a {:?} chain", chain, family);
        }
        Ok(())
    }

    /// JSON-RPC 调用，返回 `result` 字段
    async fn rpc_call(
        &self,
        chain: Chain,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self.endpoint(chain)?;
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        tracing::debug!(chain = %chain, method = method, "JSON-RPC request");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        let json: serde_json::Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(_) if !status.is_success() => {
                anyhow::bail!("RPC request failed with status {}: {}", status, body)
            }
            Err(e) => return Err(e).context("Failed to parse JSON response"),
        };

        // 检查 JSON-RPC 错误
        if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
            let error_msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown RPC error");
            let error_code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);

            anyhow::bail!("RPC error {}: {}", error_code, error_msg);
        }

        if !status.is_success() {
            anyhow::bail!("RPC request failed with status {}: {}", status, body);
        }

        json.get("result")
            .cloned()
            .with_context(|| format!("Missing result field in {} response", method))
    }

    /// Esplora GET，返回 JSON
    async fn esplora_get(&self, chain: Chain, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.endpoint(chain)?, path);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to query {}", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Esplora request failed with status {}: {}", status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))
    }

    async fn get_evm_balance(&self, chain: Chain, address: &str) -> Result<u128> {
        match chain.config().token_contract {
            Some(contract) => {
                let owner = eip55::parse(address)
                    .with_context(|| format!("invalid EVM address: {address}"))?;
                let data = format!("0x{}", hex::encode(balance_of_call_data(&owner)));
                let result = self
                    .rpc_call(
                        chain,
                        "eth_call",
                        serde_json::json!([{ "to": contract, "data": data }, "latest"]),
                    )
                    .await?;
                parse_quantity(result.as_str().context("eth_call result is not a string")?)
            }
            None => {
                let result = self
                    .rpc_call(chain, "eth_getBalance", serde_json::json!([address, "latest"]))
                    .await?;
                parse_quantity(result.as_str().context("eth_getBalance result is not a string")?)
            }
        }
    }

    async fn get_solana_balance(&self, chain: Chain, address: &str) -> Result<u128> {
        match chain.config().token_contract {
            Some(mint) => {
                let result = self
                    .rpc_call(
                        chain,
                        "getTokenAccountsByOwner",
                        serde_json::json!([
                            address,
                            { "mint": mint },
                            { "encoding": "jsonParsed" }
                        ]),
                    )
                    .await?;

                let accounts = result
                    .get("value")
                    .and_then(|v| v.as_array())
                    .context("Missing value in getTokenAccountsByOwner response")?;

                // 同一 mint 可能有多个代币账户，按 mint 汇总
                let mut total: u128 = 0;
                for account in accounts {
                    let amount = account
                        .pointer("/account/data/parsed/info/tokenAmount/amount")
                        .and_then(|a| a.as_str())
                        .context("Missing tokenAmount in token account")?;
                    let amount: u128 = amount
                        .parse()
                        .with_context(|| format!("invalid token amount: {amount}"))?;
                    total = total
                        .checked_add(amount)
                        .context("token balance overflow")?;
                }
                Ok(total)
            }
            None => {
                let result = self
                    .rpc_call(chain, "getBalance", serde_json::json!([address]))
                    .await?;
                let lamports = result
                    .get("value")
                    .and_then(|v| v.as_u64())
                    .context("Missing value in getBalance response")?;
                Ok(u128::from(lamports))
            }
        }
    }

    async fn get_utxo_balance(&self, chain: Chain, address: &str) -> Result<u128> {
        let json = self.esplora_get(chain, &format!("/address/{}", address)).await?;
        let stats = json
            .get("chain_stats")
            .context("Missing chain_stats in address response")?;
        let funded = stats
            .get("funded_txo_sum")
            .and_then(|v| v.as_u64())
            .context("Missing funded_txo_sum")?;
        let spent = stats
            .get("spent_txo_sum")
            .and_then(|v| v.as_u64())
            .context("Missing spent_txo_sum")?;
        Ok(u128::from(funded.saturating_sub(spent)))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_nonce(&self, chain: Chain, address: &str) -> Result<u64> {
        Self::expect_family(chain, ChainFamily::Evm)?;
        let result = self
            .rpc_call(
                chain,
                "eth_getTransactionCount",
                serde_json::json!([address, "pending"]),
            )
            .await?;
        let nonce = parse_quantity(result.as_str().context("nonce is not a string")?)?;
        u64::try_from(nonce).context("nonce exceeds u64")
    }

    async fn get_gas_price(&self, chain: Chain) -> Result<u128> {
        Self::expect_family(chain, ChainFamily::Evm)?;
        let result = self
            .rpc_call(chain, "eth_gasPrice", serde_json::json!([]))
            .await?;
        parse_quantity(result.as_str().context("gas price is not a string")?)
    }

    async fn get_utxos(&self, chain: Chain, address: &str) -> Result<Vec<Utxo>> {
        Self::expect_family(chain, ChainFamily::Utxo)?;
        let json = self
            .esplora_get(chain, &format!("/address/{}/utxo", address))
            .await?;
        serde_json::from_value(json).context("Failed to decode UTXO list")
    }

    async fn get_fee_rate(&self, chain: Chain, priority: Priority) -> Result<u64> {
        Self::expect_family(chain, ChainFamily::Utxo)?;
        let json = self.esplora_get(chain, "/fee-estimates").await?;
        let target = fee_target_blocks(priority);
        let rate = json
            .get(target)
            .and_then(|v| v.as_f64())
            .with_context(|| format!("Missing fee estimate for {} blocks", target))?;
        if !rate.is_finite() || rate <= 0.0 {
            anyhow::bail!("invalid fee estimate: {}", rate);
        }
        Ok(rate.ceil() as u64)
    }

    async fn get_recent_blockhash(&self, chain: Chain) -> Result<String> {
        Self::expect_family(chain, ChainFamily::Solana)?;
        let result = self
            .rpc_call(
                chain,
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": "finalized" }]),
            )
            .await?;
        result
            .pointer("/value/blockhash")
            .and_then(|b| b.as_str())
            .map(str::to_string)
            .context("Missing blockhash in getLatestBlockhash response")
    }

    async fn get_balance(&self, chain: Chain, address: &str) -> Result<u128> {
        match chain.family() {
            ChainFamily::Evm => self.get_evm_balance(chain, address).await,
            ChainFamily::Solana => self.get_solana_balance(chain, address).await,
            ChainFamily::Utxo => self.get_utxo_balance(chain, address).await,
            ChainFamily::Cardano => anyhow::bail!("No balance source for chain: {}", chain),
        }
    }

    async fn send_raw_transaction(&self, chain: Chain, signed_tx: &str) -> Result<String> {
        match chain.family() {
            ChainFamily::Evm => {
                let result = self
                    .rpc_call(
                        chain,
                        "eth_sendRawTransaction",
                        serde_json::json!([signed_tx]),
                    )
                    .await?;
                result
                    .as_str()
                    .map(str::to_string)
                    .context("Missing tx hash in eth_sendRawTransaction response")
            }
            ChainFamily::Solana => {
                let result = self
                    .rpc_call(
                        chain,
                        "sendTransaction",
                        serde_json::json!([
                            signed_tx,
                            { "encoding": "base64", "skipPreflight": false }
                        ]),
                    )
                    .await?;
                result
                    .as_str()
                    .map(str::to_string)
                    .context("Missing signature in sendTransaction response")
            }
            ChainFamily::Utxo => {
                let url = format!("{}/tx", self.endpoint(chain)?);
                let response = self
                    .http_client
                    .post(&url)
                    .header("Content-Type", "text/plain")
                    .body(signed_tx.trim_start_matches("0x").to_string())
                    .send()
                    .await
                    .context("Failed to submit transaction")?;

                let status = response.status();
                let body = response
                    .text()
                    .await
                    .context("Failed to read response body")?;
                if !status.is_success() {
                    anyhow::bail!("broadcast rejected with status {}: {}", status, body);
                }
                Ok(body.trim().to_string())
            }
            ChainFamily::Cardano => anyhow::bail!("Unsupported chain for broadcast: {}", chain),
        }
    }
}
