// 交易广播重试
//
// - 永久性错误（节点明确拒绝）只尝试一次
// - 其他错误指数退避重试，总尝试次数受 max_attempts 限制
// - 每次尝试都有硬超时

use std::{future::Future, time::Duration};

use tokio::time::{sleep, timeout};
use uuid::Uuid;

use crate::{config::EngineConfig, domain::chain_config::Chain};

/// 节点返回这些片段时重试无意义
pub const PERMANENT_ERROR_PATTERNS: &[&str] = &[
    "nonce too low",
    "insufficient funds",
    "already known",
    "replacement transaction underpriced",
    "invalid signature",
    "bad-txns",
    "blockhash not found",
];

/// 交易重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    /// 首次重试前的等待
    pub initial_backoff: Duration,
    /// 退避倍数
    pub backoff_multiplier: u32,
    /// 单次尝试超时
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&EngineConfig> for RetryConfig {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            max_attempts: engine.broadcast_max_attempts.max(1),
            initial_backoff: Duration::from_millis(engine.broadcast_initial_backoff_ms),
            backoff_multiplier: engine.broadcast_backoff_multiplier.max(1),
            attempt_timeout: engine.broadcast_attempt_timeout(),
        }
    }
}

/// 广播最终失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    /// 节点拒绝，记录应标记为 failed
    #[error("permanent broadcast error: {0}")]
    Permanent(String),
    /// 重试耗尽，记录可退回 pending
    #[error("broadcast failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// 判断错误是否为永久性
pub fn is_permanent_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    PERMANENT_ERROR_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// 带退避的重试执行器
///
/// `op` 接收从 1 开始的尝试序号。
pub async fn retry_with_backoff<F, Fut>(
    config: &RetryConfig,
    tx_id: Uuid,
    chain: Chain,
    mut op: F,
) -> Result<String, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut backoff = config.initial_backoff;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        tracing::info!(
            tx_id = %tx_id,
            chain = %chain,
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting transaction broadcast"
        );

        let result = match timeout(config.attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "broadcast attempt timed out after {}s",
                config.attempt_timeout.as_secs()
            )),
        };

        match result {
            Ok(tx_hash) => {
                tracing::info!(
                    tx_id = %tx_id,
                    tx_hash = %tx_hash,
                    attempt = attempt,
                    "Transaction broadcast successful"
                );
                return Ok(tx_hash);
            }
            Err(e) => {
                last_error = format!("{:#}", e);

                if is_permanent_error(&last_error) {
                    tracing::error!(
                        tx_id = %tx_id,
                        chain = %chain,
                        error = %last_error,
                        "Transaction rejected permanently"
                    );
                    return Err(RetryError::Permanent(last_error));
                }

                if attempt < max_attempts {
                    tracing::warn!(
                        tx_id = %tx_id,
                        error = %last_error,
                        next_retry_in_ms = backoff.as_millis() as u64,
                        "Transaction broadcast failed, will retry"
                    );

                    // 指数退避
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(config.backoff_multiplier);
                }
            }
        }
    }

    tracing::error!(
        tx_id = %tx_id,
        chain = %chain,
        error = %last_error,
        "Transaction broadcast failed after all retries"
    );

    Err(RetryError::Exhausted {
        attempts: max_attempts,
        last_error,
    })
}
