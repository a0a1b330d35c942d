//! 交易广播服务
//!
//! 前置检查全部在本地完成；通过后用条件更新 `pending -> broadcasting` 认领记录，
//! 并发提交同一笔交易时只有一个调用者能进入网络提交阶段。

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    blockchain_client::ChainClient,
    transaction_retry::{retry_with_backoff, RetryConfig, RetryError},
};
use crate::{
    domain::{
        chain_config::Chain, transaction::BroadcastResult, transaction_status::TransactionStatus,
    },
    error::AppError,
    infrastructure::log_redact::redact_hex_string,
    repository::{PreparedTransactionRepository, StatusUpdate},
};

/// 广播认领的 RAII 守卫
///
/// 调用方 future 在网络提交阶段被丢弃时，记录仍停在 `broadcasting`；
/// 守卫在 drop 时用条件更新退回 `pending`，已写入结果的记录不受影响。
struct BroadcastClaim {
    transactions: Arc<dyn PreparedTransactionRepository>,
    tx_id: Uuid,
    settled: bool,
}

impl BroadcastClaim {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for BroadcastClaim {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(tx_id = %self.tx_id, "Broadcast claim dropped outside runtime");
            return;
        };
        let transactions = self.transactions.clone();
        let tx_id = self.tx_id;
        runtime.spawn(async move {
            let update = StatusUpdate {
                tx_hash: None,
                error_message: Some("broadcast cancelled".to_string()),
            };
            match transactions
                .transition_status(
                    tx_id,
                    TransactionStatus::Broadcasting,
                    TransactionStatus::Pending,
                    update,
                )
                .await
            {
                Ok(true) => tracing::warn!(tx_id = %tx_id, "Broadcast cancelled, claim released"),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(tx_id = %tx_id, error = ?e, "Failed to release broadcast claim")
                }
            }
        });
    }
}

/// 广播请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastTransactionInput {
    pub tx_id: Uuid,
    #[serde(default)]
    pub signed_tx: String,
    pub chain: String,
}

pub struct BroadcastService {
    transactions: Arc<dyn PreparedTransactionRepository>,
    client: Arc<dyn ChainClient>,
    retry: RetryConfig,
}

impl BroadcastService {
    pub fn new(
        transactions: Arc<dyn PreparedTransactionRepository>,
        client: Arc<dyn ChainClient>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transactions,
            client,
            retry,
        }
    }

    pub async fn broadcast_transaction(
        &self,
        wallet_id: Uuid,
        input: BroadcastTransactionInput,
    ) -> Result<BroadcastResult, AppError> {
        let signed_tx = input.signed_tx.trim().to_string();
        if signed_tx.is_empty() {
            return Err(AppError::missing_signed_tx());
        }

        let chain: Chain = input.chain.parse()?;

        let record = self
            .transactions
            .find_for_wallet(wallet_id, input.tx_id)
            .await
            .map_err(|e| AppError::database_error(format!("{:#}", e)))?
            .ok_or_else(|| AppError::tx_not_found(format!("transaction {} not found", input.tx_id)))?;

        if record.chain != chain {
            return Err(AppError::invalid_chain(format!(
                "chain {} does not match prepared chain {}",
                chain, record.chain
            )));
        }

        if record.is_expired(Utc::now()) {
            return Err(AppError::tx_expired(format!(
                "transaction {} expired at {}",
                record.id, record.expires_at
            )));
        }

        if record.status != TransactionStatus::Pending {
            return Err(AppError::tx_already_processed(format!(
                "transaction {} is {}",
                record.id, record.status
            )));
        }

        // 认领：失败说明另一个请求已抢先进入广播
        let claimed = self
            .transactions
            .transition_status(
                record.id,
                TransactionStatus::Pending,
                TransactionStatus::Broadcasting,
                StatusUpdate::default(),
            )
            .await
            .map_err(|e| AppError::database_error(format!("{:#}", e)))?;
        if !claimed {
            return Err(AppError::tx_already_processed(format!(
                "transaction {} is already being broadcast",
                record.id
            )));
        }

        let claim = BroadcastClaim {
            transactions: self.transactions.clone(),
            tx_id: record.id,
            settled: false,
        };

        tracing::info!(
            tx_id = %record.id,
            chain = %chain,
            signed_tx = %redact_hex_string(&signed_tx, 10),
            "Broadcasting transaction"
        );

        let client = self.client.clone();
        let outcome = retry_with_backoff(&self.retry, record.id, chain, |_| {
            let client = client.clone();
            let signed_tx = signed_tx.clone();
            async move { client.send_raw_transaction(chain, &signed_tx).await }
        })
        .await;

        match outcome {
            Ok(tx_hash) => {
                crate::metrics::inc_broadcast_success(chain);
                let update = StatusUpdate {
                    tx_hash: Some(tx_hash.clone()),
                    error_message: None,
                };
                // 交易已上链，状态写入失败只记录日志
                if let Err(e) = self
                    .transactions
                    .transition_status(
                        record.id,
                        TransactionStatus::Broadcasting,
                        TransactionStatus::Confirming,
                        update,
                    )
                    .await
                {
                    tracing::error!(
                        tx_id = %record.id,
                        tx_hash = %tx_hash,
                        error = ?e,
                        "Failed to record broadcast result"
                    );
                }
                claim.settle();

                Ok(BroadcastResult {
                    explorer_url: chain.explorer_url(&tx_hash),
                    tx_hash,
                    chain,
                    status: TransactionStatus::Confirming,
                })
            }
            Err(err) => {
                crate::metrics::inc_broadcast_fail(chain);
                let (next, message) = match &err {
                    RetryError::Permanent(message) => (TransactionStatus::Failed, message.clone()),
                    RetryError::Exhausted { last_error, .. } => {
                        (TransactionStatus::Pending, last_error.clone())
                    }
                };

                let update = StatusUpdate {
                    tx_hash: None,
                    error_message: Some(message.clone()),
                };
                if let Err(e) = self
                    .transactions
                    .transition_status(record.id, TransactionStatus::Broadcasting, next, update)
                    .await
                {
                    tracing::error!(
                        tx_id = %record.id,
                        target_status = %next,
                        error = ?e,
                        "Failed to release broadcast claim"
                    );
                }
                claim.settle();

                Err(AppError::broadcast_failed(message))
            }
        }
    }
}
