//! 交易准备服务
//!
//! 校验顺序固定：链 → 收款地址 → 金额 → 付款地址归属。
//! 四项全部通过之前不发起任何网络请求。

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    blockchain_client::ChainClient,
    gas_estimator::{
        evm_fee_for_priority, fallback_fee_rate, utxo_estimated_size, NATIVE_GAS_LIMIT,
        SOLANA_FEE_PER_SIGNATURE, TOKEN_GAS_LIMIT,
    },
};
use crate::{
    codec::eip55,
    domain::{
        chain_config::{Chain, ChainFamily},
        transaction::{
            EvmUnsignedTx, PreparedTransaction, PreparedTransactionRecord, Priority,
            SolanaUnsignedTx, UnsignedTransaction, UtxoInput, UtxoOutput, UtxoUnsignedTx,
        },
        transaction_status::TransactionStatus,
    },
    error::AppError,
    infrastructure::log_redact::redact_address,
    repository::{PreparedTransactionRepository, WalletAddress, WalletAddressRepository},
    signing::{evm::transfer_call_data, solana::system_transfer},
    utils::{address_validator::AddressValidator, amount::parse_amount},
};

/// 准备请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareTransactionInput {
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    /// 显示单位十进制字符串
    pub amount: String,
    #[serde(default)]
    pub priority: Priority,
}

/// 通过校验的请求
struct ValidatedRequest {
    chain: Chain,
    sender: WalletAddress,
    to_address: String,
    amount: u128,
}

pub struct TransactionPrepareService {
    addresses: Arc<dyn WalletAddressRepository>,
    transactions: Arc<dyn PreparedTransactionRepository>,
    client: Arc<dyn ChainClient>,
    ttl: chrono::Duration,
}

impl TransactionPrepareService {
    pub fn new(
        addresses: Arc<dyn WalletAddressRepository>,
        transactions: Arc<dyn PreparedTransactionRepository>,
        client: Arc<dyn ChainClient>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            addresses,
            transactions,
            client,
            ttl,
        }
    }

    pub async fn prepare_transaction(
        &self,
        wallet_id: Uuid,
        input: PrepareTransactionInput,
    ) -> Result<PreparedTransaction, AppError> {
        let request = self.validate(wallet_id, &input).await?;
        let chain = request.chain;

        tracing::info!(
            wallet_id = %wallet_id,
            chain = %chain,
            from = %redact_address(&request.sender.address),
            to = %redact_address(&request.to_address),
            priority = %input.priority,
            "Preparing transaction"
        );

        let unsigned_tx = match chain.family() {
            ChainFamily::Evm => self.build_evm(&request, input.priority).await?,
            ChainFamily::Utxo => self.build_utxo(&request, input.priority).await?,
            ChainFamily::Solana => self.build_solana(&request).await?,
            ChainFamily::Cardano => {
                return Err(AppError::invalid_chain(format!(
                    "{} does not support transactions",
                    chain
                )))
            }
        };

        let now = Utc::now();
        let fee = unsigned_tx.fee();
        let record = PreparedTransactionRecord {
            id: Uuid::new_v4(),
            wallet_id,
            address_id: request.sender.id,
            chain,
            from_address: request.sender.address.clone(),
            to_address: request.to_address.clone(),
            amount: input.amount.trim().to_string(),
            fee,
            priority: input.priority,
            unsigned_tx: unsigned_tx.clone(),
            status: TransactionStatus::Pending,
            tx_hash: None,
            error_message: None,
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.transactions.insert(&record).await.map_err(|e| {
            tracing::error!(tx_id = %record.id, error = ?e, "Failed to persist prepared transaction");
            AppError::database_error(format!("{:#}", e))
        })?;

        crate::metrics::inc_prepared(chain);
        tracing::info!(
            tx_id = %record.id,
            chain = %chain,
            fee = %fee,
            expires_at = %record.expires_at,
            "Transaction prepared"
        );

        Ok(PreparedTransaction {
            tx_id: record.id,
            chain,
            unsigned_tx,
            fee,
            expires_at: record.expires_at,
            priority: input.priority,
        })
    }

    async fn validate(
        &self,
        wallet_id: Uuid,
        input: &PrepareTransactionInput,
    ) -> Result<ValidatedRequest, AppError> {
        // 1. 链
        let chain: Chain = input.chain.parse()?;
        if !chain.is_transactable() {
            return Err(AppError::invalid_chain(format!(
                "{} does not support transactions",
                chain
            )));
        }

        // 2. 收款地址
        let to_address = input.to_address.trim().to_string();
        if !AddressValidator::validate(chain, &to_address) {
            return Err(AppError::invalid_address(format!(
                "invalid {} address: {}",
                chain, to_address
            )));
        }

        // 3. 金额
        let amount = parse_amount(&input.amount, chain.decimals())?;
        if chain.family() != ChainFamily::Evm && u64::try_from(amount).is_err() {
            return Err(AppError::invalid_amount(format!(
                "amount exceeds the {} maximum",
                chain
            )));
        }

        // 4. 付款地址归属（代币链可复用底层链登记的地址）
        let from_address = input.from_address.trim();
        let mut sender = self
            .addresses
            .find_active(wallet_id, chain, from_address)
            .await
            .map_err(|e| AppError::database_error(format!("{:#}", e)))?;
        if sender.is_none() && chain.is_token() {
            sender = self
                .addresses
                .find_active(wallet_id, chain.base_chain(), from_address)
                .await
                .map_err(|e| AppError::database_error(format!("{:#}", e)))?;
        }
        let sender = sender.ok_or_else(|| {
            AppError::address_not_found(format!(
                "address {} not found in wallet for {}",
                from_address, chain
            ))
        })?;

        Ok(ValidatedRequest {
            chain,
            sender,
            to_address,
            amount,
        })
    }

    async fn build_evm(
        &self,
        request: &ValidatedRequest,
        priority: Priority,
    ) -> Result<UnsignedTransaction, AppError> {
        let chain = request.chain;
        let config = chain.config();
        let chain_id = config
            .evm_chain_id
            .ok_or_else(|| AppError::internal(format!("{} has no chain id", chain)))?;
        let recipient = eip55::parse(&request.to_address)
            .ok_or_else(|| AppError::invalid_address(request.to_address.clone()))?;

        let nonce = self
            .client
            .get_nonce(chain, &request.sender.address)
            .await
            .map_err(prepare_failed)?;
        let gas_price = self
            .client
            .get_gas_price(chain)
            .await
            .map_err(prepare_failed)?;
        let quote = evm_fee_for_priority(gas_price, priority);

        let tx = match config.token_contract {
            Some(contract) => EvmUnsignedTx {
                chain,
                chain_id,
                nonce,
                to: contract.to_string(),
                value: 0,
                gas_limit: TOKEN_GAS_LIMIT,
                max_fee_per_gas: quote.max_fee_per_gas,
                max_priority_fee_per_gas: quote.max_priority_fee_per_gas,
                data: Some(format!(
                    "0x{}",
                    hex::encode(transfer_call_data(&recipient, request.amount))
                )),
                token_contract: Some(contract.to_string()),
            },
            None => EvmUnsignedTx {
                chain,
                chain_id,
                nonce,
                to: eip55::to_checksum(&recipient),
                value: request.amount,
                gas_limit: NATIVE_GAS_LIMIT,
                max_fee_per_gas: quote.max_fee_per_gas,
                max_priority_fee_per_gas: quote.max_priority_fee_per_gas,
                data: None,
                token_contract: None,
            },
        };

        Ok(UnsignedTransaction::Evm(tx))
    }

    async fn build_utxo(
        &self,
        request: &ValidatedRequest,
        priority: Priority,
    ) -> Result<UnsignedTransaction, AppError> {
        let chain = request.chain;
        let params = chain
            .utxo_params()
            .ok_or_else(|| AppError::internal(format!("{} has no UTXO parameters", chain)))?;
        let from = &request.sender.address;
        let amount = u64::try_from(request.amount)
            .map_err(|_| AppError::invalid_amount("amount out of range"))?;
        let script_pubkey = AddressValidator::script_pubkey_for(chain, from)
            .map(hex::encode)
            .ok_or_else(|| AppError::invalid_address(format!("unsupported sender {}", from)))?;

        let utxos = self
            .client
            .get_utxos(chain, from)
            .await
            .map_err(prepare_failed)?;
        if utxos.is_empty() {
            return Err(AppError::prepare_failed(format!(
                "insufficient funds: no spendable outputs for {}",
                redact_address(from)
            )));
        }

        let fee_rate = match self.client.get_fee_rate(chain, priority).await {
            Ok(rate) if rate > 0 => rate,
            Ok(_) | Err(_) => {
                let rate = fallback_fee_rate(params, priority);
                tracing::warn!(chain = %chain, fee_rate = rate, "Fee estimate unavailable, using fallback rate");
                rate
            }
        };

        // 朴素选币：使用全部 UTXO，按两个输出估算体积
        let size = utxo_estimated_size(utxos.len(), 2);
        let mut fee = size.saturating_mul(fee_rate);
        let total_input = utxos
            .iter()
            .try_fold(0u64, |total, utxo| total.checked_add(utxo.value))
            .ok_or_else(|| AppError::prepare_failed("UTXO values overflow"))?;
        let required = amount.saturating_add(fee);
        if total_input < required {
            return Err(AppError::prepare_failed(format!(
                "insufficient funds: available {}, required {}",
                total_input, required
            )));
        }

        let mut outputs = vec![UtxoOutput {
            address: request.to_address.clone(),
            value: amount,
        }];
        let remainder = total_input - required;
        if remainder > params.dust_threshold {
            outputs.push(UtxoOutput {
                address: from.clone(),
                value: remainder,
            });
        } else {
            // 粉尘找零并入手续费
            fee += remainder;
        }

        let inputs = utxos
            .into_iter()
            .map(|utxo| UtxoInput {
                txid: utxo.txid,
                vout: utxo.vout,
                value: utxo.value,
                script_pubkey: script_pubkey.clone(),
            })
            .collect();

        Ok(UnsignedTransaction::Utxo(UtxoUnsignedTx {
            chain,
            inputs,
            outputs,
            fee_rate,
            fee,
        }))
    }

    async fn build_solana(
        &self,
        request: &ValidatedRequest,
    ) -> Result<UnsignedTransaction, AppError> {
        let chain = request.chain;
        let from = &request.sender.address;
        let amount = u64::try_from(request.amount)
            .map_err(|_| AppError::invalid_amount("amount out of range"))?;

        let recent_blockhash = self
            .client
            .get_recent_blockhash(chain)
            .await
            .map_err(prepare_failed)?;

        let tx = match chain.config().token_contract {
            // 代币指令（ATA 创建 + TransferChecked）由签名端构建
            Some(mint) => SolanaUnsignedTx {
                chain,
                fee_payer: from.clone(),
                recent_blockhash,
                instructions: Vec::new(),
                fee: SOLANA_FEE_PER_SIGNATURE,
                mint: Some(mint.to_string()),
                recipient: Some(request.to_address.clone()),
                amount: Some(amount),
            },
            None => SolanaUnsignedTx {
                chain,
                fee_payer: from.clone(),
                recent_blockhash,
                instructions: vec![system_transfer(from, &request.to_address, amount)],
                fee: SOLANA_FEE_PER_SIGNATURE,
                mint: None,
                recipient: None,
                amount: None,
            },
        };

        Ok(UnsignedTransaction::Solana(tx))
    }
}

fn prepare_failed(err: anyhow::Error) -> AppError {
    AppError::prepare_failed(format!("{:#}", err))
}
