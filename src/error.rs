use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    domain::{chain_config::UnsupportedChain, derivation::DerivationError},
    utils::amount::AmountError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // 交易引擎错误码
    InvalidChain,
    InvalidAddress,
    InvalidAmount,
    AddressNotFound,
    PrepareFailed,
    MissingSignedTx,
    TxNotFound,
    TxExpired,
    TxAlreadyProcessed,
    BroadcastFailed,
    DbError,

    // HTTP 基础错误码
    BadRequest,
    Internal,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::InvalidChain => "INVALID_CHAIN",
            AppErrorCode::InvalidAddress => "INVALID_ADDRESS",
            AppErrorCode::InvalidAmount => "INVALID_AMOUNT",
            AppErrorCode::AddressNotFound => "ADDRESS_NOT_FOUND",
            AppErrorCode::PrepareFailed => "PREPARE_FAILED",
            AppErrorCode::MissingSignedTx => "MISSING_SIGNED_TX",
            AppErrorCode::TxNotFound => "TX_NOT_FOUND",
            AppErrorCode::TxExpired => "TX_EXPIRED",
            AppErrorCode::TxAlreadyProcessed => "TX_ALREADY_PROCESSED",
            AppErrorCode::BroadcastFailed => "BROADCAST_FAILED",
            AppErrorCode::DbError => "DB_ERROR",
            AppErrorCode::BadRequest => "BAD_REQUEST",
            AppErrorCode::Internal => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppErrorCode::InvalidChain
            | AppErrorCode::InvalidAddress
            | AppErrorCode::InvalidAmount
            | AppErrorCode::MissingSignedTx
            | AppErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            AppErrorCode::AddressNotFound | AppErrorCode::TxNotFound => StatusCode::NOT_FOUND,
            AppErrorCode::TxExpired => StatusCode::GONE,
            AppErrorCode::TxAlreadyProcessed => StatusCode::CONFLICT,
            AppErrorCode::PrepareFailed | AppErrorCode::BroadcastFailed => StatusCode::BAD_GATEWAY,
            AppErrorCode::DbError | AppErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn new(code: AppErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status: code.status(),
            trace_id: None,
        }
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn invalid_chain(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidChain, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAmount, msg)
    }

    pub fn address_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::AddressNotFound, msg)
    }

    pub fn prepare_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::PrepareFailed, msg)
    }

    pub fn missing_signed_tx() -> Self {
        Self::new(AppErrorCode::MissingSignedTx, "signed_tx is required")
    }

    pub fn tx_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::TxNotFound, msg)
    }

    pub fn tx_expired(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::TxExpired, msg)
    }

    pub fn tx_already_processed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::TxAlreadyProcessed, msg)
    }

    pub fn broadcast_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BroadcastFailed, msg)
    }

    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::DbError, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, msg)
    }
}

// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON serialization error: {}", err))
    }
}

// 从 SQLx 错误转换
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database_error(format!("Database operation failed: {}", err))
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

impl From<UnsupportedChain> for AppError {
    fn from(err: UnsupportedChain) -> Self {
        Self::invalid_chain(err.to_string())
    }
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        Self::invalid_amount(err.to_string())
    }
}

impl From<DerivationError> for AppError {
    fn from(err: DerivationError) -> Self {
        match err {
            DerivationError::UnsupportedChain(chain) => {
                Self::invalid_chain(format!("unsupported chain: {chain}"))
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings_and_status() {
        let err = AppError::tx_expired("expired");
        assert_eq!(err.code.as_str(), "TX_EXPIRED");
        assert_eq!(err.status, StatusCode::GONE);

        let err = AppError::tx_already_processed("claimed");
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "TX_ALREADY_PROCESSED: claimed");
    }

    #[test]
    fn test_sqlx_maps_to_db_error() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code, AppErrorCode::DbError);
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: AppError = "ATOM".parse::<crate::domain::chain_config::Chain>().unwrap_err().into();
        assert_eq!(err.code, AppErrorCode::InvalidChain);

        let err: AppError = AmountError::NonPositive.into();
        assert_eq!(err.code, AppErrorCode::InvalidAmount);
    }
}
