//! Error taxonomy for gateway sessions.
//!
//! Nothing in this crate retries. Every failure surfaces as a
//! [`GatewayError`] to the caller, which decides whether the run continues.

use std::time::Duration;

use prost::Message;
use thiserror::Error;
use tonic::{Code, Status};

use crate::options::CallType;
use crate::proto::{self, tx_validation_code_name};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors returned by identity loading, connection setup, and contract calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or unreadable credential files, directories, or settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Key or certificate material that cannot be parsed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Channel, TLS, or connectivity failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A call did not complete within its deadline.
    #[error("{call} call exceeded its {}s deadline", .after.as_secs_f64())]
    Timeout { call: CallType, after: Duration },

    /// The peer or the contract rejected the call.
    #[error("{call} call rejected ({code:?}): {message}{}", render_details(.details))]
    Contract {
        call: CallType,
        code: Code,
        message: String,
        details: Vec<ErrorDetail>,
    },

    /// The transaction was ordered but invalidated at commit.
    #[error(
        "transaction {transaction_id} failed to commit with status code {code} ({})",
        code_name(.code)
    )]
    CommitFailed { transaction_id: String, code: i32 },

    /// The peer returned bytes that do not decode as the expected message.
    #[error("malformed gateway response: {0}")]
    Protocol(String),

    /// The session was already closed.
    #[error("gateway session is closed")]
    Closed,
}

/// Failure reported by one peer while the gateway served a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub address: String,
    pub msp_id: String,
    pub message: String,
}

impl GatewayError {
    /// Map a gRPC status from `call` onto the taxonomy.
    pub fn from_status(call: CallType, after: Duration, status: Status) -> Self {
        match status.code() {
            Code::DeadlineExceeded => GatewayError::Timeout { call, after },
            Code::Unavailable | Code::Cancelled => {
                GatewayError::Transport(format!("{call} call failed: {}", status.message()))
            }
            code => GatewayError::Contract {
                call,
                code,
                message: status.message().to_string(),
                details: error_details(&status),
            },
        }
    }

    /// `true` when the failure was raised by the peer or the contract,
    /// rather than by the local client or the network.
    pub fn is_contract_error(&self) -> bool {
        matches!(self, GatewayError::Contract { .. } | GatewayError::CommitFailed { .. })
    }
}

impl From<prost::DecodeError> for GatewayError {
    fn from(e: prost::DecodeError) -> Self {
        GatewayError::Protocol(e.to_string())
    }
}

/// Decode the gateway [`ErrorDetail`] entries carried in a status, if any.
pub fn error_details(status: &Status) -> Vec<ErrorDetail> {
    let raw = status.details();
    if raw.is_empty() {
        return Vec::new();
    }
    let Ok(rpc) = proto::RpcStatus::decode(raw) else {
        return Vec::new();
    };
    rpc.details
        .iter()
        .filter(|any| any.type_url == proto::ERROR_DETAIL_TYPE_URL)
        .filter_map(|any| proto::ErrorDetail::decode(any.value.as_slice()).ok())
        .map(|d| ErrorDetail {
            address: d.address,
            msp_id: d.msp_id,
            message: d.message,
        })
        .collect()
}

fn code_name(code: &i32) -> &'static str {
    tx_validation_code_name(*code)
}

fn render_details(details: &[ErrorDetail]) -> String {
    details
        .iter()
        .map(|d| format!("\n    - {} ({}): {}", d.address, d.msp_id, d.message))
        .collect()
}
