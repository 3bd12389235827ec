use std::fmt;

use alloy::{
    rpc::json_rpc::ErrorPayload,
    transports::{RpcError, TransportError},
};

use crate::{
    TryParseTransportErrorResult,
    taiko::inbox::ITaikoInbox::ITaikoInboxErrors,
    try_parse_transport_error,
    tx_manager::{
        BLOB_GAS_TOO_LOW_ERROR, MAX_FEE_PER_GAS_TOO_LOW_ERROR, NONCE_TOO_LOW_ERROR,
        extract_base_fee_from_err,
    },
};
use surge_primitives::retries::is_connection_refused;

/// JSON-RPC code of a call or gas estimation that hit `REVERT`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Generic server error code. Geth reports tx pool rejections with it.
pub const SERVER_ERROR_CODE: i64 = -32000;

/// EIP-1474 code of a transaction refused by the node.
pub const TRANSACTION_REJECTED_CODE: i64 = -32003;

/// EIP-1474 code of a request refused by a rate limiter.
pub const LIMIT_EXCEEDED_CODE: i64 = -32005;

/// EIP-1474 code of a resource the node cannot serve yet.
pub const RESOURCE_UNAVAILABLE_CODE: i64 = -32002;

/// Message fragments of node faults reported under a generic error code.
const TRANSIENT_ERROR_MESSAGES: &[&str] = &["timeout", "header not found", "too many requests"];

/// Why the node refused to accept a transaction into its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The nonce was already used by a mined transaction.
    NonceTooLow,
    /// A transaction with the same nonce and higher fees is pending.
    ReplacementUnderpriced,
    /// The exact transaction is already in the pool.
    AlreadyKnown,
    /// The max fee per gas is below the block base fee. Carries the base fee if reported.
    FeeCapTooLow(Option<u128>),
    /// The max fee per blob gas is below the block blob base fee.
    BlobFeeCapTooLow,
}

impl Rejection {
    /// Decodes the rejection reason of a tx pool error.
    ///
    /// Execution clients only carry the reason in the message, so this is matched against
    /// the message fragments they share.
    pub fn from_message(message: &str) -> Option<Self> {
        let msg = message.to_lowercase();
        if msg.contains(BLOB_GAS_TOO_LOW_ERROR) {
            Some(Self::BlobFeeCapTooLow)
        } else if msg.contains(MAX_FEE_PER_GAS_TOO_LOW_ERROR) {
            Some(Self::FeeCapTooLow(extract_base_fee_from_err(&msg)))
        } else if msg.contains(NONCE_TOO_LOW_ERROR) {
            Some(Self::NonceTooLow)
        } else if msg.contains("replacement transaction underpriced") {
            Some(Self::ReplacementUnderpriced)
        } else if msg.contains("already known") {
            Some(Self::AlreadyKnown)
        } else {
            None
        }
    }

    /// Returns the label used in logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NonceTooLow => "nonce_too_low",
            Self::ReplacementUnderpriced => "replacement_underpriced",
            Self::AlreadyKnown => "already_known",
            Self::FeeCapTooLow(_) => "fee_cap_too_low",
            Self::BlobFeeCapTooLow => "blob_fee_cap_too_low",
        }
    }
}

/// Classification of a failed on-chain interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertKind {
    /// The desired outcome is already on chain (batch verified, same transition, ...).
    /// Treated as success.
    Benign(String),
    /// The transaction reverted for a reason that retrying won't fix.
    Fatal(String),
    /// A network or node fault. Worth retrying with backoff.
    Transient(String),
    /// The node refused the transaction into its pool. Worth retrying once the cause is
    /// addressed.
    Rejected(Rejection, String),
}

impl RevertKind {
    /// Classifies a decoded inbox custom error.
    pub fn from_inbox_error(err: &ITaikoInboxErrors) -> Self {
        let name = format!("{err:?}");
        match err {
            ITaikoInboxErrors::BatchVerified(_) |
            ITaikoInboxErrors::SameTransition(_) |
            ITaikoInboxErrors::TransitionAlreadyProved(_) |
            ITaikoInboxErrors::AlreadyContested(_) |
            ITaikoInboxErrors::AssignmentNotExpired(_) => Self::Benign(name),
            _ => Self::Fatal(name),
        }
    }

    /// Classifies a transport error, decoding inbox custom errors from revert data if present.
    pub fn from_transport_error(err: TransportError) -> Self {
        match try_parse_transport_error::<ITaikoInboxErrors>(err) {
            TryParseTransportErrorResult::Decoded(e) => Self::from_inbox_error(&e),
            TryParseTransportErrorResult::UnknownSelector(data) => {
                Self::Fatal(format!("unknown revert selector: {data}"))
            }
            TryParseTransportErrorResult::Original(err) => Self::from_rpc_error(&err),
        }
    }

    /// Classifies a transport error by its kind and error response, without decoding revert
    /// data.
    pub fn from_rpc_error(err: &TransportError) -> Self {
        match err {
            RpcError::Transport(kind) if is_connection_refused(kind) => {
                Self::Transient(format!("connection refused: {kind}"))
            }
            RpcError::Transport(kind) => Self::Transient(kind.to_string()),
            RpcError::ErrorResp(payload) => Self::from_error_payload(payload),
            RpcError::NullResp | RpcError::DeserError { .. } => Self::Transient(err.to_string()),
            _ => Self::Fatal(err.to_string()),
        }
    }

    /// Classifies a JSON-RPC error response by its code, then by the rejection it carries.
    /// Unknown messages under a generic code fall back to fragment matching.
    pub fn from_error_payload(payload: &ErrorPayload) -> Self {
        let message = payload.message.to_string();
        match payload.code {
            EXECUTION_REVERTED_CODE => Self::Fatal(message),
            LIMIT_EXCEEDED_CODE | RESOURCE_UNAVAILABLE_CODE => Self::Transient(message),
            _ if payload.is_retry_err() => Self::Transient(message),
            code => {
                if let Some(rejection) = Rejection::from_message(&message) {
                    return Self::Rejected(rejection, message)
                }
                let msg = message.to_lowercase();
                if code == SERVER_ERROR_CODE &&
                    TRANSIENT_ERROR_MESSAGES.iter().any(|m| msg.contains(m))
                {
                    Self::Transient(message)
                } else {
                    Self::Fatal(message)
                }
            }
        }
    }

    /// Returns the pool rejection reason, if the node refused the transaction.
    pub const fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection, _) => Some(*rejection),
            _ => None,
        }
    }

    /// Returns true if the outcome must be treated as success.
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::Benign(_))
    }

    /// Returns true if the operation is worth retrying.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Rejected(..))
    }

    /// Returns the label used in logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Benign(_) => "benign",
            Self::Fatal(_) => "fatal",
            Self::Transient(_) => "transient",
            Self::Rejected(rejection, _) => rejection.label(),
        }
    }
}

impl fmt::Display for RevertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benign(reason) |
            Self::Fatal(reason) |
            Self::Transient(reason) |
            Self::Rejected(_, reason) => write!(f, "{}: {reason}", self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::{rpc::json_rpc::ErrorPayload, transports::TransportErrorKind};
    use alloy_sol_types::SolInterface;

    use super::*;
    use crate::taiko::inbox::ITaikoInbox;

    fn revert_with(err: ITaikoInboxErrors) -> TransportError {
        let data = alloy_primitives::hex::encode_prefixed(err.abi_encode());
        let payload = ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: Some(serde_json::value::to_raw_value(&data).unwrap()),
        };
        RpcError::ErrorResp(payload)
    }

    #[test]
    fn already_verified_is_benign() {
        let err = revert_with(ITaikoInboxErrors::BatchVerified(ITaikoInbox::BatchVerified {}));
        assert!(RevertKind::from_transport_error(err).is_benign());

        let err = revert_with(ITaikoInboxErrors::SameTransition(ITaikoInbox::SameTransition {}));
        assert!(RevertKind::from_transport_error(err).is_benign());
    }

    #[test]
    fn invalid_params_is_fatal() {
        let err = revert_with(ITaikoInboxErrors::InvalidParams(ITaikoInbox::InvalidParams {}));
        assert!(matches!(RevertKind::from_transport_error(err), RevertKind::Fatal(_)));
    }

    #[test]
    fn network_faults_are_transient() {
        let err = RpcError::Transport(TransportErrorKind::BackendGone);
        assert!(RevertKind::from_transport_error(err).is_transient());

        let payload = ErrorPayload {
            code: -32000,
            message: "nonce too low: next nonce 5, tx nonce 4".into(),
            data: None,
        };
        assert!(RevertKind::from_transport_error(RpcError::ErrorResp(payload)).is_transient());
    }

    #[test]
    fn error_codes_take_precedence_over_messages() {
        // A rate limiter that happens to mention a nonce is still a rate limiter.
        let payload = ErrorPayload {
            code: LIMIT_EXCEEDED_CODE,
            message: "nonce too low, slow down".into(),
            data: None,
        };
        let kind = RevertKind::from_error_payload(&payload);
        assert_eq!(kind.label(), "transient");
        assert_eq!(kind.rejection(), None);

        let payload =
            ErrorPayload { code: EXECUTION_REVERTED_CODE, message: "timeout".into(), data: None };
        assert_eq!(RevertKind::from_error_payload(&payload).label(), "fatal");

        // Unknown rejections under the EIP-1474 code are not retried.
        let payload = ErrorPayload {
            code: TRANSACTION_REJECTED_CODE,
            message: "sender is blacklisted".into(),
            data: None,
        };
        assert_eq!(RevertKind::from_error_payload(&payload).label(), "fatal");
    }

    #[test]
    fn pool_rejections_are_decoded() {
        let payload = ErrorPayload {
            code: TRANSACTION_REJECTED_CODE,
            message: "Nonce too low".into(),
            data: None,
        };
        assert_eq!(RevertKind::from_error_payload(&payload).rejection(), Some(Rejection::NonceTooLow));

        let payload = ErrorPayload {
            code: SERVER_ERROR_CODE,
            message: "max fee per gas less than block base fee: address 0xA5a9D8524077714378E12aF057B40d42AAd79F3C, maxFeePerGas: 1009953, baseFee: 64546698".into(),
            data: None,
        };
        let kind = RevertKind::from_error_payload(&payload);
        assert_eq!(kind.rejection(), Some(Rejection::FeeCapTooLow(Some(64546698))));
        assert!(kind.is_transient());

        let payload = ErrorPayload {
            code: SERVER_ERROR_CODE,
            message: "max fee per blob gas less than block blob gas fee: have 1, want 2".into(),
            data: None,
        };
        assert_eq!(
            RevertKind::from_error_payload(&payload).rejection(),
            Some(Rejection::BlobFeeCapTooLow)
        );
    }

    #[test]
    fn plain_execution_reverted_is_fatal() {
        let payload =
            ErrorPayload { code: 3, message: "execution reverted".into(), data: None };
        let kind = RevertKind::from_transport_error(RpcError::ErrorResp(payload));
        assert_eq!(kind.label(), "fatal");
    }
}
