//! Chain error types.

use gacha_economy::LedgerError;
use thiserror::Error;

/// Errors talking to the token contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The node could not be reached or answered with a non-JSON body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request was sent but no answer arrived in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The node answered with a JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The contract reverted the call or transaction.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// Calldata or return data could not be encoded or decoded.
    #[error("abi error: {0}")]
    Abi(String),

    /// No address is configured for the user.
    #[error("no account for user {0}")]
    UnknownAccount(String),
}

impl ChainError {
    /// Classifies a JSON-RPC error. Nodes report reverts as plain messages.
    #[must_use]
    pub fn from_rpc(code: i64, message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("revert") || lower.contains("exceeds balance") {
            Self::Reverted(message)
        } else {
            Self::Rpc { code, message }
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<alloy_sol_types::Error> for ChainError {
    fn from(e: alloy_sol_types::Error) -> Self {
        Self::Abi(e.to_string())
    }
}

impl From<ChainError> for LedgerError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::UnknownAccount(user) => Self::UnknownAccount(user),
            ChainError::Transport(_) | ChainError::Timeout(_) => Self::Unavailable(e.to_string()),
            ChainError::Rpc { .. } | ChainError::Reverted(_) | ChainError::Abi(_) => {
                Self::Rejected(e.to_string())
            }
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_messages_are_classified() {
        assert!(matches!(
            ChainError::from_rpc(3, "execution reverted: ERC20: burn amount exceeds balance".into()),
            ChainError::Reverted(_)
        ));
        assert!(matches!(
            ChainError::from_rpc(-32000, "nonce too low".into()),
            ChainError::Rpc { code: -32000, .. }
        ));
    }

    #[test]
    fn test_ledger_mapping() {
        assert_eq!(
            LedgerError::from(ChainError::UnknownAccount("u1".into())),
            LedgerError::UnknownAccount("u1".into())
        );
        assert!(matches!(
            LedgerError::from(ChainError::Transport("refused".into())),
            LedgerError::Unavailable(_)
        ));
    }
}
