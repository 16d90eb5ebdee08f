//! # Draw Engine Error Types
//!
//! Collaborator failures have their own enums. The orchestrator folds them into
//! [`DrawError`], which carries the step that failed and maps onto the
//! transport-agnostic [`ErrorCode`] reported to callers.

use thiserror::Error;

use crate::catalog::GachaId;

/// Error codes reported to callers.
///
/// The numeric values double as HTTP status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Draw count or request shape rejected.
    InvalidArgument = 400,
    /// Credential missing, malformed, tampered with or expired.
    Unauthenticated = 401,
    /// Balance below the cost of the draw.
    InsufficientFunds = 402,
    /// Unknown gacha identifier.
    InvalidCatalog = 404,
    /// Catalog or ownership storage failed.
    StoreError = 500,
    /// Ledger unreachable or debit refused for a reason other than funds.
    LedgerError = 502,
}

impl ErrorCode {
    /// Numeric value of the code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Credential verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing credential")]
    Missing,
    /// Credential does not have the expected shape.
    #[error("malformed credential: {0}")]
    Malformed(&'static str),
    /// Signature does not match the payload.
    #[error("credential signature mismatch")]
    BadSignature,
    /// Credential is past its expiry (unix seconds).
    #[error("credential expired at {0}")]
    Expired(u64),
}

/// Catalog Provider failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Backing storage could not be read.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// Catalog definition rejected at load time.
    #[error("invalid catalog: {0}")]
    InvalidConfig(String),
}

/// Ledger Client failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the debit because the balance is too low.
    #[error("insufficient funds: need {required}")]
    InsufficientFunds {
        /// Amount requested.
        required: u64,
        /// Balance seen by the ledger, when it reports one.
        available: Option<u64>,
    },
    /// No ledger account is known for the user.
    #[error("no ledger account for user {0}")]
    UnknownAccount(String),
    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// The ledger refused the operation.
    #[error("ledger rejected operation: {0}")]
    Rejected(String),
    /// A debit was submitted but its outcome could not be confirmed.
    #[error("debit outcome unknown: {0}")]
    Indeterminate(String),
}

/// Ownership Store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying IO failed.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data failed an integrity check.
    #[error("store corrupt: {0}")]
    Corrupt(String),
    /// Store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Weighted Selector failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    /// The catalog has no entries or every weight is zero.
    #[error("catalog is empty or every weight is zero")]
    EmptyCatalog,
}

/// Ledger call that failed, for error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerStep {
    /// Balance query (step 4).
    Balance,
    /// Debit (step 5).
    Debit,
}

impl std::fmt::Display for LedgerStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Balance => f.write_str("balance check"),
            Self::Debit => f.write_str("debit"),
        }
    }
}

/// Errors returned by the Draw Orchestrator and the inventory reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// Credential rejected.
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),

    /// Unknown gacha identifier.
    #[error("gacha_id {0} does not exist")]
    InvalidCatalog(GachaId),

    /// Request rejected before any collaborator call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Balance below the cost of the draw.
    #[error("balance is not enough: draw costs {required}")]
    InsufficientFunds {
        /// Cost of the draw.
        required: u64,
        /// Balance observed, when known.
        available: Option<u64>,
    },

    /// Ledger failed before any currency left the user's balance.
    #[error("ledger error during {step}: {source}")]
    Ledger {
        /// Which ledger call failed.
        step: LedgerStep,
        /// Underlying failure.
        source: LedgerError,
    },

    /// Catalog lookup failed before the debit.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Ownership Store read failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The debit committed but the grant did not fully persist.
    ///
    /// Nothing is refunded automatically; this must be reconciled.
    #[error(
        "inventory out of sync with ledger: user {user_id} paid {debited}, \
         {granted} granted: {reason}"
    )]
    GrantIncomplete {
        /// User whose balance was debited.
        user_id: String,
        /// Amount debited.
        debited: u64,
        /// Ownership records durably written before the failure.
        granted: u64,
        /// What failed after the debit.
        reason: String,
    },
}

impl DrawError {
    /// Code reported to the caller.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated(_) => ErrorCode::Unauthenticated,
            Self::InvalidCatalog(_) => ErrorCode::InvalidCatalog,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::Ledger { .. } => ErrorCode::LedgerError,
            Self::Catalog(_) | Self::Store(_) | Self::GrantIncomplete { .. } => {
                ErrorCode::StoreError
            }
        }
    }

    /// Whether currency was taken without the matching grant.
    #[must_use]
    pub const fn needs_reconciliation(&self) -> bool {
        matches!(self, Self::GrantIncomplete { .. })
    }
}

/// Result type for draw engine operations.
pub type EconomyResult<T> = Result<T, DrawError>;
