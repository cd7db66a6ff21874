//! Error taxonomy for the reconciliation engine.
//!
//! Partial failures (`SourceUnavailable`-style outcomes) are absorbed inside the
//! components and expressed as provenance on the result; the types here are what
//! escapes a component boundary. Only the write path propagates a ledger
//! rejection as a hard error.

use thiserror::Error;

use crate::types::TxRef;

/// Failure to establish the wallet-mediated ledger session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// No wallet provider is available in this environment.
    #[error("no wallet provider available")]
    ProviderAbsent,

    /// The account holder declined the authorization request.
    #[error("wallet authorization rejected by user")]
    UserRejected,

    /// The provider is attached to a different network than the contract.
    #[error("network mismatch: expected chain {expected}, provider is on chain {actual}")]
    NetworkMismatch {
        /// Chain id the contract is deployed on.
        expected: u64,
        /// Chain id reported by the provider.
        actual: u64,
    },

    /// The provider could not be reached while authorizing.
    #[error("wallet provider transport failure: {reason}")]
    Transport {
        /// Description of the transport failure.
        reason: String,
    },
}

/// Failure of a single ledger call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger endpoint did not answer.
    #[error("ledger unreachable: {reason}")]
    Unreachable {
        /// Description of the transport failure.
        reason: String,
    },

    /// The contract reverted the call.
    #[error("ledger reverted: {message}")]
    Reverted {
        /// Revert message as reported by the ledger.
        message: String,
    },

    /// A submitted transaction disappeared before inclusion.
    #[error("transaction {tx_ref} dropped before confirmation")]
    Dropped {
        /// The transaction that was dropped.
        tx_ref: TxRef,
    },

    /// The voter address is not a valid ledger account.
    #[error("invalid ledger address: {address}")]
    InvalidAddress {
        /// The rejected address string.
        address: String,
    },

    /// A ledger integer did not fit the local representation.
    #[error("ledger value out of range for {field}")]
    OutOfRange {
        /// Name of the field that overflowed.
        field: String,
    },
}

impl LedgerError {
    pub(crate) fn unreachable<S: Into<String>>(reason: S) -> Self {
        Self::Unreachable { reason: reason.into() }
    }

    pub(crate) fn reverted<S: Into<String>>(message: S) -> Self {
        Self::Reverted {
            message: message.into(),
        }
    }

    /// Raw message text used for rejection classification.
    pub fn message(&self) -> String {
        match self {
            LedgerError::Reverted { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Failure of a single backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Backend failed (network/server/etc).
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// Backend reported a missing resource.
    #[error("not found: {reason}")]
    NotFound {
        /// Text included in the backend response.
        reason: String,
    },

    /// Backend refused the request (4xx other than 404).
    #[error("backend rejected request ({status}): {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Text included in the backend response.
        reason: String,
    },

    /// Response body did not match the expected shape.
    #[error("malformed backend response: {reason}")]
    Decode {
        /// Decoder error.
        reason: String,
    },
}

impl BackendError {
    pub(crate) fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub(crate) fn not_found<S: Into<String>>(reason: S) -> Self {
        Self::NotFound { reason: reason.into() }
    }
}

/// An entity could not be mapped between the two stores.
///
/// Degrades only the entity concerned, never the whole query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unresolvable {kind} identity: {off_chain_id:?} has no on-chain id and is not numeric")]
    UnresolvableIdentity {
        /// "election" or "candidate".
        kind: &'static str,
        /// The off-chain identifier that failed coercion.
        off_chain_id: String,
    },
}

/// Outcome of a rejected or interrupted vote cast.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CastError {
    #[error("voter has already voted in this election")]
    AlreadyVoted,

    #[error("voter registration is not approved")]
    NotApproved,

    #[error("voter is not eligible for this election")]
    NotEligible,

    /// Ledger rejection that matched no known reason. Carries the raw message.
    #[error("vote rejected: {0}")]
    Unknown(String),

    /// The caller cancelled before the ledger reported finality.
    ///
    /// `tx_ref` is set when the transaction had already been submitted; its
    /// fate is then only knowable from the ledger.
    #[error("vote cast cancelled before confirmation")]
    Cancelled {
        /// Submitted transaction, if any.
        tx_ref: Option<TxRef>,
    },

    /// Election or candidate id could not be resolved.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The ledger could not be reached at all.
    #[error("ledger unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
}

/// Failure to assemble a reconciler from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
