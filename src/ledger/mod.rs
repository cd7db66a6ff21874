//! Ledger read/write contract and the wallet-mediated session that reaches it.
//!
//! The ledger is the authoritative, append-only store of cast votes. It is only
//! reachable through a [`WalletProvider`], which may suspend indefinitely while
//! the account holder decides whether to authorize the session.
//!
//! # Write path
//!
//! Casting is split into [`Ledger::submit_vote`] and [`Ledger::await_confirmation`]
//! so the caller can abandon the wait for finality without losing the
//! transaction reference.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConnectError;
use crate::error::LedgerError;
use crate::types::ChainCandidate;
use crate::types::ChainId;
use crate::types::ChainVoterDetails;
use crate::types::TxRef;

mod binder;
#[cfg(feature = "evm")]
pub mod evm;

pub use binder::ChainBinder;
pub use binder::ClientHandle;

/// Finality report for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_ref: TxRef,
    pub block_number: Option<u64>,
}

/// Contract-level interface of the voting ledger.
///
/// All ids are on-chain integers. Off-chain identifiers must go through
/// [`crate::identity`] first; they are never passed here directly.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Number of candidates registered for an election.
    async fn candidate_count(&self, election_id: ChainId) -> Result<u64, LedgerError>;

    /// Candidate record by 1-based index.
    async fn candidate(&self, election_id: ChainId, candidate_id: ChainId) -> Result<ChainCandidate, LedgerError>;

    async fn has_voter_voted(&self, voter: &str, election_id: ChainId) -> Result<bool, LedgerError>;

    /// Pincode-based eligibility as judged by the contract.
    async fn is_voter_eligible_for_election(&self, voter: &str, election_id: ChainId) -> Result<bool, LedgerError>;

    async fn voter_details(&self, voter: &str) -> Result<ChainVoterDetails, LedgerError>;

    /// Sign and broadcast a vote. Returns once the transaction is accepted for
    /// inclusion, not when it is final.
    async fn submit_vote(&self, election_id: ChainId, candidate_id: ChainId) -> Result<TxRef, LedgerError>;

    /// Suspend until the transport reports finality or failure. No timeout.
    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation, LedgerError>;
}

/// An authorized ledger session produced by a wallet.
pub struct WalletSession {
    /// Account that signs writes.
    pub account: String,
    /// Chain the provider is attached to.
    pub chain_id: u64,
    pub ledger: Arc<dyn Ledger>,
}

/// Source of ledger sessions (browser wallet, local signer, test double).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Request account authorization.
    ///
    /// May suspend until the account holder responds. Callers cancel by
    /// dropping the future.
    async fn authorize(&self) -> Result<WalletSession, ConnectError>;
}
