//! Vote Cast Orchestrator.
//!
//! Submits the vote straight to the ledger and lets the contract's revert
//! conditions decide. Client-side eligibility is not re-checked here.
//! A candidate with no merged, explicit or numeric ledger id is matched by
//! name against the ledger roster before submission.
//!
//! # Cancellation
//!
//! The caller supplies a [`CancellationToken`]. Cancellation before
//! submission returns `Cancelled { tx_ref: None }`; cancellation while
//! waiting for finality returns the submitted `tx_ref` so the caller can look
//! it up on the ledger later. In both cases nothing is recorded locally or in
//! the backend.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::backend::Backend;
use crate::backend::VoteRecord;
use crate::constants::REJECTION_ALREADY_VOTED;
use crate::constants::REJECTION_NOT_APPROVED;
use crate::constants::REJECTION_NOT_ELIGIBLE;
use crate::error::CastError;
use crate::error::LedgerError;
use crate::identity::candidate_chain_id;
use crate::identity::resolve_candidate_id;
use crate::identity::resolve_election_id;
use crate::ledger::ClientHandle;
use crate::roster::RosterMerger;
use crate::types::CandidateRecord;
use crate::types::ChainId;
use crate::types::ElectionRef;
use crate::types::Receipt;
use crate::types::VoterIdentity;

/// Map a ledger revert message onto a [`CastError`].
///
/// Matching is by substring and must track the contract's revert strings.
pub fn classify_rejection(message: &str) -> CastError {
    if message.contains(REJECTION_ALREADY_VOTED) {
        CastError::AlreadyVoted
    } else if message.contains(REJECTION_NOT_APPROVED) {
        CastError::NotApproved
    } else if message.contains(REJECTION_NOT_ELIGIBLE) {
        CastError::NotEligible
    } else {
        CastError::Unknown(message.to_string())
    }
}

fn ledger_failure(err: LedgerError) -> CastError {
    match err {
        LedgerError::Unreachable { reason } => CastError::Unavailable { reason },
        other => classify_rejection(&other.message()),
    }
}

#[derive(Clone)]
pub struct VoteCaster {
    backend: Arc<dyn Backend>,
    roster: RosterMerger,
}

impl VoteCaster {
    /// `roster` bounds the ledger roster read used to resolve a candidate by name.
    pub fn new(backend: Arc<dyn Backend>, roster: RosterMerger) -> Self {
        Self { backend, roster }
    }

    /// Cast `voter`'s vote for `candidate` and wait for ledger finality.
    ///
    /// No implicit timeout: the wait ends on confirmation, failure or
    /// `cancel`. On success the backend is told about the vote in a detached
    /// task whose failure is only logged.
    pub async fn cast_vote(
        &self,
        handle: &ClientHandle,
        voter: &VoterIdentity,
        election: &ElectionRef,
        candidate: &CandidateRecord,
        cancel: &CancellationToken,
    ) -> Result<Receipt, CastError> {
        let election_id = resolve_election_id(election)?;
        if cancel.is_cancelled() {
            debug!(election_id, candidate = %candidate.off_chain_id, "vote cast cancelled before submission");
            return Err(CastError::Cancelled { tx_ref: None });
        }

        let candidate_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(election_id, candidate = %candidate.off_chain_id, "vote cast cancelled while resolving candidate");
                return Err(CastError::Cancelled { tx_ref: None });
            }
            resolved = self.resolve_candidate(handle, election_id, candidate) => resolved?,
        };

        let ledger = handle.ledger();
        let tx_ref = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(election_id, candidate_id, "vote cast cancelled during submission");
                return Err(CastError::Cancelled { tx_ref: None });
            }
            submitted = ledger.submit_vote(election_id, candidate_id) => submitted.map_err(|err| {
                let classified = ledger_failure(err);
                warn!(election_id, candidate_id, error = %classified, "vote submission rejected");
                classified
            })?,
        };

        let confirmation = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(%tx_ref, election_id, "vote cast cancelled while awaiting confirmation");
                return Err(CastError::Cancelled { tx_ref: Some(tx_ref.clone()) });
            }
            confirmed = ledger.await_confirmation(&tx_ref) => confirmed.map_err(|err| {
                let classified = ledger_failure(err);
                warn!(%tx_ref, election_id, error = %classified, "vote transaction failed");
                classified
            })?,
        };

        info!(
            tx_ref = %confirmation.tx_ref,
            election_id,
            candidate_id,
            block = ?confirmation.block_number,
            "vote confirmed"
        );

        self.record_in_backend(VoteRecord {
            voter_id: voter.off_chain_id.clone(),
            election_id: election.off_chain_id.clone(),
            candidate_id: candidate.off_chain_id.clone(),
            tx_ref: confirmation.tx_ref.clone(),
        });

        Ok(Receipt {
            tx_ref: confirmation.tx_ref,
            election_id,
            candidate_id,
            block_number: confirmation.block_number,
        })
    }

    /// Ledger id of `candidate`: merged, explicit or numeric id first, then a
    /// name match against the ledger roster.
    async fn resolve_candidate(
        &self,
        handle: &ClientHandle,
        election_id: ChainId,
        candidate: &CandidateRecord,
    ) -> Result<ChainId, CastError> {
        let unresolved = match candidate_chain_id(candidate) {
            Ok(id) => return Ok(id),
            Err(err) => err,
        };
        if candidate.name.is_empty() {
            return Err(unresolved.into());
        }

        let roster = match self.roster.chain_roster(handle.ledger(), election_id).await {
            Ok(roster) => roster,
            Err(err) => {
                warn!(election_id, candidate = %candidate.off_chain_id, error = %err, "ledger roster unavailable for name match");
                return Err(unresolved.into());
            }
        };
        match resolve_candidate_id(candidate, &roster.candidates) {
            Some(chain) => {
                debug!(election_id, candidate = %candidate.off_chain_id, candidate_id = chain.id, "candidate resolved by name");
                Ok(chain.id)
            }
            None => Err(unresolved.into()),
        }
    }

    fn record_in_backend(&self, record: VoteRecord) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            match backend.record_vote(&record).await {
                Ok(()) => debug!(tx_ref = %record.tx_ref, "vote recorded in backend"),
                Err(err) => warn!(tx_ref = %record.tx_ref, error = %err, "failed to record vote in backend"),
            }
        });
    }
}
