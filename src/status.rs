//! Dual-source vote-status resolution.
//!
//! The ledger and the backend are treated as independent witnesses that never
//! contradict each other: a positive answer from either is definitive, and an
//! unreachable source can only ever remove information, never flip a
//! positive to a negative.
//!
//! ## Query path
//!
//! 1. Resolve the election's ledger id (skip the ledger if that fails)
//! 2. Ask both stores concurrently; each failure is isolated
//! 3. OR the answers and record which stores answered
//! 4. After a positive ledger answer, fetch the ledger voter record with a
//!    bounded wait; its failure is logged and dropped

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::backend::Backend;
use crate::identity::resolve_election_id;
use crate::ledger::ClientHandle;
use crate::types::ChainId;
use crate::types::ChainVoterDetails;
use crate::types::ElectionRef;
use crate::types::VoteDetail;
use crate::types::VoteStatus;
use crate::types::VoterIdentity;

/// Ledger account to query for `voter`.
///
/// The backend-supplied wallet wins; the session account is the fallback.
pub fn voter_address<'a>(voter: &'a VoterIdentity, handle: Option<&'a ClientHandle>) -> Option<&'a str> {
    voter.wallet_address.as_deref().filter(|addr| !addr.is_empty()).or_else(|| handle.map(ClientHandle::account))
}

/// Resolves [`VoteStatus`] for one (voter, election) pair.
#[derive(Clone)]
pub struct VoteStatusResolver {
    backend: Arc<dyn Backend>,
    enrichment_timeout: Duration,
}

impl VoteStatusResolver {
    pub fn new(backend: Arc<dyn Backend>, enrichment_timeout: Duration) -> Self {
        Self {
            backend,
            enrichment_timeout,
        }
    }

    /// Merged vote status. Never fails; an unreachable store shows up as
    /// reduced provenance.
    ///
    /// `handle` is `None` when no ledger session could be established; the
    /// ledger side is then skipped.
    pub async fn get_vote_status(
        &self,
        handle: Option<&ClientHandle>,
        voter: &VoterIdentity,
        election: &ElectionRef,
    ) -> VoteStatus {
        let address = voter_address(voter, handle);
        let chain_election = match resolve_election_id(election) {
            Ok(id) => Some(id),
            Err(err) => {
                debug!(error = %err, "skipping ledger vote-status query");
                None
            }
        };

        let (chain_voted, (backend_voted, detail)) =
            tokio::join!(query_chain(handle, address, chain_election), self.query_backend(voter, election));

        let mut status = VoteStatus::merge(chain_voted, backend_voted);
        status.detail = detail;

        if status.confirmed_by_chain()
            && let (Some(handle), Some(address)) = (handle, address)
        {
            status.chain_voter = self.enrich(handle, address).await;
        }

        debug!(
            voter = %voter.off_chain_id,
            election = %election.off_chain_id,
            has_voted = status.has_voted,
            source = %status.source,
            "vote status resolved"
        );
        status
    }

    async fn query_backend(&self, voter: &VoterIdentity, election: &ElectionRef) -> (Option<bool>, Option<VoteDetail>) {
        match self.backend.vote_status(voter, election).await {
            Ok(answer) => (Some(answer.has_voted), answer.detail),
            Err(err) => {
                warn!(
                    voter = %voter.off_chain_id,
                    election = %election.off_chain_id,
                    error = %err,
                    "backend vote status unavailable"
                );
                (None, None)
            }
        }
    }

    async fn enrich(&self, handle: &ClientHandle, address: &str) -> Option<ChainVoterDetails> {
        match tokio::time::timeout(self.enrichment_timeout, handle.ledger().voter_details(address)).await {
            Ok(Ok(details)) => Some(details),
            Ok(Err(err)) => {
                warn!(voter = address, error = %err, "ledger voter detail enrichment failed");
                None
            }
            Err(_) => {
                warn!(
                    voter = address,
                    timeout_ms = self.enrichment_timeout.as_millis() as u64,
                    "ledger voter detail enrichment timed out"
                );
                None
            }
        }
    }
}

async fn query_chain(handle: Option<&ClientHandle>, address: Option<&str>, election_id: Option<ChainId>) -> Option<bool> {
    let (handle, address, election_id) = (handle?, address?, election_id?);
    match handle.ledger().has_voter_voted(address, election_id).await {
        Ok(voted) => Some(voted),
        Err(err) => {
            warn!(voter = address, election_id, error = %err, "ledger vote status unavailable");
            None
        }
    }
}
