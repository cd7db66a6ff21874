//! Eligibility Gate.
//!
//! Combines backend approval, the ledger's own eligibility check and the
//! merged vote status into one allow/deny verdict. Every check runs on every
//! call; nothing is cached between calls.
//!
//! Client-side eligibility is advisory. The ledger write path stays the final
//! authority (see [`crate::cast`]).

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::warn;

use crate::identity::resolve_election_id;
use crate::ledger::ClientHandle;
use crate::status::VoteStatusResolver;
use crate::status::voter_address;
use crate::types::EligibilityDecision;
use crate::types::EligibilityReason;
use crate::types::ElectionRef;
use crate::types::VoterIdentity;

/// Raw ledger answer to the region check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEligibility {
    Eligible,
    Ineligible,
    Unavailable,
    /// No ledger account to ask about.
    NoAddress,
}

#[derive(Clone)]
pub struct EligibilityGate {
    status: VoteStatusResolver,
}

impl EligibilityGate {
    pub fn new(status: VoteStatusResolver) -> Self {
        Self { status }
    }

    /// Decide whether `voter` may cast a vote in `election` at `now`.
    ///
    /// Reasons are reported in a stable order: approval, wallet, window,
    /// region (or `chain_unavailable`), prior vote. `chain_unavailable` never
    /// blocks on its own.
    pub async fn can_cast_vote(
        &self,
        handle: Option<&ClientHandle>,
        voter: &VoterIdentity,
        election: &ElectionRef,
        now: DateTime<Utc>,
    ) -> EligibilityDecision {
        let (chain, status) = tokio::join!(
            chain_eligibility(handle, voter, election),
            self.status.get_vote_status(handle, voter, election)
        );

        let mut reasons = Vec::new();
        if !voter.is_approved() {
            reasons.push(EligibilityReason::NotApproved);
        }
        if chain == ChainEligibility::NoAddress {
            reasons.push(EligibilityReason::NoWallet);
        }
        if !election.is_open_at(now) {
            reasons.push(EligibilityReason::ElectionNotOpen);
        }
        match chain {
            ChainEligibility::Ineligible => reasons.push(EligibilityReason::NotEligibleRegion),
            ChainEligibility::Unavailable => reasons.push(EligibilityReason::ChainUnavailable),
            ChainEligibility::Eligible | ChainEligibility::NoAddress => {}
        }
        if status.has_voted {
            reasons.push(EligibilityReason::AlreadyVoted);
        }

        let decision = EligibilityDecision::from_reasons(reasons);
        debug!(
            voter = %voter.off_chain_id,
            election = %election.off_chain_id,
            allowed = decision.allowed,
            reasons = ?decision.reasons,
            vote_source = %status.source,
            "eligibility evaluated"
        );
        decision
    }
}

async fn chain_eligibility(
    handle: Option<&ClientHandle>,
    voter: &VoterIdentity,
    election: &ElectionRef,
) -> ChainEligibility {
    let Some(address) = voter_address(voter, handle) else {
        return ChainEligibility::NoAddress;
    };
    let Some(handle) = handle else {
        debug!(voter = %voter.off_chain_id, "no ledger session for eligibility check");
        return ChainEligibility::Unavailable;
    };
    let election_id = match resolve_election_id(election) {
        Ok(id) => id,
        Err(err) => {
            debug!(error = %err, "ledger eligibility check skipped");
            return ChainEligibility::Unavailable;
        }
    };

    match handle.ledger().is_voter_eligible_for_election(address, election_id).await {
        Ok(true) => ChainEligibility::Eligible,
        Ok(false) => ChainEligibility::Ineligible,
        Err(err) => {
            warn!(voter = address, election_id, error = %err, "ledger eligibility unavailable");
            ChainEligibility::Unavailable
        }
    }
}
