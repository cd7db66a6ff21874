//! Identity resolution between backend and ledger entities.
//!
//! Off-chain ids are opaque strings; on-chain ids are small integers. The two
//! are never compared directly. A string id only stands in for a ledger id
//! through the explicit decimal coercion in this module, which is a lossy
//! compatibility rule for records that never got an explicit mapping.
//!
//! # Candidate precedence
//!
//! 1. explicit `on_chain_id` equal to the chain candidate id
//! 2. off-chain id coerced to an integer, equal to the chain candidate id
//! 3. case-insensitive exact name equality
//!
//! Each rule is tried against the whole roster before the next one, so an
//! explicit link always beats a name collision.

use tracing::debug;

use crate::error::IdentityError;
use crate::types::CandidateRecord;
use crate::types::ChainCandidate;
use crate::types::ChainId;
use crate::types::ElectionRef;

/// Strict decimal coercion of an off-chain id.
///
/// Surrounding whitespace is ignored; anything else that is not a plain
/// unsigned integer (`"e1"`, `"12abc"`, `"-3"`, `""`) does not coerce.
pub fn coerce_off_chain_id(id: &str) -> Option<ChainId> {
    let trimmed = id.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<ChainId>().ok()
}

/// Ledger id for an election: the explicit mapping, else the coerced off-chain id.
pub fn resolve_election_id(election: &ElectionRef) -> Result<ChainId, IdentityError> {
    if let Some(id) = election.on_chain_id {
        return Ok(id);
    }
    coerce_off_chain_id(&election.off_chain_id).ok_or_else(|| IdentityError::UnresolvableIdentity {
        kind: "election",
        off_chain_id: election.off_chain_id.clone(),
    })
}

/// Match a backend candidate against a chain roster.
///
/// Returns `None` when no rule matches; the candidate is then shown without a
/// tally.
pub fn resolve_candidate_id<'a>(
    candidate: &CandidateRecord,
    chain_roster: &'a [ChainCandidate],
) -> Option<&'a ChainCandidate> {
    if let Some(explicit) = candidate.on_chain_id {
        if let Some(found) = chain_roster.iter().find(|chain| chain.id == explicit) {
            return Some(found);
        }
        debug!(
            candidate = %candidate.off_chain_id,
            on_chain_id = explicit,
            "explicit on-chain id not present in roster"
        );
    }

    if let Some(coerced) = coerce_off_chain_id(&candidate.off_chain_id)
        && let Some(found) = chain_roster.iter().find(|chain| chain.id == coerced)
    {
        return Some(found);
    }

    if candidate.name.is_empty() {
        return None;
    }
    let wanted = candidate.name.to_lowercase();
    chain_roster.iter().find(|chain| chain.name.to_lowercase() == wanted)
}

/// Ledger id for a candidate without consulting a roster.
///
/// An already-merged `chain_data` id wins, then the explicit mapping, then the
/// coerced off-chain id. Name matching needs the chain roster and is left to
/// [`resolve_candidate_id`].
pub fn candidate_chain_id(candidate: &CandidateRecord) -> Result<ChainId, IdentityError> {
    if let Some(chain) = &candidate.chain_data {
        return Ok(chain.id);
    }
    if let Some(id) = candidate.on_chain_id {
        return Ok(id);
    }
    coerce_off_chain_id(&candidate.off_chain_id).ok_or_else(|| IdentityError::UnresolvableIdentity {
        kind: "candidate",
        off_chain_id: candidate.off_chain_id.clone(),
    })
}
