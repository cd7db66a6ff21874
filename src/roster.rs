//! Candidate roster merging.
//!
//! Backend candidates carry the display metadata; the ledger carries the tally.
//! The merge keeps every backend row, in backend order, and attaches ledger
//! data only where the identity resolver finds a match.
//!
//! # Chain roster retrieval
//!
//! One `candidate_count` call, then one `candidate` call per index `1..=count`.
//! A failed per-index call drops that index from the chain roster only; the
//! merge still completes. Fetches run with bounded concurrency and are
//! collected in index order.
//!
//! # Tiger Style
//!
//! - The reported count is capped at `max_roster_size`
//! - Fan-out is capped at `MAX_ROSTER_FETCH_CONCURRENCY`

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::constants::FIRST_CHAIN_CANDIDATE_ID;
use crate::constants::MAX_ROSTER_FETCH_CONCURRENCY;
use crate::error::LedgerError;
use crate::identity::resolve_candidate_id;
use crate::identity::resolve_election_id;
use crate::ledger::ClientHandle;
use crate::ledger::Ledger;
use crate::types::CandidateRecord;
use crate::types::ChainCandidate;
use crate::types::ChainId;
use crate::types::ElectionRef;
use crate::types::Tally;

/// Candidates read from the ledger for one election.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRoster {
    /// Count reported by the ledger (before capping).
    pub reported_count: u64,
    /// Successfully fetched candidates, in index order.
    pub candidates: Vec<ChainCandidate>,
    /// Indices whose fetch failed or returned an empty slot.
    pub skipped: Vec<ChainId>,
}

/// Fetch the ledger's roster for `election_id`.
///
/// Fails only if the count itself cannot be read.
pub async fn fetch_chain_roster(
    ledger: &dyn Ledger,
    election_id: ChainId,
    concurrency: usize,
    max_roster_size: u64,
) -> Result<ChainRoster, LedgerError> {
    let reported_count = ledger.candidate_count(election_id).await?;
    let count = reported_count.min(max_roster_size);
    if count < reported_count {
        warn!(election_id, reported_count, max_roster_size, "ledger candidate count capped");
    }

    let concurrency = concurrency.clamp(1, MAX_ROSTER_FETCH_CONCURRENCY);
    let ids = FIRST_CHAIN_CANDIDATE_ID..FIRST_CHAIN_CANDIDATE_ID + count;
    let fetched: Vec<(ChainId, Result<ChainCandidate, LedgerError>)> = stream::iter(ids)
        .map(|index| async move { (index, ledger.candidate(election_id, index).await) })
        .buffered(concurrency)
        .collect()
        .await;

    let mut roster = ChainRoster {
        reported_count,
        candidates: Vec::with_capacity(fetched.len()),
        skipped: Vec::new(),
    };
    for (index, result) in fetched {
        match result {
            // An unset contract slot reads back as a zeroed struct.
            Ok(candidate) if candidate.id == 0 => {
                debug!(election_id, index, "empty ledger candidate slot");
                roster.skipped.push(index);
            }
            Ok(candidate) => roster.candidates.push(candidate),
            Err(err) => {
                warn!(election_id, index, error = %err, "skipping ledger candidate");
                roster.skipped.push(index);
            }
        }
    }
    Ok(roster)
}

/// Attach ledger data to each backend candidate that resolves to a chain
/// candidate. Length and order of `backend_candidates` are preserved.
pub fn merge_candidates(backend_candidates: Vec<CandidateRecord>, chain_roster: &[ChainCandidate]) -> Vec<CandidateRecord> {
    backend_candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.chain_data = resolve_candidate_id(&candidate, chain_roster).cloned();
            candidate
        })
        .collect()
}

/// How much of the ledger roster backed a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainRosterState {
    /// Every reported candidate was fetched.
    Complete,
    /// Some indices could not be fetched.
    Partial { skipped: Vec<ChainId> },
    /// The count could not be read or no session was available.
    Unavailable { reason: String },
    /// The election has no ledger id.
    Unresolvable,
}

/// Merged roster with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRoster {
    pub candidates: Vec<CandidateRecord>,
    pub chain: ChainRosterState,
}

impl MergedRoster {
    pub fn into_candidates(self) -> Vec<CandidateRecord> {
        self.candidates
    }

    pub fn summary(&self) -> RosterSummary {
        RosterSummary::from_candidates(&self.candidates)
    }
}

/// Election results view over a merged roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterSummary {
    /// Sum of ledger tallies over matched candidates.
    pub total_chain_votes: u64,
    /// Rows with a ledger tally.
    pub matched: usize,
    /// Rows showing only the backend's own counter.
    pub backend_only: usize,
    /// Rows with no tally at all.
    pub unknown: usize,
}

impl RosterSummary {
    pub fn from_candidates(candidates: &[CandidateRecord]) -> Self {
        candidates.iter().fold(Self::default(), |mut summary, candidate| {
            match candidate.tally() {
                Tally::Chain(count) => {
                    summary.total_chain_votes = summary.total_chain_votes.saturating_add(count);
                    summary.matched += 1;
                }
                Tally::BackendOnly(_) => summary.backend_only += 1,
                Tally::Unknown => summary.unknown += 1,
            }
            summary
        })
    }

    /// Whether every row is backed by the ledger.
    pub fn is_fully_verified(&self) -> bool {
        self.backend_only == 0 && self.unknown == 0
    }
}

/// Candidate Roster Merger.
#[derive(Debug, Clone)]
pub struct RosterMerger {
    concurrency: usize,
    max_roster_size: u64,
}

impl RosterMerger {
    pub fn new(concurrency: usize, max_roster_size: u64) -> Self {
        Self {
            concurrency,
            max_roster_size,
        }
    }

    /// Ledger roster of `election_id` under this merger's fetch limits.
    pub async fn chain_roster(&self, ledger: &dyn Ledger, election_id: ChainId) -> Result<ChainRoster, LedgerError> {
        fetch_chain_roster(ledger, election_id, self.concurrency, self.max_roster_size).await
    }

    /// Merge backend candidates with the ledger roster of `election`.
    ///
    /// Never drops a backend candidate and never fails: ledger problems are
    /// reported in [`MergedRoster::chain`] and leave tallies unknown.
    pub async fn merge_roster(
        &self,
        handle: Option<&ClientHandle>,
        backend_candidates: Vec<CandidateRecord>,
        election: &ElectionRef,
    ) -> MergedRoster {
        let election_id = match resolve_election_id(election) {
            Ok(id) => id,
            Err(err) => {
                debug!(error = %err, "roster shown without ledger tallies");
                return MergedRoster {
                    candidates: merge_candidates(backend_candidates, &[]),
                    chain: ChainRosterState::Unresolvable,
                };
            }
        };

        let Some(handle) = handle else {
            return MergedRoster {
                candidates: merge_candidates(backend_candidates, &[]),
                chain: ChainRosterState::Unavailable {
                    reason: "no ledger session".to_string(),
                },
            };
        };

        match self.chain_roster(handle.ledger(), election_id).await {
            Ok(roster) => {
                let chain = if roster.skipped.is_empty() && roster.candidates.len() as u64 == roster.reported_count {
                    ChainRosterState::Complete
                } else {
                    ChainRosterState::Partial {
                        skipped: roster.skipped.clone(),
                    }
                };
                let candidates = merge_candidates(backend_candidates, &roster.candidates);
                debug!(
                    election_id,
                    backend = candidates.len(),
                    chain = roster.candidates.len(),
                    "roster merged"
                );
                MergedRoster { candidates, chain }
            }
            Err(err) => {
                warn!(election_id, error = %err, "ledger roster unavailable");
                MergedRoster {
                    candidates: merge_candidates(backend_candidates, &[]),
                    chain: ChainRosterState::Unavailable { reason: err.to_string() },
                }
            }
        }
    }
}
