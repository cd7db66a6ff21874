//! In-memory implementations of [`Ledger`], [`Backend`] and [`WalletProvider`].
//!
//! Deterministic, non-persistent stand-ins for the two external stores, with
//! failure injection for every degradation path the reconciler handles:
//! unreachable stores, failing roster indices, contract reverts and
//! confirmations that never arrive. Used by the test suite and by the CLI's
//! `--demo` mode.
//!
//! Clones share state, so a test can keep one copy for injection and hand
//! another to the code under test.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;

use crate::backend::Backend;
use crate::backend::BackendVoteStatus;
use crate::backend::VoteRecord;
use crate::error::BackendError;
use crate::error::ConnectError;
use crate::error::LedgerError;
use crate::ledger::Confirmation;
use crate::ledger::Ledger;
use crate::ledger::WalletProvider;
use crate::ledger::WalletSession;
use crate::types::CandidateRecord;
use crate::types::ChainCandidate;
use crate::types::ChainId;
use crate::types::ChainVoterDetails;
use crate::types::ElectionRef;
use crate::types::TxRef;
use crate::types::VoteDetail;
use crate::types::VoterIdentity;

// ============================================================================
// Ledger
// ============================================================================

#[derive(Default)]
struct LedgerState {
    candidates: HashMap<ChainId, Vec<ChainCandidate>>,
    failing_candidates: HashSet<(ChainId, ChainId)>,
    voted: HashMap<(String, ChainId), bool>,
    eligible: HashMap<(String, ChainId), bool>,
    voters: HashMap<String, ChainVoterDetails>,
    pending: HashMap<TxRef, (ChainId, ChainId)>,
    submitted: Vec<(ChainId, ChainId)>,
    signer: Option<String>,
    rejection: Option<String>,
    unreachable: bool,
    fail_voter_details: bool,
    hold_confirmations: bool,
    next_tx: u64,
}

/// Deterministic in-memory ledger.
///
/// Addresses are compared case-insensitively, like EVM addresses.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<SyncMutex<LedgerState>>,
}

fn account_key(address: &str) -> String {
    address.to_ascii_lowercase()
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate; returns its 1-based id.
    pub fn add_candidate(&self, election_id: ChainId, name: &str, vote_count: u64) -> ChainId {
        let mut state = self.state.lock();
        let roster = state.candidates.entry(election_id).or_default();
        let id = roster.len() as ChainId + 1;
        roster.push(ChainCandidate {
            id,
            name: name.to_string(),
            vote_count,
            ..ChainCandidate::default()
        });
        id
    }

    /// Make `candidate(election_id, candidate_id)` revert.
    pub fn fail_candidate(&self, election_id: ChainId, candidate_id: ChainId) {
        self.state.lock().failing_candidates.insert((election_id, candidate_id));
    }

    pub fn set_voted(&self, address: &str, election_id: ChainId, voted: bool) {
        self.state.lock().voted.insert((account_key(address), election_id), voted);
    }

    /// Region eligibility. Unknown voters are ineligible.
    pub fn set_eligible(&self, address: &str, election_id: ChainId, eligible: bool) {
        self.state.lock().eligible.insert((account_key(address), election_id), eligible);
    }

    pub fn register_voter(&self, address: &str, voter_id: &str, pincode: &str, approved: bool) {
        self.state.lock().voters.insert(
            account_key(address),
            ChainVoterDetails {
                voter_id: voter_id.to_string(),
                pincode: pincode.to_string(),
                is_approved: approved,
                registration_time: Some(chrono::Utc::now()),
            },
        );
    }

    /// Account whose votes `submit_vote` records.
    pub fn set_signer(&self, address: &str) {
        self.state.lock().signer = Some(account_key(address));
    }

    /// Every call fails with [`LedgerError::Unreachable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn fail_voter_details(&self, fail: bool) {
        self.state.lock().fail_voter_details = fail;
    }

    /// Revert every submission with `message`.
    pub fn reject_votes_with(&self, message: Option<&str>) {
        self.state.lock().rejection = message.map(str::to_string);
    }

    /// Keep `await_confirmation` pending forever.
    pub fn hold_confirmations(&self, hold: bool) {
        self.state.lock().hold_confirmations = hold;
    }

    /// `(election_id, candidate_id)` of every accepted submission.
    pub fn submitted_votes(&self) -> Vec<(ChainId, ChainId)> {
        self.state.lock().submitted.clone()
    }

    fn reachable(&self) -> Result<(), LedgerError> {
        if self.state.lock().unreachable {
            return Err(LedgerError::unreachable("in-memory ledger marked unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn candidate_count(&self, election_id: ChainId) -> Result<u64, LedgerError> {
        self.reachable()?;
        let state = self.state.lock();
        Ok(state.candidates.get(&election_id).map_or(0, |roster| roster.len() as u64))
    }

    async fn candidate(&self, election_id: ChainId, candidate_id: ChainId) -> Result<ChainCandidate, LedgerError> {
        self.reachable()?;
        let state = self.state.lock();
        if state.failing_candidates.contains(&(election_id, candidate_id)) {
            return Err(LedgerError::reverted("candidate lookup failed"));
        }
        let index = candidate_id.checked_sub(1).and_then(|i| usize::try_from(i).ok());
        state
            .candidates
            .get(&election_id)
            .and_then(|roster| index.and_then(|i| roster.get(i)))
            .cloned()
            .ok_or_else(|| LedgerError::reverted("Invalid candidate ID"))
    }

    async fn has_voter_voted(&self, voter: &str, election_id: ChainId) -> Result<bool, LedgerError> {
        self.reachable()?;
        Ok(self.state.lock().voted.get(&(account_key(voter), election_id)).copied().unwrap_or(false))
    }

    async fn is_voter_eligible_for_election(&self, voter: &str, election_id: ChainId) -> Result<bool, LedgerError> {
        self.reachable()?;
        Ok(self.state.lock().eligible.get(&(account_key(voter), election_id)).copied().unwrap_or(false))
    }

    async fn voter_details(&self, voter: &str) -> Result<ChainVoterDetails, LedgerError> {
        self.reachable()?;
        let state = self.state.lock();
        if state.fail_voter_details {
            return Err(LedgerError::unreachable("voter detail lookup failed"));
        }
        // Unregistered accounts read back as an empty record.
        Ok(state.voters.get(&account_key(voter)).cloned().unwrap_or_else(|| ChainVoterDetails {
            voter_id: String::new(),
            pincode: String::new(),
            is_approved: false,
            registration_time: None,
        }))
    }

    async fn submit_vote(&self, election_id: ChainId, candidate_id: ChainId) -> Result<TxRef, LedgerError> {
        self.reachable()?;
        let mut state = self.state.lock();
        if let Some(message) = &state.rejection {
            return Err(LedgerError::reverted(message.clone()));
        }
        if let Some(signer) = &state.signer
            && state.voted.get(&(signer.clone(), election_id)).copied().unwrap_or(false)
        {
            return Err(LedgerError::reverted("Already voted in this election"));
        }
        state.next_tx += 1;
        let tx_ref = TxRef::new(format!("0x{:064x}", state.next_tx));
        state.pending.insert(tx_ref.clone(), (election_id, candidate_id));
        state.submitted.push((election_id, candidate_id));
        Ok(tx_ref)
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation, LedgerError> {
        self.reachable()?;
        let hold = self.state.lock().hold_confirmations;
        if hold {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        let (election_id, candidate_id) =
            state.pending.remove(tx_ref).ok_or_else(|| LedgerError::Dropped { tx_ref: tx_ref.clone() })?;
        if let Some(candidate) = state
            .candidates
            .get_mut(&election_id)
            .and_then(|roster| roster.iter_mut().find(|c| c.id == candidate_id))
        {
            candidate.vote_count += 1;
        }
        if let Some(signer) = state.signer.clone() {
            state.voted.insert((signer, election_id), true);
        }
        Ok(Confirmation {
            tx_ref: tx_ref.clone(),
            block_number: Some(state.next_tx),
        })
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Default)]
struct BackendState {
    profile: Option<VoterIdentity>,
    active: Option<ElectionRef>,
    elections: Vec<ElectionRef>,
    candidates: HashMap<String, Vec<CandidateRecord>>,
    votes: HashMap<(String, String), BackendVoteStatus>,
    recorded: Vec<VoteRecord>,
    unavailable: bool,
}

/// Deterministic in-memory backend.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<SyncMutex<BackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&self, voter: VoterIdentity) {
        self.state.lock().profile = Some(voter);
    }

    /// Set the active election; it is also added to the election list.
    pub fn set_active_election(&self, election: Option<ElectionRef>) {
        let mut state = self.state.lock();
        if let Some(election) = &election
            && !state.elections.iter().any(|e| e.off_chain_id == election.off_chain_id)
        {
            state.elections.push(election.clone());
        }
        state.active = election;
    }

    pub fn add_election(&self, election: ElectionRef) {
        self.state.lock().elections.push(election);
    }

    pub fn set_candidates(&self, election_id: &str, candidates: Vec<CandidateRecord>) {
        self.state.lock().candidates.insert(election_id.to_string(), candidates);
    }

    pub fn set_voted(&self, voter_id: &str, election_id: &str, voted: bool) {
        self.state.lock().votes.insert(
            (voter_id.to_string(), election_id.to_string()),
            BackendVoteStatus {
                has_voted: voted,
                detail: None,
            },
        );
    }

    /// Every call fails with [`BackendError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Votes received through [`Backend::record_vote`].
    pub fn recorded_votes(&self) -> Vec<VoteRecord> {
        self.state.lock().recorded.clone()
    }

    fn available(&self) -> Result<(), BackendError> {
        if self.state.lock().unavailable {
            return Err(BackendError::unavailable("in-memory backend marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn voter_profile(&self) -> Result<VoterIdentity, BackendError> {
        self.available()?;
        self.state.lock().profile.clone().ok_or_else(|| BackendError::not_found("voter profile"))
    }

    async fn active_election(&self) -> Result<Option<ElectionRef>, BackendError> {
        self.available()?;
        Ok(self.state.lock().active.clone())
    }

    async fn elections(&self) -> Result<Vec<ElectionRef>, BackendError> {
        self.available()?;
        Ok(self.state.lock().elections.clone())
    }

    async fn vote_status(
        &self,
        voter: &VoterIdentity,
        election: &ElectionRef,
    ) -> Result<BackendVoteStatus, BackendError> {
        self.available()?;
        let key = (voter.off_chain_id.clone(), election.off_chain_id.clone());
        Ok(self.state.lock().votes.get(&key).cloned().unwrap_or_default())
    }

    async fn candidates(&self, election: &ElectionRef) -> Result<Vec<CandidateRecord>, BackendError> {
        self.available()?;
        self.state
            .lock()
            .candidates
            .get(&election.off_chain_id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("election {}", election.off_chain_id)))
    }

    async fn candidate(&self, election: &ElectionRef, candidate_id: &str) -> Result<CandidateRecord, BackendError> {
        self.available()?;
        self.state
            .lock()
            .candidates
            .get(&election.off_chain_id)
            .and_then(|roster| roster.iter().find(|c| c.off_chain_id == candidate_id))
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("candidate {candidate_id}")))
    }

    async fn record_vote(&self, record: &VoteRecord) -> Result<(), BackendError> {
        self.available()?;
        let mut state = self.state.lock();
        state.votes.insert(
            (record.voter_id.clone(), record.election_id.clone()),
            BackendVoteStatus {
                has_voted: true,
                detail: Some(VoteDetail {
                    candidate_id: Some(record.candidate_id.clone()),
                    timestamp: Some(chrono::Utc::now()),
                    tx_hash: Some(record.tx_ref.to_string()),
                }),
            },
        );
        state.recorded.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Wallet that answers every authorization request the same way.
pub struct StaticWallet {
    outcome: Result<(String, u64), ConnectError>,
    ledger: Arc<dyn Ledger>,
    requests: AtomicUsize,
}

impl StaticWallet {
    /// Authorizes `account` on `chain_id`.
    pub fn new(account: impl Into<String>, chain_id: u64, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            outcome: Ok((account.into(), chain_id)),
            ledger,
            requests: AtomicUsize::new(0),
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: ConnectError, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            outcome: Err(error),
            ledger,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of authorization requests received.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for StaticWallet {
    async fn authorize(&self) -> Result<WalletSession, ConnectError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (account, chain_id) = self.outcome.clone()?;
        Ok(WalletSession {
            account,
            chain_id,
            ledger: self.ledger.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_confirmation_applies_vote() {
        let ledger = InMemoryLedger::new();
        let id = ledger.add_candidate(1, "Asha", 0);
        ledger.set_signer("0xAA");

        let tx_ref = ledger.submit_vote(1, id).await.unwrap();
        assert!(!ledger.has_voter_voted("0xaa", 1).await.unwrap());

        ledger.await_confirmation(&tx_ref).await.unwrap();
        assert!(ledger.has_voter_voted("0xaa", 1).await.unwrap());
        assert_eq!(ledger.candidate(1, id).await.unwrap().vote_count, 1);

        let err = ledger.submit_vote(1, id).await.unwrap_err();
        assert!(err.message().contains("Already voted"));
    }

    #[tokio::test]
    async fn test_out_of_range_candidate_reverts() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(ledger.candidate(1, 0).await, Err(LedgerError::Reverted { .. })));
        assert!(matches!(ledger.candidate(1, 5).await, Err(LedgerError::Reverted { .. })));
    }

    #[tokio::test]
    async fn test_backend_record_vote_updates_status() {
        let backend = InMemoryBackend::new();
        let voter = VoterIdentity::new("v1", "560001", crate::types::ApprovalStatus::Approved);
        let election = ElectionRef::new("e1");
        assert!(!backend.vote_status(&voter, &election).await.unwrap().has_voted);

        backend
            .record_vote(&VoteRecord {
                voter_id: "v1".into(),
                election_id: "e1".into(),
                candidate_id: "c1".into(),
                tx_ref: TxRef::new("0x01"),
            })
            .await
            .unwrap();
        let status = backend.vote_status(&voter, &election).await.unwrap();
        assert!(status.has_voted);
        assert_eq!(status.detail.and_then(|d| d.tx_hash).as_deref(), Some("0x01"));
    }

    #[tokio::test]
    async fn test_static_wallet_failure() {
        let wallet = StaticWallet::failing(ConnectError::UserRejected, Arc::new(InMemoryLedger::new()));
        assert!(matches!(wallet.authorize().await, Err(ConnectError::UserRejected)));
        assert_eq!(wallet.requests(), 1);
    }
}
