//! Data model shared by the reconciliation components.
//!
//! `VoterIdentity`, `ElectionRef` and the off-chain half of `CandidateRecord`
//! are owned by the backend and fetched fresh per session. Everything else here
//! (`VoteStatus`, `EligibilityDecision`, the merged `chain_data` projection) is a
//! derived value recomputed on every query and never stored.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// On-chain numeric identifier (elections and candidates).
pub type ChainId = u64;

/// Registration approval state as tracked by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// A voter as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "VoterWire")]
pub struct VoterIdentity {
    /// Opaque backend identifier.
    pub off_chain_id: String,
    /// Ledger account, once known.
    pub wallet_address: Option<String>,
    pub pincode: String,
    pub approval_status: ApprovalStatus,
}

impl VoterIdentity {
    pub fn new(off_chain_id: impl Into<String>, pincode: impl Into<String>, approval_status: ApprovalStatus) -> Self {
        Self {
            off_chain_id: off_chain_id.into(),
            wallet_address: None,
            pincode: pincode.into(),
            approval_status,
        }
    }

    pub fn with_wallet(mut self, address: impl Into<String>) -> Self {
        self.wallet_address = Some(address.into());
        self
    }

    /// Cache a ledger account learned from the wallet session.
    ///
    /// An address the backend already supplied is never overwritten. Returns
    /// `true` when the address was stored.
    pub fn bind_wallet(&mut self, address: &str) -> bool {
        if self.wallet_address.is_some() || address.is_empty() {
            return false;
        }
        self.wallet_address = Some(address.to_string());
        true
    }

    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}

/// Reference to an election across both stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ElectionWire")]
pub struct ElectionRef {
    pub off_chain_id: String,
    /// Authoritative identifier for ledger calls when present.
    pub on_chain_id: Option<ChainId>,
    pub pincode: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
}

impl ElectionRef {
    pub fn new(off_chain_id: impl Into<String>) -> Self {
        Self {
            off_chain_id: off_chain_id.into(),
            on_chain_id: None,
            pincode: String::new(),
            start_time: None,
            end_time: None,
            title: None,
        }
    }

    pub fn with_on_chain_id(mut self, id: ChainId) -> Self {
        self.on_chain_id = Some(id);
        self
    }

    pub fn with_pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = pincode.into();
        self
    }

    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// Whether `now` falls inside the voting window.
    ///
    /// A missing bound is treated as open on that side.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.start_time.is_none_or(|start| now >= start);
        let not_ended = self.end_time.is_none_or(|end| now < end);
        started && not_ended
    }
}

/// A candidate as stored on the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCandidate {
    pub id: ChainId,
    pub name: String,
    pub party: String,
    pub slogan: String,
    pub pincode: String,
    pub constituency: String,
    pub vote_count: u64,
}

/// Voter registration as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVoterDetails {
    pub voter_id: String,
    pub pincode: String,
    pub is_approved: bool,
    /// `None` when the ledger reports a zero timestamp (never registered).
    pub registration_time: Option<DateTime<Utc>>,
}

/// Backend candidate metadata, optionally joined with its ledger record.
///
/// The join is a read-only projection: `chain_data` is filled by the roster
/// merger on every query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CandidateWire")]
pub struct CandidateRecord {
    pub off_chain_id: String,
    /// Explicit link to the ledger candidate, when the backend recorded one.
    pub on_chain_id: Option<ChainId>,
    pub name: String,
    pub party: String,
    pub photo: Option<String>,
    pub manifesto: Option<String>,
    pub constituency: Option<String>,
    /// The backend's own counter. Informational only; the ledger tally wins.
    #[serde(rename = "voteCount")]
    pub backend_vote_count: Option<u64>,
    pub chain_data: Option<ChainCandidate>,
}

impl CandidateRecord {
    pub fn new(off_chain_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            off_chain_id: off_chain_id.into(),
            on_chain_id: None,
            name: name.into(),
            party: String::new(),
            photo: None,
            manifesto: None,
            constituency: None,
            backend_vote_count: None,
            chain_data: None,
        }
    }

    pub fn with_on_chain_id(mut self, id: ChainId) -> Self {
        self.on_chain_id = Some(id);
        self
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = party.into();
        self
    }

    /// Ledger tally, if this row was matched to a chain candidate.
    pub fn vote_count(&self) -> Option<u64> {
        self.chain_data.as_ref().map(|chain| chain.vote_count)
    }

    /// Tally with its provenance. An unmatched row is `Unknown`, never zero.
    pub fn tally(&self) -> Tally {
        match (&self.chain_data, self.backend_vote_count) {
            (Some(chain), _) => Tally::Chain(chain.vote_count),
            (None, Some(count)) => Tally::BackendOnly(count),
            (None, None) => Tally::Unknown,
        }
    }
}

/// A candidate's vote count together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "count", rename_all = "snake_case")]
pub enum Tally {
    /// Counted by the ledger.
    Chain(u64),
    /// Only the backend's counter is available.
    BackendOnly(u64),
    Unknown,
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tally::Chain(count) => write!(f, "{count}"),
            Tally::BackendOnly(count) => write!(f, "{count} (backend only)"),
            Tally::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which stores answered a dual-source query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteSource {
    Chain,
    Backend,
    Both,
    /// Neither store answered. Means "unknown", not "has not voted".
    None,
}

impl VoteSource {
    pub fn from_answers(chain_answered: bool, backend_answered: bool) -> Self {
        match (chain_answered, backend_answered) {
            (true, true) => VoteSource::Both,
            (true, false) => VoteSource::Chain,
            (false, true) => VoteSource::Backend,
            (false, false) => VoteSource::None,
        }
    }

    pub fn includes_chain(self) -> bool {
        matches!(self, VoteSource::Chain | VoteSource::Both)
    }

    pub fn includes_backend(self) -> bool {
        matches!(self, VoteSource::Backend | VoteSource::Both)
    }
}

impl fmt::Display for VoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoteSource::Chain => "chain",
            VoteSource::Backend => "backend",
            VoteSource::Both => "both",
            VoteSource::None => "none",
        };
        f.write_str(s)
    }
}

/// The vote the backend recorded for this voter, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDetail {
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "blockchainTxHash")]
    pub tx_hash: Option<String>,
}

/// Merged answer to "has this voter voted in this election".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub has_voted: bool,
    pub source: VoteSource,
    /// Raw ledger answer; `None` if the ledger was not consulted or failed.
    pub chain_voted: Option<bool>,
    /// Raw backend answer; `None` if the backend failed.
    pub backend_voted: Option<bool>,
    pub detail: Option<VoteDetail>,
    /// Best-effort ledger voter record, fetched only after a positive ledger answer.
    pub chain_voter: Option<ChainVoterDetails>,
}

impl VoteStatus {
    /// Result when neither store could be reached.
    pub fn unknown() -> Self {
        Self {
            has_voted: false,
            source: VoteSource::None,
            chain_voted: None,
            backend_voted: None,
            detail: None,
            chain_voter: None,
        }
    }

    /// Merge two independent witnesses. Either positive answer is definitive.
    pub fn merge(chain_voted: Option<bool>, backend_voted: Option<bool>) -> Self {
        Self {
            has_voted: chain_voted.unwrap_or(false) || backend_voted.unwrap_or(false),
            source: VoteSource::from_answers(chain_voted.is_some(), backend_voted.is_some()),
            chain_voted,
            backend_voted,
            detail: None,
            chain_voter: None,
        }
    }

    /// No store answered; callers must not read this as "not voted".
    pub fn is_unknown(&self) -> bool {
        self.source == VoteSource::None
    }

    pub fn confirmed_by_chain(&self) -> bool {
        self.chain_voted == Some(true)
    }

    /// Positive only because the backend says so; the ledger did not confirm.
    pub fn confirmed_by_backend_only(&self) -> bool {
        self.backend_voted == Some(true) && self.chain_voted != Some(true)
    }
}

/// Reason attached to an eligibility decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    NotApproved,
    NotEligibleRegion,
    AlreadyVoted,
    /// Ledger eligibility could not be checked. Warning only.
    ChainUnavailable,
    /// Approved voter without a known ledger account.
    NoWallet,
    /// Outside the election's voting window.
    ElectionNotOpen,
}

impl EligibilityReason {
    /// Whether this reason denies the attempt on its own.
    pub fn is_blocking(self) -> bool {
        !matches!(self, EligibilityReason::ChainUnavailable)
    }
}

impl fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EligibilityReason::NotApproved => "not_approved",
            EligibilityReason::NotEligibleRegion => "not_eligible_region",
            EligibilityReason::AlreadyVoted => "already_voted",
            EligibilityReason::ChainUnavailable => "chain_unavailable",
            EligibilityReason::NoWallet => "no_wallet",
            EligibilityReason::ElectionNotOpen => "election_not_open",
        };
        f.write_str(s)
    }
}

/// Allow/deny verdict for casting a vote. Always recomputed before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub allowed: bool,
    pub reasons: Vec<EligibilityReason>,
}

impl EligibilityDecision {
    /// Build a decision; `allowed` holds iff no reason is blocking.
    pub fn from_reasons(reasons: Vec<EligibilityReason>) -> Self {
        let allowed = reasons.iter().all(|reason| !reason.is_blocking());
        Self { allowed, reasons }
    }

    pub fn has_reason(&self, reason: EligibilityReason) -> bool {
        self.reasons.contains(&reason)
    }
}

/// Ledger transaction reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(pub String);

impl TxRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of a confirmed vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_ref: TxRef,
    pub election_id: ChainId,
    pub candidate_id: ChainId,
    pub block_number: Option<u64>,
}

// ============================================================================
// Backend wire format
// ============================================================================

/// Identifier keys a backend document may carry.
///
/// Documents serialized with virtuals enabled carry both `_id` and its `id`
/// alias; the first present key wins.
#[derive(Deserialize)]
struct WireId {
    #[serde(default, rename = "offChainId")]
    off_chain_id: Option<String>,
    #[serde(default, rename = "_id")]
    document_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl WireId {
    fn resolve(self, kind: &str) -> Result<String, String> {
        self.off_chain_id
            .or(self.document_id)
            .or(self.id)
            .ok_or_else(|| format!("{kind} payload has no `_id` or `id`"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoterWire {
    #[serde(flatten)]
    id: WireId,
    #[serde(default)]
    wallet_address: Option<String>,
    #[serde(default)]
    pincode: String,
    #[serde(default, alias = "status")]
    approval_status: ApprovalStatus,
}

impl TryFrom<VoterWire> for VoterIdentity {
    type Error = String;

    fn try_from(wire: VoterWire) -> Result<Self, Self::Error> {
        Ok(Self {
            off_chain_id: wire.id.resolve("voter")?,
            wallet_address: wire.wallet_address,
            pincode: wire.pincode,
            approval_status: wire.approval_status,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElectionWire {
    #[serde(flatten)]
    id: WireId,
    #[serde(default, alias = "blockchainId")]
    on_chain_id: Option<ChainId>,
    #[serde(default, alias = "region")]
    pincode: String,
    #[serde(default, alias = "startDate")]
    start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "endDate")]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    title: Option<String>,
}

impl TryFrom<ElectionWire> for ElectionRef {
    type Error = String;

    fn try_from(wire: ElectionWire) -> Result<Self, Self::Error> {
        Ok(Self {
            off_chain_id: wire.id.resolve("election")?,
            on_chain_id: wire.on_chain_id,
            pincode: wire.pincode,
            start_time: wire.start_time,
            end_time: wire.end_time,
            title: wire.title,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateWire {
    #[serde(flatten)]
    id: WireId,
    #[serde(default, alias = "blockchainId")]
    on_chain_id: Option<ChainId>,
    name: String,
    #[serde(default, alias = "partyName")]
    party: String,
    #[serde(default, alias = "photoUrl")]
    photo: Option<String>,
    #[serde(default)]
    manifesto: Option<String>,
    #[serde(default)]
    constituency: Option<String>,
    #[serde(default)]
    vote_count: Option<u64>,
}

impl TryFrom<CandidateWire> for CandidateRecord {
    type Error = String;

    fn try_from(wire: CandidateWire) -> Result<Self, Self::Error> {
        Ok(Self {
            off_chain_id: wire.id.resolve("candidate")?,
            on_chain_id: wire.on_chain_id,
            name: wire.name,
            party: wire.party,
            photo: wire.photo,
            manifesto: wire.manifesto,
            constituency: wire.constituency,
            backend_vote_count: wire.vote_count,
            // Ledger data is joined by the roster merger, never read from the backend.
            chain_data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_source_from_answers() {
        assert_eq!(VoteSource::from_answers(true, true), VoteSource::Both);
        assert_eq!(VoteSource::from_answers(true, false), VoteSource::Chain);
        assert_eq!(VoteSource::from_answers(false, true), VoteSource::Backend);
        assert_eq!(VoteSource::from_answers(false, false), VoteSource::None);
    }

    #[test]
    fn test_merge_is_logical_or() {
        let cases = [
            (Some(true), Some(true), true, VoteSource::Both),
            (Some(true), Some(false), true, VoteSource::Both),
            (Some(false), Some(true), true, VoteSource::Both),
            (Some(false), Some(false), false, VoteSource::Both),
            (None, Some(true), true, VoteSource::Backend),
            (Some(true), None, true, VoteSource::Chain),
            (None, None, false, VoteSource::None),
        ];
        for (chain, backend, has_voted, source) in cases {
            let status = VoteStatus::merge(chain, backend);
            assert_eq!(status.has_voted, has_voted, "chain={chain:?} backend={backend:?}");
            assert_eq!(status.source, source, "chain={chain:?} backend={backend:?}");
        }
    }

    #[test]
    fn test_unknown_is_not_a_verified_negative() {
        let status = VoteStatus::unknown();
        assert!(!status.has_voted);
        assert!(status.is_unknown());
        assert_eq!(status, VoteStatus::merge(None, None));
    }

    #[test]
    fn test_backend_only_confirmation() {
        let status = VoteStatus::merge(Some(false), Some(true));
        assert!(status.confirmed_by_backend_only());
        assert!(!status.confirmed_by_chain());
    }

    #[test]
    fn test_decision_chain_unavailable_is_warning_only() {
        let decision = EligibilityDecision::from_reasons(vec![EligibilityReason::ChainUnavailable]);
        assert!(decision.allowed);

        let decision =
            EligibilityDecision::from_reasons(vec![EligibilityReason::ChainUnavailable, EligibilityReason::NotApproved]);
        assert!(!decision.allowed);
    }

    #[test]
    fn test_tally_never_defaults_to_zero() {
        let mut candidate = CandidateRecord::new("c1", "Asha");
        assert_eq!(candidate.tally(), Tally::Unknown);
        assert_eq!(candidate.vote_count(), None);

        candidate.backend_vote_count = Some(4);
        assert_eq!(candidate.tally(), Tally::BackendOnly(4));

        candidate.chain_data = Some(ChainCandidate {
            id: 1,
            vote_count: 7,
            ..ChainCandidate::default()
        });
        assert_eq!(candidate.tally(), Tally::Chain(7));
    }

    #[test]
    fn test_bind_wallet_keeps_backend_address() {
        let mut voter = VoterIdentity::new("v1", "560001", ApprovalStatus::Approved).with_wallet("0xabc");
        assert!(!voter.bind_wallet("0xdef"));
        assert_eq!(voter.wallet_address.as_deref(), Some("0xabc"));

        let mut voter = VoterIdentity::new("v2", "560001", ApprovalStatus::Approved);
        assert!(voter.bind_wallet("0xdef"));
        assert_eq!(voter.wallet_address.as_deref(), Some("0xdef"));
    }

    #[test]
    fn test_election_window() {
        let now = Utc::now();
        let election = ElectionRef::new("e1").with_window(Some(now - Duration::hours(1)), Some(now + Duration::hours(1)));
        assert!(election.is_open_at(now));
        assert!(!election.is_open_at(now + Duration::hours(2)));
        assert!(!election.is_open_at(now - Duration::hours(2)));
        assert!(ElectionRef::new("e2").is_open_at(now));
    }

    #[test]
    fn test_backend_candidate_payload_decodes() {
        let json = r#"{
            "_id": "665f1c",
            "name": "Asha Rao",
            "partyName": "Civic Front",
            "photoUrl": "/uploads/asha.png",
            "blockchainId": 3,
            "voteCount": 12
        }"#;
        let candidate: CandidateRecord = serde_json::from_str(json).expect("decode candidate");
        assert_eq!(candidate.off_chain_id, "665f1c");
        assert_eq!(candidate.on_chain_id, Some(3));
        assert_eq!(candidate.party, "Civic Front");
        assert_eq!(candidate.backend_vote_count, Some(12));
        assert!(candidate.chain_data.is_none());
    }

    #[test]
    fn test_backend_voter_payload_decodes() {
        let json = r#"{"id": "v9", "walletAddress": "0x01", "pincode": "110001", "status": "approved"}"#;
        let voter: VoterIdentity = serde_json::from_str(json).expect("decode voter");
        assert!(voter.is_approved());
        assert_eq!(voter.wallet_address.as_deref(), Some("0x01"));
    }

    #[test]
    fn test_backend_payload_with_virtual_id_decodes() {
        let json = r#"{"_id":"665f1c","name":"Asha Rao","blockchainId":3,"voteCount":0,"id":"665f1c"}"#;
        let candidate: CandidateRecord = serde_json::from_str(json).expect("decode candidate");
        assert_eq!(candidate.off_chain_id, "665f1c");
        assert_eq!(candidate.on_chain_id, Some(3));

        let json = r#"{"candidates":[{"_id":"a","name":"X","id":"a"},{"id":"b","name":"Y"}]}"#;
        let envelope: serde_json::Value = serde_json::from_str(json).expect("decode envelope");
        let candidates: Vec<CandidateRecord> =
            serde_json::from_value(envelope["candidates"].clone()).expect("decode candidates");
        let ids: Vec<_> = candidates.iter().map(|c| c.off_chain_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let election: ElectionRef =
            serde_json::from_str(r#"{"_id":"e1","id":"e1","blockchainId":2}"#).expect("decode election");
        assert_eq!(election.off_chain_id, "e1");
        assert_eq!(election.on_chain_id, Some(2));

        let voter: VoterIdentity =
            serde_json::from_str(r#"{"_id":"v1","id":"v1","status":"pending"}"#).expect("decode voter");
        assert_eq!(voter.off_chain_id, "v1");
    }

    #[test]
    fn test_payload_without_any_id_is_rejected() {
        assert!(serde_json::from_str::<CandidateRecord>(r#"{"name":"X"}"#).is_err());
    }

    #[test]
    fn test_candidate_round_trips_through_own_output() {
        let candidate = CandidateRecord::new("c7", "Meera Iyer").with_on_chain_id(4);
        let json = serde_json::to_string(&candidate).expect("encode candidate");
        let decoded: CandidateRecord = serde_json::from_str(&json).expect("decode candidate");
        assert_eq!(decoded, candidate);
    }
}
