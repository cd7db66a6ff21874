//! Off-chain backend contract.
//!
//! The backend owns voter, election and candidate metadata plus its own record
//! of cast votes. Authentication is attached by whoever constructs the
//! implementation; this crate never mints or refreshes tokens.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::BackendError;
use crate::types::CandidateRecord;
use crate::types::ElectionRef;
use crate::types::TxRef;
use crate::types::VoteDetail;
use crate::types::VoterIdentity;

mod http;

pub use http::HttpBackend;

/// The backend's own answer to "has this voter voted".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendVoteStatus {
    pub has_voted: bool,
    #[serde(default, alias = "vote")]
    pub detail: Option<VoteDetail>,
}

/// Vote to record in the backend after ledger confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter_id: String,
    pub election_id: String,
    pub candidate_id: String,
    #[serde(rename = "blockchainTxHash")]
    pub tx_ref: TxRef,
}

/// Contract for the off-chain metadata store.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Profile of the voter the session token belongs to.
    async fn voter_profile(&self) -> Result<VoterIdentity, BackendError>;

    /// The election currently open for voting, if any.
    async fn active_election(&self) -> Result<Option<ElectionRef>, BackendError>;

    async fn elections(&self) -> Result<Vec<ElectionRef>, BackendError>;

    async fn vote_status(&self, voter: &VoterIdentity, election: &ElectionRef)
    -> Result<BackendVoteStatus, BackendError>;

    /// Candidates in display order.
    async fn candidates(&self, election: &ElectionRef) -> Result<Vec<CandidateRecord>, BackendError>;

    async fn candidate(&self, election: &ElectionRef, candidate_id: &str) -> Result<CandidateRecord, BackendError>;

    async fn record_vote(&self, record: &VoteRecord) -> Result<(), BackendError>;
}
