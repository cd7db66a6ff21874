//! Reconciler facade.
//!
//! Owns one [`ChainBinder`] and one backend and wires the components to them.
//! Every ledger-touching operation still takes the [`ClientHandle`]
//! explicitly; the facade never reaches for a session on its own.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::backend::Backend;
use crate::backend::HttpBackend;
use crate::cast::VoteCaster;
use crate::config::ReconcileConfig;
use crate::config::ReconcilerConfig;
use crate::error::BackendError;
use crate::error::CastError;
use crate::error::ConnectError;
use crate::error::SetupError;
use crate::eligibility::EligibilityGate;
use crate::ledger::ChainBinder;
use crate::ledger::ClientHandle;
use crate::roster::MergedRoster;
use crate::roster::RosterMerger;
use crate::status::VoteStatusResolver;
use crate::types::CandidateRecord;
use crate::types::EligibilityDecision;
use crate::types::ElectionRef;
use crate::types::Receipt;
use crate::types::VoteStatus;
use crate::types::VoterIdentity;

pub struct Reconciler {
    binder: ChainBinder,
    backend: Arc<dyn Backend>,
    status: VoteStatusResolver,
    roster: RosterMerger,
    gate: EligibilityGate,
    caster: VoteCaster,
}

impl Reconciler {
    pub fn new(binder: ChainBinder, backend: Arc<dyn Backend>, config: &ReconcileConfig) -> Self {
        let status = VoteStatusResolver::new(backend.clone(), config.enrichment_timeout());
        let roster = RosterMerger::new(config.roster_fetch_concurrency, config.max_roster_size);
        Self {
            binder,
            gate: EligibilityGate::new(status.clone()),
            caster: VoteCaster::new(backend.clone(), roster.clone()),
            roster,
            status,
            backend,
        }
    }

    /// HTTP backend plus, with the `evm` feature, an EVM wallet.
    pub fn from_config(config: &ReconcilerConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let backend = Arc::new(HttpBackend::from_config(&config.backend)?);

        #[cfg(feature = "evm")]
        let binder = {
            let wallet = crate::ledger::evm::EvmWallet::from_config(&config.ledger)?;
            ChainBinder::new(Arc::new(wallet), config.ledger.expected_chain_id)
        };
        #[cfg(not(feature = "evm"))]
        let binder = ChainBinder::without_provider();

        Ok(Self::new(binder, backend, &config.reconcile))
    }

    pub fn binder(&self) -> &ChainBinder {
        &self.binder
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn connect(&self) -> Result<ClientHandle, ConnectError> {
        self.binder.connect().await
    }

    /// Connect, degrading to `None` so read paths can continue backend-only.
    pub async fn try_connect(&self) -> Option<ClientHandle> {
        match self.binder.connect().await {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "continuing without a ledger session");
                None
            }
        }
    }

    /// Backend profile with the session account cached when the backend has no
    /// wallet address on record.
    pub async fn voter_profile(&self, handle: Option<&ClientHandle>) -> Result<VoterIdentity, BackendError> {
        let mut voter = self.backend.voter_profile().await?;
        if let Some(handle) = handle
            && voter.bind_wallet(handle.account())
        {
            info!(voter = %voter.off_chain_id, account = handle.account(), "bound session account to voter");
        }
        Ok(voter)
    }

    pub async fn vote_status(
        &self,
        handle: Option<&ClientHandle>,
        voter: &VoterIdentity,
        election: &ElectionRef,
    ) -> VoteStatus {
        self.status.get_vote_status(handle, voter, election).await
    }

    pub async fn merge_roster(
        &self,
        handle: Option<&ClientHandle>,
        backend_candidates: Vec<CandidateRecord>,
        election: &ElectionRef,
    ) -> MergedRoster {
        self.roster.merge_roster(handle, backend_candidates, election).await
    }

    /// Fetch the backend roster and merge it. Only the backend fetch can fail.
    pub async fn election_roster(
        &self,
        handle: Option<&ClientHandle>,
        election: &ElectionRef,
    ) -> Result<MergedRoster, BackendError> {
        let candidates = self.backend.candidates(election).await?;
        Ok(self.roster.merge_roster(handle, candidates, election).await)
    }

    pub async fn can_cast_vote(
        &self,
        handle: Option<&ClientHandle>,
        voter: &VoterIdentity,
        election: &ElectionRef,
    ) -> EligibilityDecision {
        self.gate.can_cast_vote(handle, voter, election, Utc::now()).await
    }

    pub async fn cast_vote(
        &self,
        handle: &ClientHandle,
        voter: &VoterIdentity,
        election: &ElectionRef,
        candidate: &CandidateRecord,
        cancel: &CancellationToken,
    ) -> Result<Receipt, CastError> {
        self.caster.cast_vote(handle, voter, election, candidate, cancel).await
    }
}
