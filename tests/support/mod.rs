//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use votesure::ApprovalStatus;
use votesure::ChainBinder;
use votesure::ClientHandle;
use votesure::ElectionRef;
use votesure::Reconciler;
use votesure::VoterIdentity;
use votesure::config::ReconcileConfig;
use votesure::inmemory::InMemoryBackend;
use votesure::inmemory::InMemoryLedger;
use votesure::inmemory::StaticWallet;

pub const VOTER_ADDR: &str = "0x00000000000000000000000000000000000000aa";
pub const CHAIN_ID: u64 = 1337;

/// Reconciler over in-memory stores, plus the handles used for injection.
pub struct Fixture {
    pub ledger: InMemoryLedger,
    pub backend: InMemoryBackend,
    pub wallet: Arc<StaticWallet>,
    pub reconciler: Reconciler,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ReconcileConfig::default())
    }

    pub fn with_config(config: ReconcileConfig) -> Self {
        let ledger = InMemoryLedger::new();
        ledger.set_signer(VOTER_ADDR);
        let backend = InMemoryBackend::new();
        backend.set_profile(voter());
        let wallet = Arc::new(StaticWallet::new(VOTER_ADDR, CHAIN_ID, Arc::new(ledger.clone())));
        let binder = ChainBinder::new(wallet.clone(), Some(CHAIN_ID));
        let reconciler = Reconciler::new(binder, Arc::new(backend.clone()), &config);
        Self {
            ledger,
            backend,
            wallet,
            reconciler,
        }
    }

    pub async fn handle(&self) -> ClientHandle {
        self.reconciler.connect().await.expect("in-memory wallet connects")
    }
}

pub fn voter() -> VoterIdentity {
    VoterIdentity::new("v1", "560001", ApprovalStatus::Approved).with_wallet(VOTER_ADDR)
}

/// Election "1" with no explicit ledger id; resolves through coercion.
pub fn election() -> ElectionRef {
    ElectionRef::new("1").with_pincode("560001")
}

/// Wait for detached tasks (the post-cast backend record) to run.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
