//! Seeded in-memory stores for `--demo`.
//!
//! One open election with four backend candidates: one linked by explicit
//! ledger id, one by a numeric off-chain id, one only by name, and one write-in
//! the ledger has never heard of.

use std::sync::Arc;

use chrono::Duration;
use chrono::Utc;
use votesure::ApprovalStatus;
use votesure::CandidateRecord;
use votesure::ChainBinder;
use votesure::ElectionRef;
use votesure::Reconciler;
use votesure::VoterIdentity;
use votesure::config::ReconcileConfig;
use votesure::inmemory::InMemoryBackend;
use votesure::inmemory::InMemoryLedger;
use votesure::inmemory::StaticWallet;

const DEMO_ACCOUNT: &str = "0x5c7e0b1a2f7d6e44a3b9c0d1e2f3a4b5c6d7e8f9";
const DEMO_CHAIN_ID: u64 = 1337;

pub fn reconciler() -> Reconciler {
    let now = Utc::now();
    let election = ElectionRef::new("665e00a1")
        .with_on_chain_id(1)
        .with_pincode("560001")
        .with_window(Some(now - Duration::hours(2)), Some(now + Duration::days(1)));
    let election = ElectionRef {
        title: Some("Ward 12 Municipal Election".to_string()),
        ..election
    };

    let ledger = InMemoryLedger::new();
    ledger.add_candidate(1, "Asha Rao", 41);
    ledger.add_candidate(1, "Vikram Singh", 37);
    ledger.add_candidate(1, "Meera Iyer", 12);
    ledger.register_voter(DEMO_ACCOUNT, "KA-560001-0042", "560001", true);
    ledger.set_eligible(DEMO_ACCOUNT, 1, true);
    ledger.set_signer(DEMO_ACCOUNT);

    let backend = InMemoryBackend::new();
    backend.set_profile(VoterIdentity::new("665e0f42", "560001", ApprovalStatus::Approved).with_wallet(DEMO_ACCOUNT));
    backend.set_active_election(Some(election.clone()));
    backend.set_candidates(
        &election.off_chain_id,
        vec![
            CandidateRecord::new("665f1c01", "Asha Rao").with_on_chain_id(1).with_party("Civic Front"),
            CandidateRecord::new("2", "Vikram Singh").with_party("People's Alliance"),
            CandidateRecord::new("665f1c03", "meera iyer").with_party("Green Ward"),
            CandidateRecord {
                backend_vote_count: Some(3),
                ..CandidateRecord::new("665f1c04", "Write-in").with_party("Independent")
            },
        ],
    );

    let wallet = StaticWallet::new(DEMO_ACCOUNT, DEMO_CHAIN_ID, Arc::new(ledger));
    let binder = ChainBinder::new(Arc::new(wallet), Some(DEMO_CHAIN_ID));
    Reconciler::new(binder, Arc::new(backend), &ReconcileConfig::default())
}
