//! End-to-end reconciliation scenarios over the in-memory stores.

mod support;

use std::sync::Arc;
use std::time::Duration;

use support::Fixture;
use support::VOTER_ADDR;
use support::election;
use support::settle;
use support::voter;
use tokio_util::sync::CancellationToken;
use votesure::CandidateRecord;
use votesure::CastError;
use votesure::ChainBinder;
use votesure::ChainRosterState;
use votesure::ConnectError;
use votesure::EligibilityReason;
use votesure::ElectionRef;
use votesure::IdentityError;
use votesure::Reconciler;
use votesure::Tally;
use votesure::VoteSource;
use votesure::config::ReconcileConfig;
use votesure::identity::resolve_election_id;
use votesure::inmemory::InMemoryBackend;
use votesure::inmemory::InMemoryLedger;
use votesure::inmemory::StaticWallet;

// ============================================================================
// Vote status
// ============================================================================

#[tokio::test]
async fn test_vote_status_or_grid() {
    for (chain, backend, expected) in [(true, true, true), (true, false, true), (false, true, true), (false, false, false)] {
        let f = Fixture::new();
        let handle = f.handle().await;
        f.ledger.set_voted(VOTER_ADDR, 1, chain);
        f.backend.set_voted("v1", "1", backend);

        let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
        assert_eq!(status.has_voted, expected, "chain={chain} backend={backend}");
        assert_eq!(status.source, VoteSource::Both);
    }
}

#[tokio::test]
async fn test_vote_status_both_unavailable_is_unknown() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.set_unreachable(true);
    f.backend.set_unavailable(true);

    let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
    assert!(!status.has_voted);
    assert_eq!(status.source, VoteSource::None);
    assert!(status.is_unknown());
}

#[tokio::test]
async fn test_unreachable_source_never_masks_positive() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.set_voted(VOTER_ADDR, 1, true);
    f.backend.set_unavailable(true);

    let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
    assert!(status.has_voted);
    assert_eq!(status.source, VoteSource::Chain);
    assert!(status.confirmed_by_chain());

    f.ledger.set_unreachable(true);
    f.backend.set_unavailable(false);
    f.backend.set_voted("v1", "1", true);
    let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
    assert!(status.has_voted);
    assert_eq!(status.source, VoteSource::Backend);
    assert!(status.confirmed_by_backend_only());
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_election_identity_coercion() {
    assert_eq!(
        resolve_election_id(&ElectionRef::new("e1")),
        Err(IdentityError::UnresolvableIdentity {
            kind: "election",
            off_chain_id: "e1".to_string(),
        })
    );
    assert_eq!(resolve_election_id(&ElectionRef::new("1")), Ok(1));
}

// ============================================================================
// Roster
// ============================================================================

#[tokio::test]
async fn test_roster_with_failing_index() {
    let f = Fixture::with_config(ReconcileConfig {
        roster_fetch_concurrency: 1,
        ..ReconcileConfig::default()
    });
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 10);
    f.ledger.add_candidate(1, "Vikram Singh", 20);
    f.ledger.add_candidate(1, "Meera Iyer", 30);
    f.ledger.fail_candidate(1, 2);
    f.backend.set_candidates(
        "1",
        vec![
            CandidateRecord::new("1", "Asha Rao"),
            CandidateRecord::new("2", "Vikram Singh"),
            CandidateRecord::new("3", "Meera Iyer"),
        ],
    );

    let roster = f.reconciler.election_roster(Some(&handle), &election()).await.unwrap();
    let tallies: Vec<Tally> = roster.candidates.iter().map(|c| c.tally()).collect();
    assert_eq!(tallies, vec![Tally::Chain(10), Tally::Unknown, Tally::Chain(30)]);
    assert_eq!(roster.chain, ChainRosterState::Partial { skipped: vec![2] });
}

#[tokio::test]
async fn test_roster_keeps_unmatched_candidates_in_backend_order() {
    let f = Fixture::with_config(ReconcileConfig {
        roster_fetch_concurrency: 8,
        ..ReconcileConfig::default()
    });
    let handle = f.handle().await;
    for (name, votes) in [("Asha Rao", 5), ("Vikram Singh", 6), ("Meera Iyer", 7)] {
        f.ledger.add_candidate(1, name, votes);
    }
    let backend = vec![
        CandidateRecord::new("665f3", "Meera Iyer"),
        CandidateRecord::new("665f9", "Write-in"),
        CandidateRecord::new("665f1", "Someone").with_on_chain_id(1),
    ];
    f.backend.set_candidates("1", backend.clone());

    let roster = f.reconciler.election_roster(Some(&handle), &election()).await.unwrap();
    assert_eq!(roster.chain, ChainRosterState::Complete);
    assert_eq!(roster.candidates.len(), backend.len());
    let ids: Vec<_> = roster.candidates.iter().map(|c| c.off_chain_id.as_str()).collect();
    assert_eq!(ids, vec!["665f3", "665f9", "665f1"]);
    assert_eq!(roster.candidates[0].vote_count(), Some(7));
    assert_eq!(roster.candidates[1].vote_count(), None);
    assert_eq!(roster.candidates[2].vote_count(), Some(5));
    assert_eq!(roster.summary().total_chain_votes, 12);
}

#[tokio::test]
async fn test_roster_without_session_shows_no_tallies() {
    let f = Fixture::new();
    f.backend.set_candidates("1", vec![CandidateRecord::new("1", "Asha Rao")]);

    let roster = f.reconciler.election_roster(None, &election()).await.unwrap();
    assert_eq!(roster.candidates.len(), 1);
    assert_eq!(roster.candidates[0].tally(), Tally::Unknown);
    assert!(matches!(roster.chain, ChainRosterState::Unavailable { .. }));
}

// ============================================================================
// Eligibility
// ============================================================================

#[tokio::test]
async fn test_eligibility_allowed_with_no_reasons() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.set_eligible(VOTER_ADDR, 1, true);

    let decision = f.reconciler.can_cast_vote(Some(&handle), &voter(), &election()).await;
    assert!(decision.allowed);
    assert!(decision.reasons.is_empty());
}

#[tokio::test]
async fn test_eligibility_backend_only_prior_vote() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.set_eligible(VOTER_ADDR, 1, true);
    f.backend.set_voted("v1", "1", true);

    let decision = f.reconciler.can_cast_vote(Some(&handle), &voter(), &election()).await;
    assert!(!decision.allowed);
    assert_eq!(decision.reasons, vec![EligibilityReason::AlreadyVoted]);
}

#[tokio::test]
async fn test_eligibility_is_recomputed_each_call() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.set_eligible(VOTER_ADDR, 1, true);
    assert!(f.reconciler.can_cast_vote(Some(&handle), &voter(), &election()).await.allowed);

    f.ledger.set_voted(VOTER_ADDR, 1, true);
    let decision = f.reconciler.can_cast_vote(Some(&handle), &voter(), &election()).await;
    assert!(decision.has_reason(EligibilityReason::AlreadyVoted));
}

// ============================================================================
// Casting
// ============================================================================

#[tokio::test]
async fn test_cast_confirms_and_records_in_backend() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 0);
    let candidate = CandidateRecord::new("665f1", "Asha Rao").with_on_chain_id(1);

    let receipt = f
        .reconciler
        .cast_vote(&handle, &voter(), &election(), &candidate, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(receipt.election_id, 1);
    assert_eq!(receipt.candidate_id, 1);

    settle().await;
    let recorded = f.backend.recorded_votes();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].tx_ref, receipt.tx_ref);
    assert_eq!(recorded[0].candidate_id, "665f1");

    let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
    assert!(status.confirmed_by_chain());
    assert_eq!(status.backend_voted, Some(true));
    assert_eq!(status.detail.and_then(|d| d.tx_hash), Some(receipt.tx_ref.to_string()));
}

#[tokio::test]
async fn test_cast_rejection_is_classified() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 0);
    let candidate = CandidateRecord::new("1", "Asha Rao");

    for (message, expected) in [
        ("Already voted in this election", CastError::AlreadyVoted),
        ("Voter not approved", CastError::NotApproved),
        ("Voter not eligible for this election", CastError::NotEligible),
        ("Election has ended", CastError::Unknown("Election has ended".to_string())),
    ] {
        f.ledger.reject_votes_with(Some(message));
        let err = f
            .reconciler
            .cast_vote(&handle, &voter(), &election(), &candidate, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, expected);
    }

    settle().await;
    assert!(f.backend.recorded_votes().is_empty());
}

#[tokio::test]
async fn test_second_cast_is_rejected_by_ledger() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 0);
    let candidate = CandidateRecord::new("1", "Asha Rao");
    let cancel = CancellationToken::new();

    f.reconciler.cast_vote(&handle, &voter(), &election(), &candidate, &cancel).await.unwrap();
    let err = f.reconciler.cast_vote(&handle, &voter(), &election(), &candidate, &cancel).await.unwrap_err();
    assert_eq!(err, CastError::AlreadyVoted);
}

#[tokio::test]
async fn test_cast_cancelled_mid_confirmation_records_nothing() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 0);
    f.ledger.hold_confirmations(true);
    let candidate = CandidateRecord::new("1", "Asha Rao");
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };
    let err = f.reconciler.cast_vote(&handle, &voter(), &election(), &candidate, &cancel).await.unwrap_err();
    canceller.await.unwrap();

    match err {
        CastError::Cancelled { tx_ref } => assert!(tx_ref.is_some(), "submitted tx should be reported"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(f.ledger.submitted_votes(), vec![(1, 1)]);

    settle().await;
    assert!(f.backend.recorded_votes().is_empty());
    let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
    assert!(!status.has_voted);
}

#[tokio::test]
async fn test_cast_cancelled_before_submission() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 0);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = f
        .reconciler
        .cast_vote(&handle, &voter(), &election(), &CandidateRecord::new("1", "Asha Rao"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, CastError::Cancelled { tx_ref: None });
    assert!(f.ledger.submitted_votes().is_empty());
}

#[tokio::test]
async fn test_cast_for_candidate_linked_only_by_name() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Asha Rao", 41);
    f.ledger.add_candidate(1, "Vikram Singh", 37);
    f.ledger.add_candidate(1, "Meera Iyer", 12);
    f.backend.set_candidates("1", vec![CandidateRecord::new("665f1c03", "meera iyer")]);

    let roster = f.reconciler.election_roster(Some(&handle), &election()).await.unwrap();
    assert_eq!(roster.candidates[0].tally(), Tally::Chain(12));

    let candidate = f.reconciler.backend().candidate(&election(), "665f1c03").await.unwrap();
    assert!(candidate.chain_data.is_none());
    let receipt = f
        .reconciler
        .cast_vote(&handle, &voter(), &election(), &candidate, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(receipt.candidate_id, 3);
    assert_eq!(f.ledger.submitted_votes(), vec![(1, 3)]);

    let roster = f.reconciler.election_roster(Some(&handle), &election()).await.unwrap();
    assert_eq!(roster.candidates[0].tally(), Tally::Chain(13));

    settle().await;
    assert_eq!(f.backend.recorded_votes()[0].candidate_id, "665f1c03");
}

#[tokio::test]
async fn test_cast_by_name_with_unreachable_ledger_roster() {
    let f = Fixture::new();
    let handle = f.handle().await;
    f.ledger.add_candidate(1, "Meera Iyer", 12);
    f.ledger.set_unreachable(true);

    let err = f
        .reconciler
        .cast_vote(
            &handle,
            &voter(),
            &election(),
            &CandidateRecord::new("665f1c03", "Meera Iyer"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CastError::Identity(IdentityError::UnresolvableIdentity { kind: "candidate", .. })));
    assert!(f.ledger.submitted_votes().is_empty());
}

#[tokio::test]
async fn test_cast_with_unresolvable_candidate() {
    let f = Fixture::new();
    let handle = f.handle().await;

    let err = f
        .reconciler
        .cast_vote(
            &handle,
            &voter(),
            &election(),
            &CandidateRecord::new("665f1", "Asha Rao"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CastError::Identity(IdentityError::UnresolvableIdentity { kind: "candidate", .. })));
    assert!(f.ledger.submitted_votes().is_empty());
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test]
async fn test_rejected_wallet_degrades_reads_to_backend() {
    let ledger = InMemoryLedger::new();
    let backend = InMemoryBackend::new();
    backend.set_voted("v1", "1", true);
    let wallet = StaticWallet::failing(ConnectError::UserRejected, Arc::new(ledger));
    let reconciler =
        Reconciler::new(ChainBinder::new(Arc::new(wallet), None), Arc::new(backend), &ReconcileConfig::default());

    assert_eq!(reconciler.connect().await.unwrap_err(), ConnectError::UserRejected);
    let handle = reconciler.try_connect().await;
    assert!(handle.is_none());
    assert!(reconciler.binder().current().is_none());

    let status = reconciler.vote_status(handle.as_ref(), &voter(), &election()).await;
    assert!(status.has_voted);
    assert_eq!(status.source, VoteSource::Backend);
}

#[tokio::test]
async fn test_connect_once_per_session() {
    let f = Fixture::new();
    let first = f.handle().await;
    let second = f.handle().await;
    assert!(first.same_session(&second));
    assert_eq!(f.wallet.requests(), 1);
}

#[tokio::test]
async fn test_voter_profile_binds_session_account() {
    let f = Fixture::new();
    f.backend.set_profile(votesure::VoterIdentity::new("v2", "560001", votesure::ApprovalStatus::Approved));
    let handle = f.handle().await;

    let voter = f.reconciler.voter_profile(Some(&handle)).await.unwrap();
    assert_eq!(voter.wallet_address.as_deref(), Some(VOTER_ADDR));
}
