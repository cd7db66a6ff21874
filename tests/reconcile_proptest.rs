//! Property-based tests for the dual-source merge and roster invariants.

mod support;

use proptest::prelude::*;
use support::Fixture;
use support::VOTER_ADDR;
use support::election;
use support::voter;
use votesure::CandidateRecord;
use votesure::ChainCandidate;
use votesure::VoteSource;
use votesure::VoteStatus;
use votesure::roster::merge_candidates;

fn arbitrary_answer() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![Just(None), Just(Some(false)), Just(Some(true))]
}

fn arbitrary_backend_candidate() -> impl Strategy<Value = CandidateRecord> {
    ("[0-9a-f]{1,6}", "[A-Za-z]{0,8}", proptest::option::of(1u64..12)).prop_map(|(id, name, on_chain)| {
        let candidate = CandidateRecord::new(id, name);
        match on_chain {
            Some(chain_id) => candidate.with_on_chain_id(chain_id),
            None => candidate,
        }
    })
}

fn arbitrary_chain_roster() -> impl Strategy<Value = Vec<ChainCandidate>> {
    prop::collection::vec(("[A-Za-z]{0,8}", 0u64..1000), 0..10).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, vote_count))| ChainCandidate {
                id: i as u64 + 1,
                name,
                vote_count,
                ..ChainCandidate::default()
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn test_merge_is_or_of_answering_sources(chain in arbitrary_answer(), backend in arbitrary_answer()) {
        let status = VoteStatus::merge(chain, backend);
        prop_assert_eq!(status.has_voted, chain == Some(true) || backend == Some(true));
        prop_assert_eq!(status.source.includes_chain(), chain.is_some());
        prop_assert_eq!(status.source.includes_backend(), backend.is_some());
        prop_assert_eq!(status.source == VoteSource::None, chain.is_none() && backend.is_none());
    }

    #[test]
    fn test_roster_merge_preserves_length_and_order(
        backend in prop::collection::vec(arbitrary_backend_candidate(), 0..16),
        chain in arbitrary_chain_roster(),
    ) {
        let merged = merge_candidates(backend.clone(), &chain);
        prop_assert_eq!(merged.len(), backend.len());
        for (merged, original) in merged.iter().zip(&backend) {
            prop_assert_eq!(&merged.off_chain_id, &original.off_chain_id);
            prop_assert_eq!(&merged.name, &original.name);
            prop_assert_eq!(merged.on_chain_id, original.on_chain_id);
            if let Some(explicit) = original.on_chain_id
                && chain.iter().any(|c| c.id == explicit)
            {
                prop_assert_eq!(merged.chain_data.as_ref().map(|c| c.id), Some(explicit));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn test_vote_status_is_monotone(
        steps in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()), 1..12)
    ) {
        // Property: while a reachable source reports a vote, the merged status
        // reports it too, whatever the other source does.
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let f = Fixture::new();
            let handle = f.handle().await;
            for (chain_voted, backend_voted, chain_up, backend_up) in steps {
                f.ledger.set_voted(VOTER_ADDR, 1, chain_voted);
                f.ledger.set_unreachable(!chain_up);
                f.backend.set_voted("v1", "1", backend_voted);
                f.backend.set_unavailable(!backend_up);

                let status = f.reconciler.vote_status(Some(&handle), &voter(), &election()).await;
                let witnessed = (chain_up && chain_voted) || (backend_up && backend_voted);
                prop_assert_eq!(status.has_voted, witnessed);
                prop_assert_eq!(status.source.includes_chain(), chain_up);
                prop_assert_eq!(status.source.includes_backend(), backend_up);
            }
            Ok(())
        })?;
    }
}
