//! Command handlers.
//!
//! Each handler connects to the ledger if it can, falls back to a
//! backend-only answer if it cannot, and prints the result.

use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use votesure::CastError;
use votesure::ClientHandle;
use votesure::ElectionRef;
use votesure::Reconciler;
use votesure::VoterIdentity;

use crate::cli::CastArgs;
use crate::cli::ElectionArgs;
use crate::output::CastOutput;
use crate::output::EligibilityOutput;
use crate::output::RosterOutput;
use crate::output::StatusOutput;
use crate::output::VerifyOutput;
use crate::output::print_output;

/// The requested election, or the backend's active one.
async fn select_election(reconciler: &Reconciler, args: &ElectionArgs) -> Result<ElectionRef> {
    let backend = reconciler.backend();
    match &args.election {
        Some(id) => {
            let elections = backend.elections().await.context("failed to list elections")?;
            elections
                .into_iter()
                .find(|election| &election.off_chain_id == id)
                .ok_or_else(|| anyhow::anyhow!("unknown election: {id}"))
        }
        None => backend
            .active_election()
            .await
            .context("failed to fetch active election")?
            .ok_or_else(|| anyhow::anyhow!("no active election; pass --election")),
    }
}

struct Session {
    handle: Option<ClientHandle>,
    voter: VoterIdentity,
    election: ElectionRef,
}

async fn open_session(reconciler: &Reconciler, args: &ElectionArgs) -> Result<Session> {
    let handle = reconciler.try_connect().await;
    let voter = reconciler.voter_profile(handle.as_ref()).await.context("failed to fetch voter profile")?;
    let election = select_election(reconciler, args).await?;
    Ok(Session {
        handle,
        voter,
        election,
    })
}

pub async fn status(reconciler: &Reconciler, args: ElectionArgs, json: bool) -> Result<()> {
    let session = open_session(reconciler, &args).await?;
    let status = reconciler.vote_status(session.handle.as_ref(), &session.voter, &session.election).await;
    print_output(
        &StatusOutput {
            voter: session.voter,
            election: session.election,
            status,
        },
        json,
    );
    Ok(())
}

pub async fn verify(reconciler: &Reconciler, args: ElectionArgs, json: bool) -> Result<()> {
    let session = open_session(reconciler, &args).await?;
    let status = reconciler.vote_status(session.handle.as_ref(), &session.voter, &session.election).await;
    let unknown = status.is_unknown();
    print_output(
        &VerifyOutput(StatusOutput {
            voter: session.voter,
            election: session.election,
            status,
        }),
        json,
    );
    if unknown {
        anyhow::bail!("neither the ledger nor the backend could be reached");
    }
    Ok(())
}

pub async fn roster(reconciler: &Reconciler, args: ElectionArgs, json: bool) -> Result<()> {
    let handle = reconciler.try_connect().await;
    let election = select_election(reconciler, &args).await?;
    let roster = reconciler
        .election_roster(handle.as_ref(), &election)
        .await
        .context("failed to fetch candidates")?;
    print_output(&RosterOutput { election, roster }, json);
    Ok(())
}

pub async fn eligibility(reconciler: &Reconciler, args: ElectionArgs, json: bool) -> Result<()> {
    let session = open_session(reconciler, &args).await?;
    let decision = reconciler.can_cast_vote(session.handle.as_ref(), &session.voter, &session.election).await;
    print_output(
        &EligibilityOutput {
            voter: session.voter,
            election: session.election,
            decision,
        },
        json,
    );
    Ok(())
}

pub async fn cast(reconciler: &Reconciler, args: CastArgs, json: bool) -> Result<()> {
    let handle = reconciler.connect().await.context("a ledger session is required to cast a vote")?;
    let voter = reconciler.voter_profile(Some(&handle)).await.context("failed to fetch voter profile")?;
    let election = select_election(reconciler, &args.election).await?;
    let candidate = reconciler
        .backend()
        .candidate(&election, &args.candidate)
        .await
        .with_context(|| format!("failed to fetch candidate {}", args.candidate))?;

    let decision = reconciler.can_cast_vote(Some(&handle), &voter, &election).await;
    if !decision.allowed {
        let reasons: Vec<String> = decision.reasons.iter().map(ToString::to_string).collect();
        if !args.force {
            anyhow::bail!("vote not allowed: {} (use --force to let the ledger decide)", reasons.join(", "));
        }
        warn!(reasons = %reasons.join(","), "submitting despite eligibility denial");
    }

    let cancel = CancellationToken::new();
    let watchdog = spawn_cancellation(cancel.clone(), args.timeout_secs.map(Duration::from_secs));
    let result = reconciler.cast_vote(&handle, &voter, &election, &candidate, &cancel).await;
    watchdog.abort();

    match result {
        Ok(receipt) => {
            print_output(
                &CastOutput {
                    candidate: candidate.off_chain_id,
                    receipt,
                },
                json,
            );
            // Give the detached backend record a chance to go out before exit.
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(())
        }
        Err(CastError::Cancelled { tx_ref: Some(tx_ref) }) => {
            anyhow::bail!("stopped waiting for confirmation; transaction {tx_ref} may still be included")
        }
        Err(err) => Err(err.into()),
    }
}

/// Cancel on Ctrl-C or after `timeout`.
fn spawn_cancellation(cancel: CancellationToken, timeout: Option<Duration>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("interrupted; cancelling vote cast"),
            _ = deadline => warn!("confirmation timeout reached; cancelling vote cast"),
        }
        cancel.cancel();
    })
}
