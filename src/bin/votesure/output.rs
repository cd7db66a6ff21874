//! Output formatting for CLI responses.
//!
//! Supports both human-readable and JSON output formats for
//! integration with scripts and other tools.

use std::fmt::Write as _;

use votesure::EligibilityDecision;
use votesure::ElectionRef;
use votesure::MergedRoster;
use votesure::Receipt;
use votesure::RosterSummary;
use votesure::VoteSource;
use votesure::VoteStatus;
use votesure::VoterIdentity;

/// Trait for types that can be output in multiple formats.
pub trait Outputable {
    /// Convert to JSON value for structured output.
    fn to_json(&self) -> serde_json::Value;

    /// Convert to human-readable string.
    fn to_human(&self) -> String;
}

/// Print a value in the appropriate format.
pub fn print_output<T: Outputable>(value: &T, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&value.to_json())
                .unwrap_or_else(|e| { format!("{{\"error\": \"failed to serialize: {}\"}}", e) })
        );
    } else {
        println!("{}", value.to_human());
    }
}

fn election_label(election: &ElectionRef) -> String {
    match (&election.title, election.on_chain_id) {
        (Some(title), Some(id)) => format!("{title} ({}, chain #{id})", election.off_chain_id),
        (Some(title), None) => format!("{title} ({})", election.off_chain_id),
        (None, Some(id)) => format!("{} (chain #{id})", election.off_chain_id),
        (None, None) => election.off_chain_id.clone(),
    }
}

fn provenance(source: VoteSource) -> &'static str {
    match source {
        VoteSource::Both => "ledger and backend",
        VoteSource::Chain => "ledger only (backend unreachable)",
        VoteSource::Backend => "backend only (ledger unavailable or not consulted)",
        VoteSource::None => "no source answered",
    }
}

fn answer(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "voted",
        Some(false) => "not voted",
        None => "unavailable",
    }
}

/// Vote status output.
pub struct StatusOutput {
    pub voter: VoterIdentity,
    pub election: ElectionRef,
    pub status: VoteStatus,
}

impl Outputable for StatusOutput {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "voter": self.voter.off_chain_id,
            "wallet": self.voter.wallet_address,
            "election": self.election.off_chain_id,
            "status": self.status,
        })
    }

    fn to_human(&self) -> String {
        let verdict = if self.status.is_unknown() {
            "UNKNOWN"
        } else if self.status.has_voted {
            "VOTED"
        } else {
            "NOT VOTED"
        };
        let mut out = format!(
            "Vote Status\n\
             ===========\n\
             Voter:     {}\n\
             Election:  {}\n\
             Status:    {}\n\
             Source:    {}\n\
             Ledger:    {}\n\
             Backend:   {}",
            self.voter.off_chain_id,
            election_label(&self.election),
            verdict,
            provenance(self.status.source),
            answer(self.status.chain_voted),
            answer(self.status.backend_voted),
        );
        if self.status.confirmed_by_backend_only() {
            out.push_str("\nWarning:   vote recorded by backend but not confirmed on the ledger");
        }
        out
    }
}

/// Verification output: status plus the recorded vote.
pub struct VerifyOutput(pub StatusOutput);

impl Outputable for VerifyOutput {
    fn to_json(&self) -> serde_json::Value {
        let status = &self.0.status;
        serde_json::json!({
            "voter": self.0.voter.off_chain_id,
            "election": self.0.election.off_chain_id,
            "has_voted": status.has_voted,
            "confirmed_on_ledger": status.confirmed_by_chain(),
            "source": status.source,
            "vote": status.detail,
            "ledger_voter": status.chain_voter,
        })
    }

    fn to_human(&self) -> String {
        let mut out = self.0.to_human();
        let status = &self.0.status;
        if let Some(detail) = &status.detail {
            out.push_str("\n\nRecorded Vote\n=============");
            let _ = write!(out, "\nCandidate: {}", detail.candidate_id.as_deref().unwrap_or("-"));
            let _ = write!(
                out,
                "\nCast at:   {}",
                detail.timestamp.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
            );
            let _ = write!(out, "\nTx:        {}", detail.tx_hash.as_deref().unwrap_or("-"));
        }
        if let Some(voter) = &status.chain_voter {
            out.push_str("\n\nLedger Registration\n===================");
            let _ = write!(out, "\nVoter ID:  {}", voter.voter_id);
            let _ = write!(out, "\nPincode:   {}", voter.pincode);
            let _ = write!(out, "\nApproved:  {}", voter.is_approved);
            let _ = write!(
                out,
                "\nSince:     {}",
                voter.registration_time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
            );
        }
        out
    }
}

/// Merged roster output.
pub struct RosterOutput {
    pub election: ElectionRef,
    pub roster: MergedRoster,
}

impl Outputable for RosterOutput {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "election": self.election.off_chain_id,
            "chain": self.roster.chain,
            "candidates": self.roster.candidates.iter().map(|c| serde_json::json!({
                "id": c.off_chain_id,
                "name": c.name,
                "party": c.party,
                "chain_id": c.chain_data.as_ref().map(|chain| chain.id),
                "tally": c.tally(),
            })).collect::<Vec<_>>(),
            "summary": self.roster.summary(),
        })
    }

    fn to_human(&self) -> String {
        let mut out = format!("Candidates for {}\n", election_label(&self.election));
        let _ = writeln!(out, "{:<12} {:<24} {:<20} {:>8} {}", "ID", "NAME", "PARTY", "CHAIN", "VOTES");
        for candidate in &self.roster.candidates {
            let chain_id = candidate
                .chain_data
                .as_ref()
                .map(|chain| format!("#{}", chain.id))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{:<12} {:<24} {:<20} {:>8} {}",
                candidate.off_chain_id,
                candidate.name,
                candidate.party,
                chain_id,
                candidate.tally()
            );
        }
        let summary: RosterSummary = self.roster.summary();
        let _ = write!(
            out,
            "\n{} candidates, {} matched on ledger, {} ledger votes",
            self.roster.candidates.len(),
            summary.matched,
            summary.total_chain_votes
        );
        if !summary.is_fully_verified() {
            let _ = write!(
                out,
                "\n{} candidate(s) without a ledger tally ({} backend-only)",
                summary.backend_only + summary.unknown,
                summary.backend_only
            );
        }
        out
    }
}

/// Eligibility output.
pub struct EligibilityOutput {
    pub voter: VoterIdentity,
    pub election: ElectionRef,
    pub decision: EligibilityDecision,
}

impl Outputable for EligibilityOutput {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "voter": self.voter.off_chain_id,
            "election": self.election.off_chain_id,
            "allowed": self.decision.allowed,
            "reasons": self.decision.reasons,
        })
    }

    fn to_human(&self) -> String {
        let verdict = if self.decision.allowed { "ALLOWED" } else { "DENIED" };
        let mut out = format!("{verdict}: {} in {}", self.voter.off_chain_id, election_label(&self.election));
        for reason in &self.decision.reasons {
            let marker = if reason.is_blocking() { "blocking" } else { "warning" };
            let _ = write!(out, "\n  - {reason} ({marker})");
        }
        out
    }
}

/// Cast receipt output.
pub struct CastOutput {
    pub candidate: String,
    pub receipt: Receipt,
}

impl Outputable for CastOutput {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "candidate": self.candidate,
            "receipt": self.receipt,
        })
    }

    fn to_human(&self) -> String {
        let block = self.receipt.block_number.map(|b| b.to_string()).unwrap_or_else(|| "pending".to_string());
        format!(
            "Vote confirmed\n\
             ==============\n\
             Candidate: {} (chain #{})\n\
             Election:  chain #{}\n\
             Tx:        {}\n\
             Block:     {}",
            self.candidate, self.receipt.candidate_id, self.receipt.election_id, self.receipt.tx_ref, block
        )
    }
}
