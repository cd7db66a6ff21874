//! Constants for vote reconciliation.
//!
//! Tiger Style: Constants are fixed and immutable, enforced at compile time.
//! Each constant has explicit bounds to prevent unbounded resource allocation.

// ============================================================================
// Ledger rejection strings
// ============================================================================
// The ledger reports write rejections as free-form revert messages. These are
// the substrings the VoteSure contract emits today; they must track the
// contract source.

/// Revert substring emitted when the voter already has a recorded vote.
pub const REJECTION_ALREADY_VOTED: &str = "Already voted";

/// Revert substring emitted when the voter registration is not approved.
pub const REJECTION_NOT_APPROVED: &str = "Voter not approved";

/// Revert substring emitted when the voter's pincode does not match the election.
pub const REJECTION_NOT_ELIGIBLE: &str = "not eligible";

// ============================================================================
// Roster bounds
// ============================================================================

/// Maximum number of chain candidates fetched for one election.
///
/// Tiger Style: The ledger reports the count; a corrupt or hostile count must
/// not turn into an unbounded fan-out.
pub const MAX_ROSTER_SIZE: u64 = 1024;

/// Default number of per-candidate ledger reads in flight.
///
/// `1` reproduces the strictly sequential fetch order.
pub const DEFAULT_ROSTER_FETCH_CONCURRENCY: usize = 4;

/// Upper bound for the per-candidate fan-out.
pub const MAX_ROSTER_FETCH_CONCURRENCY: usize = 32;

/// First on-chain candidate index. The contract numbers candidates from 1.
pub const FIRST_CHAIN_CANDIDATE_ID: u64 = 1;

// ============================================================================
// Timeouts
// ============================================================================

/// Default bound on the best-effort voter detail enrichment (milliseconds).
pub const DEFAULT_ENRICHMENT_TIMEOUT_MS: u64 = 2_000;

/// Default HTTP timeout for backend calls (milliseconds).
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 10_000;

/// Maximum accepted backend HTTP timeout (milliseconds).
pub const MAX_BACKEND_TIMEOUT_MS: u64 = 120_000;

// ============================================================================
// Backend paths
// ============================================================================

/// Voter profile for the authenticated session.
pub const VOTER_PROFILE_PATH: &str = "voter/profile";

/// Currently active election, if any.
pub const ACTIVE_ELECTION_PATH: &str = "election/status";

/// All elections known to the backend.
pub const ELECTIONS_PATH: &str = "elections";

/// Backend's own vote record lookup.
pub const VOTE_STATUS_PATH: &str = "voter/vote/status";

/// Post-cast vote recording.
pub const RECORD_VOTE_PATH: &str = "voter/record-vote-blockchain";
