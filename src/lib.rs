//! Dual-source vote reconciliation.
//!
//! Reconciles an append-only voting ledger with an off-chain backend that
//! holds voter, election and candidate metadata. The ledger is authoritative
//! for cast votes and tallies; the backend is authoritative for display
//! metadata and approval state. Every merged result carries provenance so a
//! partial answer is never mistaken for a verified one.
//!
//! # Key Components
//!
//! - [`ChainBinder`]: connect once per session, hand out explicit [`ClientHandle`]s
//! - [`identity`]: map off-chain string ids to on-chain integer ids
//! - [`VoteStatusResolver`]: OR-merge of both stores' "has voted" answers
//! - [`RosterMerger`]: backend candidates joined with ledger tallies
//! - [`EligibilityGate`]: allow/deny verdict with reasons
//! - [`VoteCaster`]: cancellable ledger write with rejection classification
//! - [`Reconciler`]: all of the above wired to one binder and one backend
//!
//! # Example
//!
//! ```rust,ignore
//! use votesure::{Reconciler, ReconcilerConfig};
//!
//! let reconciler = Reconciler::from_config(&ReconcilerConfig::load()?)?;
//! let handle = reconciler.try_connect().await;
//! let voter = reconciler.voter_profile(handle.as_ref()).await?;
//! let election = reconciler.backend().active_election().await?.expect("open election");
//! let status = reconciler.vote_status(handle.as_ref(), &voter, &election).await;
//! println!("voted: {} (source: {})", status.has_voted, status.source);
//! ```
//!
//! # Feature Flags
//!
//! - `evm` (default): [`ledger::evm`] adapter for the VoteSure contract over JSON-RPC

pub mod backend;
pub mod cast;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod error;
pub mod identity;
pub mod inmemory;
pub mod ledger;
pub mod reconciler;
pub mod roster;
pub mod status;
pub mod types;

pub use backend::Backend;
pub use backend::HttpBackend;
pub use cast::VoteCaster;
pub use cast::classify_rejection;
pub use config::ConfigError;
pub use config::ReconcilerConfig;
pub use eligibility::EligibilityGate;
pub use error::BackendError;
pub use error::CastError;
pub use error::ConnectError;
pub use error::IdentityError;
pub use error::LedgerError;
pub use error::SetupError;
pub use ledger::ChainBinder;
pub use ledger::ClientHandle;
pub use ledger::Ledger;
pub use ledger::WalletProvider;
pub use reconciler::Reconciler;
pub use roster::ChainRosterState;
pub use roster::MergedRoster;
pub use roster::RosterMerger;
pub use roster::RosterSummary;
pub use status::VoteStatusResolver;
pub use types::ApprovalStatus;
pub use types::CandidateRecord;
pub use types::ChainCandidate;
pub use types::EligibilityDecision;
pub use types::EligibilityReason;
pub use types::ElectionRef;
pub use types::Receipt;
pub use types::Tally;
pub use types::TxRef;
pub use types::VoteSource;
pub use types::VoteStatus;
pub use types::VoterIdentity;
