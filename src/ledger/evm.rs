//! EVM ledger adapter for the VoteSure contract.
//!
//! Reads go through `eth_call`; writes are signed locally by a
//! [`LocalWallet`] and broadcast through JSON-RPC. Authorization of the session
//! is the act of unlocking the configured signing key and confirming the RPC
//! endpoint is on the expected chain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use ethers::contract::ContractError;
use ethers::contract::abigen;
use ethers::core::types::Address;
use ethers::core::types::H256;
use ethers::core::types::U64;
use ethers::core::types::U256;
use ethers::middleware::SignerMiddleware;
use ethers::providers::Http;
use ethers::providers::Middleware;
use ethers::providers::PendingTransaction;
use ethers::providers::Provider;
use ethers::signers::LocalWallet;
use ethers::signers::Signer;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Confirmation;
use super::Ledger;
use super::WalletProvider;
use super::WalletSession;
use crate::config::LedgerConfig;
use crate::error::ConnectError;
use crate::error::LedgerError;
use crate::types::ChainCandidate;
use crate::types::ChainId;
use crate::types::ChainVoterDetails;
use crate::types::TxRef;

abigen!(
    VoteSureContract,
    r#"[
        struct Candidate { uint256 candidateId; string name; string party; string slogan; string pincode; string constituency; uint256 voteCount; }
        struct Voter { string voterId; string pincode; bool isApproved; uint256 registrationTime; }
        function getCandidateCount(uint256 _electionId) external view returns (uint256)
        function getCandidate(uint256 _electionId, uint256 _candidateId) external view returns (Candidate)
        function hasVoterVoted(address _voter, uint256 _electionId) external view returns (bool)
        function isVoterEligibleForElection(address _voter, uint256 _electionId) external view returns (bool)
        function getVoterDetails(address _voter) external view returns (Voter)
        function castVote(uint256 _electionId, uint256 _candidateId) external
    ]"#
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// [`Ledger`] over an EVM JSON-RPC endpoint.
#[derive(Clone)]
pub struct EvmLedger {
    contract: VoteSureContract<SignerClient>,
    client: Arc<SignerClient>,
}

impl EvmLedger {
    pub fn new(client: Arc<SignerClient>, contract_address: Address) -> Self {
        let contract = VoteSureContract::new(contract_address, client.clone());
        Self { contract, client }
    }
}

fn contract_error<M: Middleware>(err: ContractError<M>) -> LedgerError {
    if err.is_revert() {
        let message = err.decode_revert::<String>().unwrap_or_else(|| err.to_string());
        LedgerError::reverted(message)
    } else {
        LedgerError::unreachable(err.to_string())
    }
}

fn parse_address(voter: &str) -> Result<Address, LedgerError> {
    voter.parse::<Address>().map_err(|_| LedgerError::InvalidAddress {
        address: voter.to_string(),
    })
}

fn to_u64(value: U256, field: &str) -> Result<u64, LedgerError> {
    if value > U256::from(u64::MAX) {
        return Err(LedgerError::OutOfRange {
            field: field.to_string(),
        });
    }
    Ok(value.as_u64())
}

#[async_trait]
impl Ledger for EvmLedger {
    async fn candidate_count(&self, election_id: ChainId) -> Result<u64, LedgerError> {
        let count = self.contract.get_candidate_count(U256::from(election_id)).call().await.map_err(contract_error)?;
        to_u64(count, "candidateCount")
    }

    async fn candidate(&self, election_id: ChainId, candidate_id: ChainId) -> Result<ChainCandidate, LedgerError> {
        let (raw_candidate_id, raw_name, raw_party, raw_slogan, raw_pincode, raw_constituency, raw_vote_count) = self
            .contract
            .get_candidate(U256::from(election_id), U256::from(candidate_id))
            .call()
            .await
            .map_err(contract_error)?;
        Ok(ChainCandidate {
            id: to_u64(raw_candidate_id, "candidateId")?,
            name: raw_name,
            party: raw_party,
            slogan: raw_slogan,
            pincode: raw_pincode,
            constituency: raw_constituency,
            vote_count: to_u64(raw_vote_count, "voteCount")?,
        })
    }

    async fn has_voter_voted(&self, voter: &str, election_id: ChainId) -> Result<bool, LedgerError> {
        let address = parse_address(voter)?;
        self.contract.has_voter_voted(address, U256::from(election_id)).call().await.map_err(contract_error)
    }

    async fn is_voter_eligible_for_election(&self, voter: &str, election_id: ChainId) -> Result<bool, LedgerError> {
        let address = parse_address(voter)?;
        self.contract
            .is_voter_eligible_for_election(address, U256::from(election_id))
            .call()
            .await
            .map_err(contract_error)
    }

    async fn voter_details(&self, voter: &str) -> Result<ChainVoterDetails, LedgerError> {
        let address = parse_address(voter)?;
        let (raw_voter_id, raw_pincode, raw_is_approved, raw_registration_time) =
            self.contract.get_voter_details(address).call().await.map_err(contract_error)?;
        let registered_at = to_u64(raw_registration_time, "registrationTime")?;
        let registration_time = match registered_at {
            0 => None,
            secs => i64::try_from(secs).ok().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        };
        Ok(ChainVoterDetails {
            voter_id: raw_voter_id,
            pincode: raw_pincode,
            is_approved: raw_is_approved,
            registration_time,
        })
    }

    async fn submit_vote(&self, election_id: ChainId, candidate_id: ChainId) -> Result<TxRef, LedgerError> {
        let call = self.contract.cast_vote(U256::from(election_id), U256::from(candidate_id));
        let pending = call.send().await.map_err(contract_error)?;
        let tx_ref = TxRef::new(format!("{:#x}", pending.tx_hash()));
        debug!(%tx_ref, election_id, candidate_id, "vote transaction broadcast");
        Ok(tx_ref)
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation, LedgerError> {
        let hash = tx_ref.as_str().parse::<H256>().map_err(|err| LedgerError::unreachable(format!("bad tx hash {tx_ref}: {err}")))?;
        let receipt = PendingTransaction::new(hash, self.client.provider())
            .await
            .map_err(|err| LedgerError::unreachable(err.to_string()))?
            .ok_or_else(|| LedgerError::Dropped { tx_ref: tx_ref.clone() })?;

        if receipt.status == Some(U64::zero()) {
            return Err(LedgerError::reverted(format!("transaction {tx_ref} reverted")));
        }

        Ok(Confirmation {
            tx_ref: tx_ref.clone(),
            block_number: receipt.block_number.map(|block| block.as_u64()),
        })
    }
}

/// [`WalletProvider`] backed by a locally held signing key.
///
/// A missing key is reported as [`ConnectError::ProviderAbsent`]: there is no
/// wallet to ask.
pub struct EvmWallet {
    rpc_url: String,
    contract_address: Address,
    signing_key: Option<String>,
}

impl EvmWallet {
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let contract_address = config.contract_address.parse::<Address>().map_err(|_| LedgerError::InvalidAddress {
            address: config.contract_address.clone(),
        })?;
        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            contract_address,
            signing_key: config.private_key.clone(),
        })
    }
}

#[async_trait]
impl WalletProvider for EvmWallet {
    async fn authorize(&self) -> Result<WalletSession, ConnectError> {
        let Some(key) = self.signing_key.as_deref() else {
            return Err(ConnectError::ProviderAbsent);
        };

        let provider = Provider::<Http>::try_from(self.rpc_url.as_str()).map_err(|err| ConnectError::Transport {
            reason: format!("rpc provider error: {err}"),
        })?;
        let chain_id = provider.get_chainid().await.map_err(|err| ConnectError::Transport {
            reason: format!("chain id error: {err}"),
        })?;
        let chain_id = chain_id.low_u64();

        let wallet = match key.trim().parse::<LocalWallet>() {
            Ok(wallet) => wallet.with_chain_id(chain_id),
            Err(_) => {
                warn!("configured signing key is not a valid secp256k1 key");
                return Err(ConnectError::ProviderAbsent);
            }
        };
        let account = format!("{:#x}", wallet.address());
        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        info!(%account, chain_id, rpc_url = %self.rpc_url, "evm wallet unlocked");
        Ok(WalletSession {
            account,
            chain_id,
            ledger: Arc::new(EvmLedger::new(client, self.contract_address)),
        })
    }
}
