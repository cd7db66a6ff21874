//! HTTP-backed [`Backend`] client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::Backend;
use super::BackendVoteStatus;
use super::VoteRecord;
use crate::config::BackendConfig;
use crate::constants::ACTIVE_ELECTION_PATH;
use crate::constants::ELECTIONS_PATH;
use crate::constants::RECORD_VOTE_PATH;
use crate::constants::VOTE_STATUS_PATH;
use crate::constants::VOTER_PROFILE_PATH;
use crate::error::BackendError;
use crate::types::CandidateRecord;
use crate::types::ElectionRef;
use crate::types::VoterIdentity;

#[derive(Deserialize)]
struct VoterEnvelope {
    voter: VoterIdentity,
}

#[derive(Deserialize)]
struct ElectionStatusEnvelope {
    active: bool,
    #[serde(default)]
    election: Option<ElectionRef>,
}

#[derive(Deserialize)]
struct ElectionsEnvelope {
    elections: Vec<ElectionRef>,
}

#[derive(Debug, Deserialize)]
struct CandidatesEnvelope {
    candidates: Vec<CandidateRecord>,
}

#[derive(Deserialize)]
struct CandidateEnvelope {
    candidate: CandidateRecord,
}

/// JSON-over-HTTP backend client.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// Build a client targeting `base_url`.
    ///
    /// `token` is sent as a bearer token on every request when present.
    pub fn new(base_url: Url, timeout: Duration, token: Option<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::unavailable(format!("build reqwest client: {err}")))?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            token,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| BackendError::unavailable(format!("invalid backend url {}: {err}", config.base_url)))?;
        Self::new(base_url, config.request_timeout(), config.auth_token.clone())
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url.join(path).map_err(|err| BackendError::unavailable(err.to_string()))
    }

    /// `base/elections/{election}[/candidates[/{candidate}]]` with each id
    /// percent-encoded as a single segment.
    fn election_url(&self, election: &ElectionRef, tail: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.url(ELECTIONS_PATH)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::unavailable("backend url cannot be a base"))?;
            segments.push(&election.off_chain_id);
            segments.extend(tail);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T>(&self, url: Url) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "backend GET");
        let resp = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;
        Self::decode_response(resp).await
    }

    async fn decode_response<T>(resp: Response) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let status = resp.status();
        if status.is_success() {
            resp.json::<T>().await.map_err(|err| BackendError::Decode {
                reason: err.to_string(),
            })
        } else {
            let reason = resp.text().await.unwrap_or_else(|err| format!("backend response body error: {err}"));
            match status {
                StatusCode::NOT_FOUND => Err(BackendError::not_found(reason)),
                _ if status.is_client_error() => Err(BackendError::Rejected {
                    status: status.as_u16(),
                    reason,
                }),
                _ => Err(BackendError::Unavailable { reason }),
            }
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl Backend for HttpBackend {
    async fn voter_profile(&self) -> Result<VoterIdentity, BackendError> {
        let envelope: VoterEnvelope = self.get(self.url(VOTER_PROFILE_PATH)?).await?;
        Ok(envelope.voter)
    }

    async fn active_election(&self) -> Result<Option<ElectionRef>, BackendError> {
        let envelope: ElectionStatusEnvelope = self.get(self.url(ACTIVE_ELECTION_PATH)?).await?;
        Ok(envelope.election.filter(|_| envelope.active))
    }

    async fn elections(&self) -> Result<Vec<ElectionRef>, BackendError> {
        let envelope: ElectionsEnvelope = self.get(self.url(ELECTIONS_PATH)?).await?;
        Ok(envelope.elections)
    }

    async fn vote_status(
        &self,
        voter: &VoterIdentity,
        election: &ElectionRef,
    ) -> Result<BackendVoteStatus, BackendError> {
        let mut url = self.url(VOTE_STATUS_PATH)?;
        url.query_pairs_mut()
            .append_pair("voterId", &voter.off_chain_id)
            .append_pair("electionId", &election.off_chain_id);
        self.get(url).await
    }

    async fn candidates(&self, election: &ElectionRef) -> Result<Vec<CandidateRecord>, BackendError> {
        let envelope: CandidatesEnvelope = self.get(self.election_url(election, &["candidates"])?).await?;
        Ok(envelope.candidates)
    }

    async fn candidate(&self, election: &ElectionRef, candidate_id: &str) -> Result<CandidateRecord, BackendError> {
        let envelope: CandidateEnvelope = self.get(self.election_url(election, &["candidates", candidate_id])?).await?;
        Ok(envelope.candidate)
    }

    async fn record_vote(&self, record: &VoteRecord) -> Result<(), BackendError> {
        let url = self.url(RECORD_VOTE_PATH)?;
        debug!(%url, tx_ref = %record.tx_ref, "backend POST vote record");
        let resp = self
            .authorize(self.client.post(url))
            .json(record)
            .send()
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;
        Self::decode_response::<serde_json::Value>(resp).await.map(|_| ())
    }
}
