//! reqwest implementation of [`NodeApi`] against algod's v2 REST API.

use nodewatch::{
    ApiError, BlockHeader, NodeApi, NodeStatus, OnChainAccount, ParticipationKey, VersionInfo,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::AlgodConfig;
use crate::AlgodError;

const TOKEN_HEADER: &str = "X-Algo-API-Token";

#[derive(Debug, Deserialize)]
struct BlockResponse {
    block: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct CatchupResponse {
    #[serde(rename = "catchup-message")]
    catchup_message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Algod REST client. Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct AlgodClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl std::fmt::Debug for AlgodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgodClient")
            .field("base", &self.base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AlgodClient {
    pub fn new(config: &AlgodConfig) -> Result<Self, AlgodError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Use a preconfigured `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: &AlgodConfig) -> Self {
        Self {
            http,
            base: config.endpoint.as_str().trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base, path));
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(ApiError::Status {
            code: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    async fn text(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        self.send(builder)
            .await?
            .text()
            .await
            .map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl NodeApi for AlgodClient {
    async fn get_status(&self) -> Result<NodeStatus, ApiError> {
        self.get_json("/v2/status").await
    }

    async fn wait_for_block(&self, round: u64) -> Result<NodeStatus, ApiError> {
        self.get_json(&format!("/v2/status/wait-for-block-after/{round}"))
            .await
    }

    async fn get_version(&self) -> Result<VersionInfo, ApiError> {
        self.get_json("/versions").await
    }

    async fn get_metrics_text(&self) -> Result<String, ApiError> {
        self.text(self.request(Method::GET, "/metrics")).await
    }

    async fn get_block(&self, round: u64) -> Result<BlockHeader, ApiError> {
        let response: BlockResponse = self
            .get_json(&format!("/v2/blocks/{round}?format=json"))
            .await?;
        Ok(response.block)
    }

    async fn get_account(&self, address: &str) -> Result<OnChainAccount, ApiError> {
        self.get_json(&format!("/v2/accounts/{}?format=json", segment(address)))
            .await
    }

    async fn list_participation_keys(&self) -> Result<Vec<ParticipationKey>, ApiError> {
        let keys: Option<Vec<ParticipationKey>> = self.get_json("/v2/participation").await?;
        Ok(keys.unwrap_or_default())
    }

    async fn generate_participation_key(
        &self,
        address: &str,
        first_valid: u64,
        last_valid: u64,
        dilution: Option<u64>,
    ) -> Result<String, ApiError> {
        let mut query = vec![("first", first_valid), ("last", last_valid)];
        if let Some(dilution) = dilution {
            query.push(("dilution", dilution));
        }
        let builder = self
            .request(
                Method::POST,
                &format!("/v2/participation/generate/{}", segment(address)),
            )
            .query(&query);
        let body = self.text(builder).await?;
        Ok(serde_json::from_str::<String>(&body).unwrap_or(body))
    }

    async fn delete_participation_key(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/v2/participation/{}", segment(id));
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn start_catchup(
        &self,
        catchpoint: &str,
        min_rounds: Option<u64>,
    ) -> Result<String, ApiError> {
        let mut builder = self.request(
            Method::POST,
            &format!("/v2/catchup/{}", segment(catchpoint)),
        );
        if let Some(min) = min_rounds {
            builder = builder.query(&[("min", min)]);
        }
        let response: CatchupResponse = decode(self.send(builder).await?).await?;
        Ok(response.catchup_message)
    }

    async fn abort_catchup(&self, catchpoint: &str) -> Result<String, ApiError> {
        let builder = self.request(
            Method::DELETE,
            &format!("/v2/catchup/{}", segment(catchpoint)),
        );
        let response: CatchupResponse = decode(self.send(builder).await?).await?;
        Ok(response.catchup_message)
    }
}
