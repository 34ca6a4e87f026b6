//! Latest-catchpoint lookup over HTTP.

use nodewatch::catchup::catchpoint_source;
use nodewatch::{ApiError, CatchpointSource, WatchError};

/// Fetches the public catchpoint feed for networks that publish one.
#[derive(Debug, Clone)]
pub struct HttpCatchpoints {
    http: reqwest::Client,
}

impl HttpCatchpoints {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Feeds serve a single line; drop the line breaks.
fn clean_catchpoint(body: &str) -> String {
    body.replace(['\n', '\r'], "")
}

impl CatchpointSource for HttpCatchpoints {
    async fn latest_catchpoint(&self, network: &str) -> Result<String, WatchError> {
        let url = catchpoint_source(network)
            .ok_or_else(|| WatchError::UnknownNetwork(network.to_string()))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(clean_catchpoint(&body))
    }
}
