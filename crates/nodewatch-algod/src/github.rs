//! Release lookup against the public GitHub releases feed.

use nodewatch::release::select_release;
use nodewatch::{ReleaseSource, WatchError};
use serde::Deserialize;

const RELEASES_URL: &str = "https://api.github.com/repos/algorand/go-algorand/releases";
const USER_AGENT: &str = concat!("nodewatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Unauthenticated `go-algorand` releases feed. Newest release first.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    http: reqwest::Client,
    url: String,
}

impl GithubReleases {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, RELEASES_URL)
    }

    /// Point at a mirror or test server serving the same JSON.
    pub fn with_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

fn release_error(err: reqwest::Error) -> WatchError {
    WatchError::Release(err.to_string())
}

impl ReleaseSource for GithubReleases {
    async fn latest_release(&self, channel: &str) -> Result<String, WatchError> {
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(release_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::Release(format!("HTTP {}", status.as_u16())));
        }

        let releases: Vec<Release> = response.json().await.map_err(release_error)?;
        select_release(releases.iter().map(|r| r.tag_name.as_str()), channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_feed_decodes() {
        let json = r#"[
            {"tag_name":"v3.27.0-beta","name":"Beta","prerelease":true},
            {"tag_name":"v3.26.0-stable","name":"Stable","prerelease":false}
        ]"#;
        let releases: Vec<Release> = serde_json::from_str(json).unwrap();
        let latest = select_release(releases.iter().map(|r| r.tag_name.as_str()), "stable");
        assert_eq!(latest.unwrap(), "v3.26.0-stable");
    }
}
