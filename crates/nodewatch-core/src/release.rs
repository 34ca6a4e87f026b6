//! Latest-release lookup for the node software, used to set `needs_update`.

use std::future::Future;

use crate::error::WatchError;

/// Resolves the newest published release tag for a release channel.
///
/// This is an external, unauthenticated lookup (e.g. a public release feed),
/// performed once at bootstrap.
pub trait ReleaseSource: Send + Sync {
    fn latest_release(&self, channel: &str)
        -> impl Future<Output = Result<String, WatchError>> + Send;
}

/// Pick the first tag containing `channel`. Feeds list newest first.
pub fn select_release<'a, I>(tags: I, channel: &str) -> Result<String, WatchError>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter()
        .find(|tag| tag.contains(channel))
        .map(str::to_string)
        .ok_or_else(|| WatchError::ReleaseChannelNotFound(channel.to_string()))
}

/// The node needs an update when its version is not the latest tag.
pub fn needs_update(current_version: &str, latest_tag: &str) -> bool {
    current_version != latest_tag
}
