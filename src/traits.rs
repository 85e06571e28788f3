use crate::model::{CommitRange, ReleaseRecord, RepoInfo};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("not found: {url}")]
    NotFound { url: String },
    #[error("rate limited (set GITHUB_TOKEN for higher limits)")]
    RateLimited,
    #[error("HTTP {status}: {snippet}")]
    UnexpectedStatus { status: u16, snippet: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Read access to an upstream code host.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Basic repository metadata (default branch, description, link).
    async fn repository_info(&self, owner: &str, repo: &str) -> Result<RepoInfo, ClientError>;

    /// Compares `base` (the pinned commit) with `head` (the tracked branch).
    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CommitRange, ClientError>;

    /// One page of releases, in whatever order the host returns them.
    async fn list_releases(&self, owner: &str, repo: &str)
        -> Result<Vec<ReleaseRecord>, ClientError>;
}

/// Storage for raw response bodies keyed by request URL.
pub trait ResponseCache: Send + Sync {
    /// Returns the payload for `key` if one was written within the freshness window.
    fn read_fresh(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `body` under `key`. Failures are swallowed.
    fn write_best_effort(&self, key: &str, body: &[u8]);
}
