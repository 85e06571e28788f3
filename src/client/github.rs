//! GitHub REST API client.
//!
//! All three reads go through [`GitHubClient::get_json`], which consults the
//! response cache, issues the request, maps the HTTP status onto
//! [`ClientError`] and stores successful bodies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::cache::DiskCache;
use crate::config::{ClientConfig, API_VERSION};
use crate::model::{CommitRange, CommitRecord, ReleaseRecord, RepoInfo};
use crate::traits::{ClientError, RemoteSource, ResponseCache};

const SNIPPET_LIMIT: usize = 200;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    full_name: String,
    default_branch: String,
    html_url: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubCompare {
    total_commits: u64,
    #[serde(default)]
    commits: Vec<GitHubCommit>,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    commit: GitHubCommitDetail,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    name: Option<String>,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: String,
}

impl From<GitHubRepo> for RepoInfo {
    fn from(repo: GitHubRepo) -> Self {
        Self {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
            description: repo.description,
            html_url: repo.html_url,
        }
    }
}

impl From<GitHubCompare> for CommitRange {
    fn from(compare: GitHubCompare) -> Self {
        Self {
            ahead_by: compare.total_commits,
            commits: compare
                .commits
                .into_iter()
                .map(|c| CommitRecord {
                    sha: c.sha,
                    message: c.commit.message,
                    html_url: c.html_url,
                })
                .collect(),
            html_url: compare.html_url,
        }
    }
}

impl From<GitHubRelease> for ReleaseRecord {
    fn from(release: GitHubRelease) -> Self {
        Self {
            tag: release.tag_name,
            name: release.name.unwrap_or_default(),
            body: release.body.unwrap_or_default(),
            draft: release.draft,
            prerelease: release.prerelease,
            published_at: release.published_at,
            html_url: release.html_url,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Cached, optionally authenticated GitHub client.
///
/// Safe to share between tasks; the cache serializes its own writes.
pub struct GitHubClient {
    http: Client,
    config: ClientConfig,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl GitHubClient {
    /// Builds a client backed by a [`DiskCache`] in `config.cache_dir`
    /// (no cache at all when `config.no_cache` is set).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built
    /// (for instance a token containing invalid header characters).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = &config.token {
            if let Ok(mut value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            } else {
                warn!("ignoring GitHub token with invalid characters");
            }
        }

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let cache: Option<Arc<dyn ResponseCache>> = if config.no_cache {
            None
        } else {
            Some(Arc::new(DiskCache::new(
                config.cache_dir.clone(),
                config.cache_ttl,
            )))
        };

        Ok(Self {
            http,
            config,
            cache,
        })
    }

    /// Replaces the response cache, unless caching is disabled.
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        if !self.config.no_cache {
            self.cache = Some(cache);
        }
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.config.api_base, owner, repo)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.read_fresh(url) {
                match serde_json::from_slice(&body) {
                    Ok(value) => {
                        debug!("cache hit");
                        return Ok(value);
                    }
                    // A torn or foreign file is just a miss.
                    Err(e) => debug!(error = %e, "discarding unreadable cache entry"),
                }
            }
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        check_status(status, url, &body)?;

        if let Some(cache) = &self.cache {
            cache.write_best_effort(url, &body);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                secs: self.config.timeout.as_secs(),
            }
        } else {
            ClientError::Transport(err)
        }
    }
}

/// Maps a response status onto the error taxonomy. 2xx passes.
fn check_status(status: StatusCode, url: &str, body: &[u8]) -> Result<(), ClientError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(ClientError::NotFound {
            url: url.to_string(),
        }),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(ClientError::RateLimited),
        s => Err(ClientError::UnexpectedStatus {
            status: s.as_u16(),
            snippet: snippet(body, SNIPPET_LIMIT),
        }),
    }
}

/// At most `limit` bytes of `body`, cut on a character boundary.
fn snippet(body: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[async_trait]
impl RemoteSource for GitHubClient {
    async fn repository_info(&self, owner: &str, repo: &str) -> Result<RepoInfo, ClientError> {
        let repo: GitHubRepo = self.get_json(&self.repo_url(owner, repo)).await?;
        Ok(repo.into())
    }

    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CommitRange, ClientError> {
        let url = format!("{}/compare/{}...{}", self.repo_url(owner, repo), base, head);
        let compare: GitHubCompare = self.get_json(&url).await?;
        Ok(compare.into())
    }

    async fn list_releases(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ReleaseRecord>, ClientError> {
        let url = format!(
            "{}/releases?per_page={}",
            self.repo_url(owner, repo),
            self.config.releases_per_page
        );
        let releases: Vec<GitHubRelease> = self.get_json(&url).await?;
        Ok(releases.into_iter().map(ReleaseRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::MemoryCache;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMPARE_BODY: &str = r#"{
        "status": "ahead",
        "ahead_by": 2,
        "total_commits": 2,
        "html_url": "https://github.com/folke/lazy.nvim/compare/abc...main",
        "commits": [
            {
                "sha": "1111",
                "html_url": "https://github.com/folke/lazy.nvim/commit/1111",
                "commit": { "message": "feat!: drop nvim 0.8\n\nlong body", "author": { "name": "folke" } }
            },
            {
                "sha": "2222",
                "html_url": "https://github.com/folke/lazy.nvim/commit/2222",
                "commit": { "message": "fix: typo" }
            }
        ]
    }"#;

    fn test_config(server: &MockServer) -> ClientConfig {
        ClientConfig::default()
            .with_api_base(server.uri())
            .with_cache(false)
    }

    #[tokio::test]
    async fn test_compare_commits_parses_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/folke/lazy.nvim/compare/abc...main"))
            .and(header("Accept", "application/vnd.github+json"))
            .and(header("X-GitHub-Api-Version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_string(COMPARE_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubClient::new(test_config(&server)).unwrap();
        let range = client
            .compare_commits("folke", "lazy.nvim", "abc", "main")
            .await
            .unwrap();

        assert_eq!(range.ahead_by, 2);
        assert_eq!(range.commits.len(), 2);
        assert_eq!(range.commits[0].message, "feat!: drop nvim 0.8\n\nlong body");
        assert!(range.html_url.ends_with("compare/abc...main"));
    }

    #[tokio::test]
    async fn test_sends_user_agent_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/folke/lazy.nvim"))
            .and(header("Authorization", "Bearer ghp_secret"))
            .and(header_exists("User-Agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"full_name":"folke/lazy.nvim","default_branch":"main","html_url":"https://github.com/folke/lazy.nvim","description":null}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server).with_token(Some("ghp_secret".to_string()));
        let client = GitHubClient::new(config).unwrap();
        let info = client.repository_info("folke", "lazy.nvim").await.unwrap();

        assert_eq!(info.default_branch, "main");
        assert!(info.description.is_none());
    }

    #[tokio::test]
    async fn test_list_releases_requests_one_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/folke/lazy.nvim/releases"))
            .and(query_param("per_page", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"tag_name":"v11.0.0","name":null,"body":"notes","draft":false,"prerelease":false,
                     "published_at":"2024-05-01T10:00:00Z","html_url":"https://github.com/r/1"},
                    {"tag_name":"v12.0.0","name":"Next","body":null,"draft":true,"prerelease":false,
                     "published_at":null,"html_url":"https://github.com/r/2"}]"#,
            ))
            .mount(&server)
            .await;

        let client = GitHubClient::new(test_config(&server)).unwrap();
        let releases = client.list_releases("folke", "lazy.nvim").await.unwrap();

        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag, "v11.0.0");
        assert_eq!(releases[0].name, "");
        assert!(releases[0].published_at.is_some());
        assert!(releases[1].draft);
        assert_eq!(releases[1].body, "");
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/a/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/broken"))
            .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(1000)))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GitHubClient::new(test_config(&server)).unwrap();

        let err = client.repository_info("a", "missing").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));

        let err = client.repository_info("a", "forbidden").await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimited));
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        let err = client.repository_info("a", "throttled").await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimited));

        match client.repository_info("a", "broken").await.unwrap_err() {
            ClientError::UnexpectedStatus { status, snippet } => {
                assert_eq!(status, 502);
                assert_eq!(snippet.len(), 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = client.repository_info("a", "garbled").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/slow/repo"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = test_config(&server).with_timeout(Duration::from_millis(100));
        let client = GitHubClient::new(config).unwrap();
        let err = client.repository_info("slow", "repo").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/folke/lazy.nvim/compare/abc...main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(COMPARE_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::default()
            .with_api_base(server.uri())
            .with_cache_dir(dir.path());
        let client = GitHubClient::new(config).unwrap();

        let first = client
            .compare_commits("folke", "lazy.nvim", "abc", "main")
            .await
            .unwrap();
        let second = client
            .compare_commits("folke", "lazy.nvim", "abc", "main")
            .await
            .unwrap();
        assert_eq!(first.ahead_by, second.ahead_by);

        let url = format!("{}/repos/folke/lazy.nvim/compare/abc...main", server.uri());
        let stored = std::fs::read(dir.path().join(crate::client::cache_file_name(&url))).unwrap();
        assert_eq!(stored, COMPARE_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_stale_cache_triggers_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/folke/lazy.nvim/compare/abc...main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(COMPARE_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/repos/folke/lazy.nvim/compare/abc...main", server.uri());
        let cache_path = dir.path().join(crate::client::cache_file_name(&url));
        std::fs::write(&cache_path, COMPARE_BODY).unwrap();
        File::options()
            .write(true)
            .open(&cache_path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(2 * 3600))
            .unwrap();

        let config = ClientConfig::default()
            .with_api_base(server.uri())
            .with_cache_dir(dir.path());
        let client = GitHubClient::new(config).unwrap();

        // Stale entry: one network call, which refreshes the file.
        client
            .compare_commits("folke", "lazy.nvim", "abc", "main")
            .await
            .unwrap();
        // Fresh again: served from disk.
        client
            .compare_commits("folke", "lazy.nvim", "abc", "main")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/folke/lazy.nvim/compare/abc...main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(COMPARE_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/repos/folke/lazy.nvim/compare/abc...main", server.uri());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        cache.write_best_effort(&url, b"{\"total_comm");

        let config = ClientConfig::default().with_api_base(server.uri());
        let client = GitHubClient::new(config).unwrap().with_cache(cache.clone());

        let range = client
            .compare_commits("folke", "lazy.nvim", "abc", "main")
            .await
            .unwrap();
        assert_eq!(range.ahead_by, 2);
        assert_eq!(cache.read_fresh(&url).as_deref(), Some(COMPARE_BODY.as_bytes()));
    }

    #[tokio::test]
    async fn test_no_cache_never_reads_or_writes() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/folke/lazy.nvim"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"full_name":"folke/lazy.nvim","default_branch":"main","html_url":"u","description":"d"}"#,
            ))
            .expect(2)
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        let client = GitHubClient::new(test_config(&server))
            .unwrap()
            .with_cache(cache.clone());

        client.repository_info("folke", "lazy.nvim").await.unwrap();
        client.repository_info("folke", "lazy.nvim").await.unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let body = "é".repeat(150); // 300 bytes
        let cut = snippet(body.as_bytes(), 200);
        assert_eq!(cut.len(), 200);
        assert!(cut.chars().all(|c| c == 'é'));

        assert_eq!(snippet(b"short", 200), "short");
    }
}
