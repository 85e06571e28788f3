//! Remote client configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const RELEASES_PER_PAGE: u32 = 30;

/// Settings for [`GitHubClient`](crate::client::GitHubClient).
///
/// # Example
///
/// ```ignore
/// let config = ClientConfig::default()
///     .with_token(std::env::var("GITHUB_TOKEN").ok())
///     .with_cache(false);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer credential. `None` means unauthenticated requests.
    pub token: Option<String>,

    /// Disables both cache reads and cache writes.
    pub no_cache: bool,

    /// Directory holding one file per cached request URL.
    pub cache_dir: PathBuf,

    /// Age after which a cached payload is ignored.
    pub cache_ttl: Duration,

    /// Per-request timeout.
    pub timeout: Duration,

    /// API root, without trailing slash.
    pub api_base: String,

    pub user_agent: String,

    pub releases_per_page: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            no_cache: false,
            cache_dir: default_cache_dir(),
            cache_ttl: CACHE_TTL,
            timeout: REQUEST_TIMEOUT,
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: concat!("plugin-drift/", env!("CARGO_PKG_VERSION")).to_string(),
            releases_per_page: RELEASES_PER_PAGE,
        }
    }
}

impl ClientConfig {
    /// Sets the bearer credential. Blank tokens count as absent.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Enables or disables the response cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.no_cache = !enabled;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

/// `<user cache dir>/plugin-drift`, falling back to `~/.cache` and finally
/// the system temp directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("plugin-drift")
}
