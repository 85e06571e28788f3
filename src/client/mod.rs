//! Remote data access: the GitHub client and its response caches.

pub mod cache;
pub mod github;

pub use cache::{cache_file_name, DiskCache, MemoryCache};
pub use github::GitHubClient;
