use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A lockfile-pinned plugin resolved to its upstream repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub commit: String, // pinned revision, usually a 40-char sha
}

impl Dependency {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Result of comparing the pinned commit against the tip of the tracked branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitRange {
    /// Number of commits the branch is ahead of the pin. Authoritative even
    /// when `commits` is truncated or empty.
    pub ahead_by: u64,
    pub commits: Vec<CommitRecord>,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub default_branch: String,
    pub description: Option<String>,
    pub html_url: String,
}

/// Risk level of upstream divergence, ordered `Ok < Feature < Deprecation < Breaking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Feature,
    Deprecation,
    Breaking,
}

impl Severity {
    /// Merges new evidence into a verdict. Never lowers it.
    pub fn escalate(self, evidence: Severity) -> Severity {
        self.max(evidence)
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::Breaking => "🔴",
            Severity::Deprecation => "🟡",
            Severity::Feature => "🟢",
            Severity::Ok => "✅",
        }
    }

    /// Short status word used in list views.
    pub fn status_label(self) -> &'static str {
        match self {
            Severity::Breaking => "BREAKING",
            Severity::Deprecation => "deprecated",
            Severity::Feature => "updates",
            Severity::Ok => "up to date",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Breaking => "BREAKING",
            Severity::Deprecation => "DEPRECATED",
            Severity::Feature => "Feature",
            Severity::Ok => "OK",
        };
        write!(f, "{} {}", self.icon(), label)
    }
}

/// A non-draft release after classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub tag: String,
    pub name: String,
    pub body: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub severity: Severity,
}

/// Outcome of analysing one dependency.
///
/// When `error` is set the comparison failed; `severity` and `behind_by` are
/// then left at their defaults and carry no meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub dependency: Dependency,
    pub severity: Severity,
    pub behind_by: u64,
    pub releases: Vec<ReleaseReport>,
    pub breaking_messages: Vec<String>,
    pub deprecation_messages: Vec<String>,
    pub error: Option<String>,
    pub compare_url: String,
}

impl Report {
    pub fn new(dependency: Dependency) -> Self {
        Self {
            dependency,
            severity: Severity::Ok,
            behind_by: 0,
            releases: Vec::new(),
            breaking_messages: Vec::new(),
            deprecation_messages: Vec::new(),
            error: None,
            compare_url: String::new(),
        }
    }

    pub fn failed(dependency: Dependency, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(dependency)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}
