//! Textual risk cues in commit messages and release notes.

use once_cell::sync::Lazy;
use regex::Regex;

static BREAKING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(breaking|BREAKING CHANGE|incompatible|removed|migration required)\b")
        .expect("valid breaking regex")
});

// Conventional-commit bang header, e.g. `feat!: drop old API`.
static BANG_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(feat|fix|refactor|chore)!:").expect("valid bang header regex")
});

static DEPRECATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(deprecated|deprecation|will be removed|no longer supported)\b")
        .expect("valid deprecation regex")
});

static SEMVER_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)").expect("valid semver regex"));

/// Which cues a piece of text carries. Both may be set at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub breaking: bool,
    pub deprecation: bool,
}

impl Signals {
    pub fn scan(text: &str) -> Self {
        Self {
            breaking: BREAKING_RE.is_match(text) || BANG_HEADER_RE.is_match(text),
            deprecation: DEPRECATION_RE.is_match(text),
        }
    }
}

/// Major number of a `v?MAJOR.MINOR.PATCH...` tag.
pub fn parse_major(tag: &str) -> Option<u64> {
    SEMVER_PREFIX_RE
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}
