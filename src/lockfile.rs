//! `lazy-lock.json` discovery and parsing.
//!
//! The lockfile only records plugin names, so the owning GitHub account is
//! recovered from `"owner/repo"` strings found in the user's Lua config, with
//! a name-based guess as the fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::model::Dependency;

pub const LOCKFILE_NAME: &str = "lazy-lock.json";

static REPO_SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']([a-zA-Z0-9_\-\.]+/[a-zA-Z0-9_\-\.]+)["']"#).expect("valid repo spec regex")
});

#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("lockfile not found at {}", path.display())]
    Missing { path: PathBuf },
    #[error("lazy-lock.json not found; tried: {}", display_paths(tried))]
    NotFound { tried: Vec<PathBuf> },
    #[error("reading lockfile: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing lockfile JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Deserialize)]
struct LockEntry {
    branch: String,
    commit: String,
}

/// Default Neovim config directory: `$XDG_CONFIG_HOME/nvim` or `~/.config/nvim`.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|base| base.join("nvim"))
}

/// Locates the lockfile.
///
/// An explicit path must exist. Otherwise `$XDG_CONFIG_HOME/nvim` and then
/// `~/.config/nvim` are tried.
///
/// # Errors
///
/// [`LockfileError::Missing`] for a bad explicit path,
/// [`LockfileError::NotFound`] listing every candidate otherwise.
pub fn find_lockfile(explicit: Option<&Path>) -> Result<PathBuf, LockfileError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(LockfileError::Missing {
            path: path.to_path_buf(),
        });
    }

    let mut candidates = Vec::new();
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(xdg).join("nvim").join(LOCKFILE_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config").join("nvim").join(LOCKFILE_NAME));
    }

    if let Some(found) = candidates.iter().find(|c| c.exists()) {
        return Ok(found.clone());
    }
    Err(LockfileError::NotFound { tried: candidates })
}

/// Parses a lockfile into dependencies sorted by name.
///
/// `config_dir` is scanned for `"owner/repo"` specs; pass `None` to rely on
/// name-based inference only.
pub fn parse_lockfile(
    path: &Path,
    config_dir: Option<&Path>,
) -> Result<Vec<Dependency>, LockfileError> {
    let data = fs::read(path)?;
    // BTreeMap keeps the processing order stable across runs.
    let entries: BTreeMap<String, LockEntry> = serde_json::from_slice(&data)?;

    let overrides = config_dir.map(scan_config).unwrap_or_default();
    info!(
        path = %path.display(),
        plugins = entries.len(),
        overrides = overrides.len(),
        "Lockfile parsed"
    );

    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let (owner, repo) = infer_repository(&name, &overrides);
            Dependency {
                name,
                owner,
                repo,
                branch: entry.branch,
                commit: entry.commit,
            }
        })
        .collect())
}

/// Collects `repo → "owner/repo"` from quoted specs in `*.lua` files under
/// `root`. `.git` directories and unreadable files are skipped.
pub fn scan_config(root: &Path) -> HashMap<String, String> {
    let mut overrides = HashMap::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "lua"));

    for entry in walker {
        let Ok(content) = fs::read_to_string(entry.path()) else {
            debug!(path = %entry.path().display(), "skipping unreadable config file");
            continue;
        };
        for caps in REPO_SPEC_RE.captures_iter(&content) {
            let spec = &caps[1];
            if let Some((_, repo)) = spec.split_once('/') {
                overrides.insert(repo.to_string(), spec.to_string());
            }
        }
    }

    overrides
}

/// Owner and repository for a plugin name: a config override wins, otherwise
/// the owner is guessed as the name minus a `.nvim`/`.lua` suffix.
pub fn infer_repository(name: &str, overrides: &HashMap<String, String>) -> (String, String) {
    if let Some((owner, repo)) = overrides.get(name).and_then(|spec| spec.split_once('/')) {
        return (owner.to_string(), repo.to_string());
    }

    let owner = name.strip_suffix(".nvim").unwrap_or(name);
    let owner = owner.strip_suffix(".lua").unwrap_or(owner);
    (owner.to_string(), name.to_string())
}
