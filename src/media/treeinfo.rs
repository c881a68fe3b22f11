//! Install tree metadata (`.treeinfo`) and repository sanity checks.
//!
//! `.treeinfo` is an INI file written by the compose tooling. The parts used
//! here are the variant list and each variant's repository path:
//!
//! ```text
//! [tree]
//! arch = x86_64
//! variants = BaseOS,AppStream
//!
//! [variant-BaseOS]
//! id = BaseOS
//! repository = BaseOS
//! ```
//!
//! Missing metadata is a normal "no" answer for the scanner, never an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{InstallError, InstallResult};

/// Metadata file names, in lookup order.
pub const TREEINFO_NAMES: &[&str] = &[".treeinfo", "treeinfo"];

/// Variant names that identify the base repository.
pub const DEFAULT_BASE_REPOS: &[&str] = &["BaseOS", "Everything", "rawhide"];

type Section = BTreeMap<String, String>;

/// Parsed install tree metadata rooted at a mounted media directory.
#[derive(Debug, Clone, Default)]
pub struct InstallTreeMetadata {
    root: PathBuf,
    sections: BTreeMap<String, Section>,
    repos: Vec<RepoMetadata>,
}

impl InstallTreeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load metadata from the tree at `root`. Returns `false` when no
    /// metadata file could be read.
    pub fn load_file(&mut self, root: &Path) -> bool {
        self.clear();
        self.root = root.to_path_buf();

        for name in TREEINFO_NAMES {
            let path = root.join(name);
            match fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(path = %path.display(), "loaded install tree metadata");
                    self.load_text(&text);
                    return true;
                }
                Err(e) => debug!(path = %path.display(), error = %e, "no install tree metadata"),
            }
        }
        false
    }

    /// Load metadata from `.treeinfo` text. Repository paths resolve against
    /// the root given to [`load_file`](Self::load_file), if any.
    pub fn load_text(&mut self, text: &str) {
        self.sections = parse_ini(text);
        self.repos = self.read_variants();
    }

    fn clear(&mut self) {
        self.root = PathBuf::new();
        self.sections.clear();
        self.repos.clear();
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    fn read_variants(&self) -> Vec<RepoMetadata> {
        let variants = self
            .get("tree", "variants")
            .or_else(|| self.get("general", "variants"))
            .unwrap_or_default();

        variants
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|name| {
                let repository = self
                    .get(&format!("variant-{name}"), "repository")
                    .unwrap_or(".");
                RepoMetadata {
                    name: name.to_string(),
                    path: PathBuf::from(repository),
                    root: self.root.clone(),
                }
            })
            .collect()
    }

    /// Lower-cased `[release] version` (or legacy `[general] version`).
    pub fn release_version(&self) -> InstallResult<String> {
        self.get("release", "version")
            .or_else(|| self.get("general", "version"))
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
            .ok_or_else(|| InstallError::TreeInfo {
                path: self.root.clone(),
                reason: "release version is missing".to_string(),
            })
    }

    /// Tree architecture, if declared.
    pub fn arch(&self) -> Option<&str> {
        self.get("tree", "arch")
            .or_else(|| self.get("general", "arch"))
    }

    pub fn repos_metadata(&self) -> &[RepoMetadata] {
        &self.repos
    }

    pub fn repo_metadata_by_name(&self, name: &str) -> Option<&RepoMetadata> {
        self.repos.iter().find(|r| r.name == name)
    }

    /// First variant named in `additional_names` or [`DEFAULT_BASE_REPOS`].
    pub fn base_repo_metadata(&self, additional_names: &[String]) -> Option<&RepoMetadata> {
        self.repos.iter().find(|repo| {
            additional_names.iter().any(|n| *n == repo.name)
                || DEFAULT_BASE_REPOS.contains(&repo.name.as_str())
        })
    }
}

/// One repository variant inside an install tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMetadata {
    name: String,
    path: PathBuf,
    root: PathBuf,
}

impl RepoMetadata {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository path relative to the tree root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A repository is usable when its `repodata/repomd.xml` exists.
    pub fn is_valid(&self) -> bool {
        self.root
            .join(&self.path)
            .join("repodata")
            .join("repomd.xml")
            .is_file()
    }
}

/// Whether the tree mounted at `mounted` carries a usable base repository.
pub fn has_valid_repo_metadata(mounted: &Path, base_repo_names: &[String]) -> bool {
    let mut metadata = InstallTreeMetadata::new();
    if !metadata.load_file(mounted) {
        warn!(path = %mounted.display(), "can't read install tree metadata");
    }

    match metadata.base_repo_metadata(base_repo_names) {
        Some(repo) => {
            let valid = repo.is_valid();
            debug!(repo = repo.name(), valid, "base repository");
            valid
        }
        None => false,
    }
}

/// Minimal INI reader: `[section]` headers, `key = value` pairs, `#`/`;`
/// comments. Keys outside any section are dropped.
fn parse_ini(text: &str) -> BTreeMap<String, Section> {
    let mut sections: BTreeMap<String, Section> = BTreeMap::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some(section) = &current else { continue };
        if let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}
