//! Ownership tracking for the assembled webapp.
//!
//! The [`WebappStructure`] records, for every path contributed to the output
//! directory, which overlay owns it. Tasks run strictly in overlay order and
//! claim paths as they copy files; the first claim wins and later sources
//! fill only the gaps. The structure also carries per-dependency target-name
//! metadata and the outdated-path bookkeeping that makes incremental builds
//! clean up after themselves.
//!
//! One instance exists per build invocation. It is created from the resolved
//! overlay id list — every id gets an empty path set up front, so iterating
//! owners after the build always includes overlays that contributed nothing.

use crate::error::Result;
use crate::path_set::{normalize, PathSet};
use camino::Utf8Path;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::SystemTime;
use walkdir::WalkDir;
use warpack_project::Artifact;

/// Outcome of attempting to claim a path for an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The path was unowned and now belongs to the claimant.
    Claimed,
    /// The path already belongs to `owner` (possibly the claimant itself);
    /// the write must be skipped.
    AlreadyOwned { owner: String },
}

/// Receives the classification of a single registration attempt.
///
/// Exactly one method is invoked per [`WebappStructure::register_file_with`]
/// call. Callbacks are synchronous; a returned error propagates to the
/// caller and aborts the pipeline.
pub trait RegistrationCallback {
    /// The path was not registered before; `owner` now owns it.
    fn registered(&mut self, owner: &str, path: &str) -> Result<()>;

    /// `owner` already owns the path; the registration is idempotent.
    fn already_registered(&mut self, owner: &str, path: &str) -> Result<()>;

    /// The path belongs to `current_owner`, which has priority; no state
    /// change happened and the write must be skipped.
    fn refused(&mut self, owner: &str, path: &str, current_owner: &str) -> Result<()>;

    /// Ownership was transferred from `previous_owner`, a known overlay with
    /// lower priority than `owner`.
    fn superseded(&mut self, owner: &str, path: &str, previous_owner: &str) -> Result<()>;

    /// Ownership was transferred from `previous_owner`, an id that is not
    /// among the known overlays of this build.
    fn superseded_unknown_owner(&mut self, owner: &str, path: &str, previous_owner: &str)
        -> Result<()>;
}

/// A dependency together with its resolved target file name, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRecord {
    pub artifact: Artifact,
    pub target_file_name: Option<String>,
}

/// Registration table mapping each contributed path to its owning overlay,
/// plus incremental-build bookkeeping.
#[derive(Debug, Default)]
pub struct WebappStructure {
    /// Overlay ids in resolution order. Position determines priority:
    /// earlier owners win registration conflicts.
    known_owners: Vec<String>,

    owners: BTreeMap<String, PathSet>,
    path_owner: HashMap<String, String>,

    /// Union of all owners' path sets, kept consistent on every mutation.
    full: PathSet,

    dependencies: Vec<DependencyRecord>,

    /// Paths found in the output directory at build start that have not been
    /// rewritten yet. Whatever remains after all tasks ran is stale.
    outdated: BTreeSet<String>,
}

impl WebappStructure {
    /// Create a structure for one build invocation.
    ///
    /// Every id in `owner_ids` is materialized with an empty path set so that
    /// owner enumeration includes zero-contribution overlays.
    pub fn new(owner_ids: &[String], dependencies: Vec<Artifact>) -> Self {
        let mut structure = Self {
            known_owners: Vec::new(),
            owners: BTreeMap::new(),
            path_owner: HashMap::new(),
            full: PathSet::new(),
            dependencies: dependencies
                .into_iter()
                .map(|artifact| DependencyRecord {
                    artifact,
                    target_file_name: None,
                })
                .collect(),
            outdated: BTreeSet::new(),
        };
        for id in owner_ids {
            structure.materialize_owner(id);
        }
        structure
    }

    fn materialize_owner(&mut self, owner: &str) {
        if !self.owners.contains_key(owner) {
            self.owners.insert(owner.to_string(), PathSet::new());
            self.known_owners.push(owner.to_string());
        }
    }

    fn owner_index(&self, owner: &str) -> Option<usize> {
        self.known_owners.iter().position(|id| id == owner)
    }

    fn do_register(&mut self, owner: &str, path: &str) {
        self.materialize_owner(owner);
        if let Some(set) = self.owners.get_mut(owner) {
            set.add(path);
        }
        self.path_owner.insert(path.to_string(), owner.to_string());
        self.full.add(path);
    }

    fn transfer(&mut self, new_owner: &str, previous_owner: &str, path: &str) {
        if let Some(set) = self.owners.get_mut(previous_owner) {
            set.remove(path);
        }
        self.do_register(new_owner, path);
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.path_owner.contains_key(&normalize(path))
    }

    pub fn get_owner(&self, path: &str) -> Option<&str> {
        self.path_owner.get(&normalize(path)).map(String::as_str)
    }

    /// Try to claim `path` for `owner`. First writer wins; a second claim by
    /// any owner (including the same one) is refused.
    pub fn claim(&mut self, owner: &str, path: &str) -> Claim {
        let path = normalize(path);
        match self.path_owner.get(&path) {
            Some(current) => Claim::AlreadyOwned {
                owner: current.clone(),
            },
            None => {
                self.do_register(owner, &path);
                Claim::Claimed
            }
        }
    }

    /// Returns true iff the path was not previously registered.
    pub fn register_file(&mut self, owner: &str, path: &str) -> bool {
        matches!(self.claim(owner, path), Claim::Claimed)
    }

    /// Register `path` for `owner` unconditionally.
    ///
    /// Returns true iff ownership was transferred from a *different* owner,
    /// false for a fresh or same-owner registration.
    pub fn register_file_forced(&mut self, owner: &str, path: &str) -> bool {
        let path = normalize(path);
        match self.path_owner.get(&path).cloned() {
            Some(previous) if previous != owner => {
                self.transfer(owner, &previous, &path);
                true
            }
            Some(_) => false,
            None => {
                self.do_register(owner, &path);
                false
            }
        }
    }

    /// Register with conflict classification.
    ///
    /// The outcome is deterministic from current state:
    /// - unregistered path: registered
    /// - owned by `owner` already: already registered
    /// - owned by a known overlay with priority over `owner`: refused
    /// - owned by a known overlay *behind* `owner` in resolution order:
    ///   ownership transfers, superseded
    /// - owned by an id this build does not know: ownership transfers,
    ///   superseded with unknown owner
    pub fn register_file_with(
        &mut self,
        owner: &str,
        path: &str,
        callback: &mut dyn RegistrationCallback,
    ) -> Result<()> {
        let path = normalize(path);
        match self.path_owner.get(&path).cloned() {
            None => {
                self.do_register(owner, &path);
                callback.registered(owner, &path)
            }
            Some(previous) if previous == owner => callback.already_registered(owner, &path),
            Some(previous) => match (self.owner_index(&previous), self.owner_index(owner)) {
                (None, _) => {
                    self.transfer(owner, &previous, &path);
                    callback.superseded_unknown_owner(owner, &path, &previous)
                }
                (Some(previous_idx), Some(owner_idx)) if previous_idx > owner_idx => {
                    self.transfer(owner, &previous, &path);
                    callback.superseded(owner, &path, &previous)
                }
                _ => callback.refused(owner, &path, &previous),
            },
        }
    }

    /// The path set contributed by `owner`, materializing an empty set on
    /// first access.
    pub fn get_structure(&mut self, owner: &str) -> &PathSet {
        self.materialize_owner(owner);
        &self.owners[owner]
    }

    /// All known owner ids, in priority order.
    pub fn owners(&self) -> &[String] {
        &self.known_owners
    }

    /// Union of all owners' path sets.
    pub fn full_structure(&self) -> &PathSet {
        &self.full
    }

    /// Associate a resolved target file name with the dependency matching the
    /// artifact on groupId, artifactId, type and classifier. The version is
    /// not compared.
    pub fn register_target_file_name(&mut self, artifact: &Artifact, file_name: &str) {
        let mut matched = false;
        for record in &mut self.dependencies {
            if record.artifact.same_dependency_ignoring_version(artifact) {
                record.target_file_name = Some(file_name.to_string());
                matched = true;
            }
        }
        if !matched {
            tracing::debug!(
                "No dependency matches {}:{} for target name '{}'",
                artifact.group_id,
                artifact.artifact_id,
                file_name
            );
        }
    }

    /// Dependency records with their resolved target names, for reporting.
    pub fn dependencies(&self) -> &[DependencyRecord] {
        &self.dependencies
    }

    /// Scan the existing output tree once and record outdated candidates:
    /// regular files under `scope` (normalized; empty or `/` means the whole
    /// tree) whose modification time predates `build_start`.
    ///
    /// Any scan error is logged as a warning and treated as "nothing is
    /// outdated" — housekeeping never blocks the build.
    pub fn scan_outdated(&mut self, output_dir: &Utf8Path, scope: &str, build_start: SystemTime) {
        self.outdated.clear();
        if !output_dir.as_std_path().exists() {
            return;
        }
        let scope = normalize(scope);
        let mut found = BTreeSet::new();

        for entry in WalkDir::new(output_dir.as_std_path()) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Outdated scan failed, skipping cleanup: {e}");
                    return;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(output_dir.as_std_path())
                .unwrap_or(entry.path());
            let Some(rel) = rel.to_str() else {
                continue;
            };
            let rel = normalize(rel);
            if !scope.is_empty() && rel != scope && !rel.starts_with(&format!("{scope}/")) {
                continue;
            }
            let modified = match entry.metadata().map_err(|e| e.to_string()).and_then(|m| {
                m.modified().map_err(|e| e.to_string())
            }) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!("Outdated scan failed on {rel}, skipping cleanup: {e}");
                    return;
                }
            };
            if modified < build_start {
                found.insert(rel);
            }
        }
        tracing::debug!("Outdated scan found {} candidate(s)", found.len());
        self.outdated = found;
    }

    /// Record that `path` was written during the current build, removing it
    /// from the outdated candidates.
    pub fn mark_current(&mut self, path: &str) {
        self.outdated.remove(&normalize(path));
    }

    /// Delete every outdated candidate that was not rewritten this build.
    ///
    /// Returns the paths actually deleted. Per-file deletion failures are
    /// logged and do not fail the build.
    pub fn delete_outdated(&mut self, output_dir: &Utf8Path) -> Vec<String> {
        let mut deleted = Vec::new();
        for path in std::mem::take(&mut self.outdated) {
            let target = output_dir.join(&path);
            match std::fs::remove_file(target.as_std_path()) {
                Ok(()) => {
                    tracing::info!("Deleting outdated resource {path}");
                    deleted.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Could not delete outdated resource {path}: {e}");
                }
            }
        }
        deleted
    }
}
