//! Overlay resolution.
//!
//! The [`OverlayManager`] turns the declared overlay configuration and the
//! project's dependency set into a single deterministic, ordered overlay
//! list. Resolution happens once per build, before any file is written, and
//! any configuration problem aborts the whole packaging step: an incorrect
//! overlay setup must never silently assemble a wrong archive.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use warpack_project::{Artifact, Overlay};

/// An overlay paired with the dependency artifact backing it.
///
/// `artifact` is `None` only for the current-project slot.
#[derive(Debug, Clone)]
pub struct ResolvedOverlay {
    pub overlay: Overlay,
    pub artifact: Option<Artifact>,
}

impl ResolvedOverlay {
    pub fn id(&self) -> String {
        self.overlay.effective_id()
    }
}

/// Ordered, validated overlay list for one build.
#[derive(Debug)]
pub struct OverlayManager {
    overlays: Vec<ResolvedOverlay>,
}

impl OverlayManager {
    /// Resolve the declared overlays against the dependency set.
    ///
    /// 1. Every declared overlay with explicit coordinates must match exactly
    ///    one mergeable, non-optional, runtime-scoped dependency.
    /// 2. Declaration order is preserved; duplicate overlay ids are rejected.
    /// 3. The current-project slot is inserted at position 0 when not
    ///    explicitly declared.
    /// 4. Every mergeable dependency not covered by a declaration is appended
    ///    as an implicit overlay, in dependency order, with the default
    ///    include/exclude patterns.
    pub fn resolve(
        declared: &[Overlay],
        artifacts: &[Artifact],
        default_includes: &[String],
        default_excludes: &[String],
    ) -> Result<Self> {
        let mergeable: Vec<&Artifact> = artifacts
            .iter()
            .filter(|a| a.is_mergeable() && !a.optional && a.scope.is_runtime_included())
            .collect();

        let mut overlays: Vec<ResolvedOverlay> = Vec::new();
        let mut seen_ids: BTreeSet<String> = BTreeSet::new();

        for overlay in declared {
            let id = overlay.effective_id();
            if !seen_ids.insert(id.clone()) {
                return Err(Error::InvalidOverlayConfiguration(format!(
                    "overlay [{id}] is declared more than once"
                )));
            }
            if overlay.is_current_project() {
                overlays.push(ResolvedOverlay {
                    overlay: overlay.clone(),
                    artifact: None,
                });
                continue;
            }
            if overlay.group_id.is_none() || overlay.artifact_id.is_none() {
                return Err(Error::InvalidOverlayConfiguration(format!(
                    "overlay [{id}] must specify both a groupId and an artifactId"
                )));
            }

            let matches: Vec<&Artifact> = mergeable
                .iter()
                .copied()
                .filter(|a| a.matches_overlay(overlay))
                .collect();
            match matches.len() {
                1 => overlays.push(ResolvedOverlay {
                    overlay: overlay.clone(),
                    artifact: Some(matches[0].clone()),
                }),
                0 => {
                    return Err(Error::InvalidOverlayConfiguration(format!(
                        "overlay [{id}] does not match any mergeable dependency of the project"
                    )))
                }
                n => {
                    return Err(Error::InvalidOverlayConfiguration(format!(
                        "overlay [{id}] matches {n} dependency artifacts"
                    )))
                }
            }
        }

        if !overlays.iter().any(|r| r.overlay.is_current_project()) {
            overlays.insert(
                0,
                ResolvedOverlay {
                    overlay: Overlay::current_project(),
                    artifact: None,
                },
            );
        }

        for artifact in &mergeable {
            let covered = overlays.iter().any(|r| {
                r.artifact
                    .as_ref()
                    .is_some_and(|a| a.same_dependency_ignoring_version(artifact))
            });
            if !covered {
                overlays.push(ResolvedOverlay {
                    overlay: Overlay::for_artifact(artifact, default_includes, default_excludes),
                    artifact: Some((*artifact).clone()),
                });
            }
        }

        tracing::debug!(
            "Resolved {} overlay(s): {:?}",
            overlays.len(),
            overlays.iter().map(ResolvedOverlay::id).collect::<Vec<_>>()
        );
        Ok(Self { overlays })
    }

    pub fn overlays(&self) -> &[ResolvedOverlay] {
        &self.overlays
    }

    /// The resolved overlay ids, in order.
    pub fn ids(&self) -> Vec<String> {
        self.overlays.iter().map(ResolvedOverlay::id).collect()
    }
}
