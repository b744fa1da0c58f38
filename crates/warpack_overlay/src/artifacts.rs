//! Dependency artifact placement.
//!
//! Maps every packaged dependency to its destination inside the webapp,
//! disambiguating duplicate file names by prefixing the groupId, and routing
//! by packaging type. Archive-type dependencies (war/zip) never pass through
//! here as file copies — they are merged by the overlay mechanism instead.

use crate::error::Result;
use crate::pipeline::PackagingContext;
use crate::structure::Claim;
use crate::utils::copy_file;
use std::collections::BTreeMap;
use warpack_project::{Artifact, CURRENT_BUILD_ID};

pub(crate) const LIB_PATH: &str = "WEB-INF/lib";
pub(crate) const CLASSES_PATH: &str = "WEB-INF/classes";
const TLD_PATH: &str = "WEB-INF/tld";
const SERVICES_PATH: &str = "WEB-INF/services";
const MODULES_PATH: &str = "WEB-INF/modules";
const EXTENSIONS_PATH: &str = "WEB-INF/extensions";

/// Computes the candidate file name for a packaged dependency.
///
/// Host build tools usually plug in their own naming scheme; the default uses
/// [`Artifact::default_final_name`]. Collision handling happens after this
/// resolver runs, so implementations only need to produce a stable name.
pub trait FinalNameResolver {
    fn final_name(&self, artifact: &Artifact) -> String;
}

#[derive(Debug, Default)]
pub struct DefaultFinalNameResolver;

impl FinalNameResolver for DefaultFinalNameResolver {
    fn final_name(&self, artifact: &Artifact) -> String {
        artifact.default_final_name()
    }
}

/// Where a dependency artifact goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArtifactRoute {
    /// Copied to this path inside the webapp.
    File(String),
    /// Merged through the overlay mechanism, not copied here.
    OverlayHandled,
    /// Unknown packaging type; skipped with a diagnostic.
    Unsupported,
}

/// Resolve final file names for every packageable dependency, prefixing the
/// groupId wherever two artifacts would otherwise collide.
pub(crate) fn resolve_final_names(
    artifacts: &[Artifact],
    resolver: &dyn FinalNameResolver,
) -> Vec<(Artifact, String)> {
    let eligible: Vec<&Artifact> = artifacts
        .iter()
        .filter(|a| !a.optional && a.scope.is_runtime_included())
        .collect();

    let mut name_counts: BTreeMap<String, usize> = BTreeMap::new();
    for artifact in &eligible {
        *name_counts.entry(resolver.final_name(artifact)).or_default() += 1;
    }

    eligible
        .into_iter()
        .map(|artifact| {
            let base = resolver.final_name(artifact);
            let name = if name_counts[&base] > 1 {
                let disambiguated = format!("{}-{}", artifact.group_id, base);
                tracing::debug!(
                    "Duplicate final name '{base}' for {}:{}, using '{disambiguated}'",
                    artifact.group_id,
                    artifact.artifact_id
                );
                disambiguated
            } else {
                base
            };
            (artifact.clone(), name)
        })
        .collect()
}

/// Route an artifact by its packaging type.
pub(crate) fn route_artifact(artifact: &Artifact, final_name: &str) -> ArtifactRoute {
    match artifact.artifact_type.as_str() {
        "tld" => ArtifactRoute::File(format!("{TLD_PATH}/{final_name}")),
        "aar" => ArtifactRoute::File(format!("{SERVICES_PATH}/{final_name}")),
        "mar" => ArtifactRoute::File(format!("{MODULES_PATH}/{final_name}")),
        "xar" => ArtifactRoute::File(format!("{EXTENSIONS_PATH}/{final_name}")),
        "jar" | "ejb" | "ejb-client" | "test-jar" | "bundle" => {
            ArtifactRoute::File(format!("{LIB_PATH}/{final_name}"))
        }
        // legacy packaging, shipped as a plain jar
        "par" => {
            let stem = final_name.rsplit_once('.').map_or(final_name, |(stem, _)| stem);
            ArtifactRoute::File(format!("{LIB_PATH}/{stem}.jar"))
        }
        "war" | "zip" => ArtifactRoute::OverlayHandled,
        _ => ArtifactRoute::Unsupported,
    }
}

/// Copy every packageable dependency into the webapp under the current-build
/// owner, registering resolved target names on the structure first.
pub(crate) fn package_artifacts(
    ctx: &mut PackagingContext<'_>,
    dependencies: &[Artifact],
    resolver: &dyn FinalNameResolver,
) -> Result<()> {
    let named = resolve_final_names(dependencies, resolver);

    for (artifact, name) in &named {
        ctx.structure.register_target_file_name(artifact, name);
    }

    for (artifact, name) in &named {
        match route_artifact(artifact, name) {
            ArtifactRoute::File(dest_rel) => match ctx.structure.claim(CURRENT_BUILD_ID, &dest_rel)
            {
                Claim::Claimed => {
                    tracing::debug!(
                        "Copying dependency {}:{} to {dest_rel}",
                        artifact.group_id,
                        artifact.artifact_id
                    );
                    copy_file(&artifact.file, &ctx.output_dir.join(&dest_rel))?;
                    ctx.structure.mark_current(&dest_rel);
                }
                Claim::AlreadyOwned { owner } => {
                    tracing::debug!("{dest_rel} already registered to [{owner}], skipping");
                }
            },
            ArtifactRoute::OverlayHandled => {
                tracing::debug!(
                    "Dependency {}:{} is an overlay, not copied as a file",
                    artifact.group_id,
                    artifact.artifact_id
                );
            }
            ArtifactRoute::Unsupported => {
                tracing::warn!(
                    "Unsupported packaging type '{}' for {}:{}, skipping",
                    artifact.artifact_type,
                    artifact.group_id,
                    artifact.artifact_id
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use warpack_project::ArtifactScope;

    fn artifact(group_id: &str, artifact_id: &str, artifact_type: &str) -> Artifact {
        Artifact {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: "1.0".to_string(),
            classifier: None,
            artifact_type: artifact_type.to_string(),
            optional: false,
            scope: ArtifactScope::Compile,
            file: Utf8PathBuf::from(format!("/repo/{artifact_id}-1.0.{artifact_type}")),
        }
    }

    #[test]
    fn test_duplicate_names_get_group_prefix() {
        // same artifactId+version in two groups collides on the default name
        let deps = vec![
            artifact("org.one", "util", "jar"),
            artifact("org.two", "util", "jar"),
            artifact("org.one", "other", "jar"),
        ];
        let named = resolve_final_names(&deps, &DefaultFinalNameResolver);
        let names: Vec<&str> = named.iter().map(|(_, n)| n.as_str()).collect();

        assert_eq!(
            names,
            vec!["org.one-util-1.0.jar", "org.two-util-1.0.jar", "other-1.0.jar"]
        );
    }

    #[test]
    fn test_optional_and_test_artifacts_are_skipped() {
        let mut optional = artifact("g", "opt", "jar");
        optional.optional = true;
        let mut test_scoped = artifact("g", "test", "jar");
        test_scoped.scope = ArtifactScope::Test;

        let named = resolve_final_names(&[optional, test_scoped], &DefaultFinalNameResolver);
        assert!(named.is_empty());
    }

    #[test]
    fn test_routing_by_type() {
        let cases = [
            ("tld", "WEB-INF/tld/x-1.0.tld"),
            ("aar", "WEB-INF/services/x-1.0.aar"),
            ("mar", "WEB-INF/modules/x-1.0.mar"),
            ("xar", "WEB-INF/extensions/x-1.0.xar"),
            ("jar", "WEB-INF/lib/x-1.0.jar"),
            ("ejb", "WEB-INF/lib/x-1.0.jar"),
            ("bundle", "WEB-INF/lib/x-1.0.jar"),
        ];
        for (artifact_type, expected) in cases {
            let a = artifact("g", "x", artifact_type);
            assert_eq!(
                route_artifact(&a, &a.default_final_name()),
                ArtifactRoute::File(expected.to_string()),
                "type {artifact_type}"
            );
        }
    }

    #[test]
    fn test_par_is_renamed_to_jar() {
        let a = artifact("g", "legacy", "par");
        assert_eq!(
            route_artifact(&a, &a.default_final_name()),
            ArtifactRoute::File("WEB-INF/lib/legacy-1.0.jar".to_string())
        );
    }

    #[test]
    fn test_archives_and_unknown_types() {
        let war = artifact("g", "site", "war");
        assert_eq!(
            route_artifact(&war, &war.default_final_name()),
            ArtifactRoute::OverlayHandled
        );
        let odd = artifact("g", "odd", "nar");
        assert_eq!(
            route_artifact(&odd, &odd.default_final_name()),
            ArtifactRoute::Unsupported
        );
    }
}
