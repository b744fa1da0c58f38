//! Declarative model for warpack web-application projects.
//!
//! This crate holds the configuration-facing types consumed by the
//! `warpack_overlay` assembly engine: dependency [`Artifact`]s, overlay
//! declarations ([`Overlay`]), extra [`WebResource`] directories and the
//! [`WarProject`] aggregate. All types are plain serde structures that can be
//! parsed from JSON or TOML project files.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overlay id reserved for the project's own build output.
pub const CURRENT_BUILD_ID: &str = "currentBuild";

/// Errors produced while loading or validating a project definition.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// The JSON project file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML project file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The project name is empty or contains whitespace.
    #[error("invalid project name: '{0}'")]
    InvalidName(String),
}

/// Dependency scope of an [`Artifact`].
///
/// Only `compile` and `runtime` scoped artifacts end up inside the assembled
/// webapp; the other scopes exist so a host build tool can hand over its full
/// dependency set unfiltered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactScope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
}

impl ArtifactScope {
    /// Whether artifacts of this scope are packaged into the webapp.
    pub fn is_runtime_included(self) -> bool {
        matches!(self, ArtifactScope::Compile | ArtifactScope::Runtime)
    }
}

fn default_artifact_type() -> String {
    "jar".to_string()
}

/// A resolved dependency artifact supplied by the host build tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,

    /// Packaging type (`jar`, `war`, `tld`, ...). Determines where the
    /// artifact lands inside the archive.
    #[serde(rename = "type", default = "default_artifact_type")]
    pub artifact_type: String,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub scope: ArtifactScope,

    /// Location of the artifact file on disk.
    pub file: Utf8PathBuf,
}

impl Artifact {
    /// Whether this artifact is an archive that can be merged as an overlay
    /// (`war` or `zip`) rather than copied as a plain library.
    pub fn is_mergeable(&self) -> bool {
        matches!(self.artifact_type.as_str(), "war" | "zip")
    }

    /// Whether this artifact matches an overlay's explicit coordinates.
    pub fn matches_overlay(&self, overlay: &Overlay) -> bool {
        overlay.group_id.as_deref() == Some(self.group_id.as_str())
            && overlay.artifact_id.as_deref() == Some(self.artifact_id.as_str())
            && overlay.classifier == self.classifier
            && overlay.artifact_type == self.artifact_type
    }

    /// Four-of-five field match: groupId, artifactId, type and classifier.
    ///
    /// The version is deliberately not compared. Target-file-name metadata is
    /// associated with a dependency regardless of which version of it the
    /// current build resolved.
    pub fn same_dependency_ignoring_version(&self, other: &Artifact) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.artifact_type == other.artifact_type
            && self.classifier == other.classifier
    }

    /// File extension used when constructing the default final name.
    pub fn extension(&self) -> &str {
        match self.artifact_type.as_str() {
            "ejb" | "ejb-client" | "test-jar" | "bundle" => "jar",
            other => other,
        }
    }

    /// Default final file name: `artifactId-version[-classifier].<ext>`.
    pub fn default_final_name(&self) -> String {
        match self.classifier.as_deref() {
            Some(classifier) if !classifier.is_empty() => format!(
                "{}-{}-{}.{}",
                self.artifact_id,
                self.version,
                classifier,
                self.extension()
            ),
            _ => format!("{}-{}.{}", self.artifact_id, self.version, self.extension()),
        }
    }
}

fn default_overlay_type() -> String {
    "war".to_string()
}

/// Default include patterns for overlays.
pub fn default_overlay_includes() -> Vec<String> {
    vec!["**".to_string()]
}

/// Default exclude patterns for overlays. The manifest of an overlay archive
/// never belongs to the assembled webapp.
pub fn default_overlay_excludes() -> Vec<String> {
    vec!["META-INF/MANIFEST.MF".to_string()]
}

/// One content source merged into the assembled webapp.
///
/// An overlay is either the current project build (see
/// [`Overlay::current_project`]) or a dependency archive identified by its
/// coordinates. Overlays are resolved once per build into a deterministic
/// ordered list and are immutable afterwards.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct Overlay {
    /// Explicit id; computed from the coordinates when absent.
    pub id: Option<String>,

    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub classifier: Option<String>,

    #[serde(rename = "type")]
    pub artifact_type: String,

    pub includes: Vec<String>,
    pub excludes: Vec<String>,

    /// Run every contributed file through the filtering collaborator.
    pub filtered: bool,

    /// Resolve the overlay but contribute nothing.
    pub skip: bool,

    /// Directory prefix prepended to every path the overlay contributes.
    pub target_path: Option<String>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            id: None,
            group_id: None,
            artifact_id: None,
            classifier: None,
            artifact_type: default_overlay_type(),
            includes: default_overlay_includes(),
            excludes: default_overlay_excludes(),
            filtered: false,
            skip: false,
            target_path: None,
        }
    }
}

impl Overlay {
    /// The overlay slot representing the current project build.
    pub fn current_project() -> Self {
        Self {
            id: Some(CURRENT_BUILD_ID.to_string()),
            ..Self::default()
        }
    }

    /// Implicit overlay for a mergeable dependency that was not explicitly
    /// declared in the project configuration.
    pub fn for_artifact(artifact: &Artifact, includes: &[String], excludes: &[String]) -> Self {
        Self {
            id: None,
            group_id: Some(artifact.group_id.clone()),
            artifact_id: Some(artifact.artifact_id.clone()),
            classifier: artifact.classifier.clone(),
            artifact_type: artifact.artifact_type.clone(),
            includes: includes.to_vec(),
            excludes: excludes.to_vec(),
            filtered: false,
            skip: false,
            target_path: None,
        }
    }

    pub fn is_current_project(&self) -> bool {
        self.id.as_deref() == Some(CURRENT_BUILD_ID)
    }

    /// Whether the overlay names a dependency artifact at all.
    pub fn has_coordinates(&self) -> bool {
        self.group_id.is_some() || self.artifact_id.is_some()
    }

    /// The overlay identity used for ownership tracking and duplicate
    /// detection: the explicit id when set, else
    /// `groupId:artifactId[:classifier]`.
    pub fn effective_id(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        let group_id = self.group_id.as_deref().unwrap_or("");
        let artifact_id = self.artifact_id.as_deref().unwrap_or("");
        match self.classifier.as_deref() {
            Some(classifier) => format!("{group_id}:{artifact_id}:{classifier}"),
            None => format!("{group_id}:{artifact_id}"),
        }
    }
}

impl PartialEq for Overlay {
    /// Two overlays are equal when their identity and artifact coordinates
    /// match; include/exclude patterns and flags are not part of identity.
    fn eq(&self, other: &Self) -> bool {
        self.effective_id() == other.effective_id()
            && self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.classifier == other.classifier
    }
}

impl Eq for Overlay {}

/// An extra resource directory copied into the webapp by the current-project
/// packaging task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebResource {
    pub directory: Utf8PathBuf,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,

    #[serde(default)]
    pub filtered: bool,
}

impl WebResource {
    pub fn new(directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
            target_path: None,
            filtered: false,
        }
    }
}

/// Describes a web-application project to assemble.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WarProject {
    /// Project name, used for the archived-classes library name.
    /// Must not contain whitespace.
    pub name: String,

    pub version: String,

    /// Resolved dependency set, in classpath order.
    #[serde(default)]
    pub dependencies: Vec<Artifact>,

    /// Declared overlay configuration, in declaration order.
    #[serde(default)]
    pub overlays: Vec<Overlay>,

    /// Extra resource directories copied by the current-project task.
    #[serde(default)]
    pub web_resources: Vec<WebResource>,
}

impl WarProject {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: Vec::new(),
            overlays: Vec::new(),
            web_resources: Vec::new(),
        }
    }

    /// Parse a project definition from a JSON document.
    pub fn from_json_str(contents: &str) -> Result<Self, ProjectError> {
        let project: Self = serde_json::from_str(contents)?;
        project.validate()?;
        Ok(project)
    }

    /// Parse a project definition from a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ProjectError> {
        let project: Self = toml::from_str(contents)?;
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(ProjectError::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_scope_runtime_inclusion() {
        assert!(ArtifactScope::Compile.is_runtime_included());
        assert!(ArtifactScope::Runtime.is_runtime_included());
        assert!(!ArtifactScope::Provided.is_runtime_included());
        assert!(!ArtifactScope::Test.is_runtime_included());
        assert!(!ArtifactScope::System.is_runtime_included());
    }

    #[test]
    fn test_mergeable_types() {
        assert!(artifact("g", "a", "war").is_mergeable());
        assert!(artifact("g", "a", "zip").is_mergeable());
        assert!(!artifact("g", "a", "jar").is_mergeable());
        assert!(!artifact("g", "a", "tld").is_mergeable());
    }

    #[test]
    fn test_default_final_name() {
        assert_eq!(artifact("g", "lib", "jar").default_final_name(), "lib-1.0.jar");
        assert_eq!(artifact("g", "beans", "ejb").default_final_name(), "beans-1.0.jar");

        let mut classified = artifact("g", "lib", "jar");
        classified.classifier = Some("linux".to_string());
        assert_eq!(classified.default_final_name(), "lib-1.0-linux.jar");
    }

    #[test]
    fn test_same_dependency_ignores_version() {
        let a = artifact("g", "lib", "jar");
        let mut b = a.clone();
        b.version = "2.0".to_string();
        assert!(a.same_dependency_ignoring_version(&b));

        b.classifier = Some("sources".to_string());
        assert!(!a.same_dependency_ignoring_version(&b));
    }

    #[test]
    fn test_overlay_effective_id() {
        let mut overlay = Overlay::for_artifact(&artifact("g", "a", "war"), &[], &[]);
        assert_eq!(overlay.effective_id(), "g:a");

        overlay.classifier = Some("docs".to_string());
        assert_eq!(overlay.effective_id(), "g:a:docs");

        overlay.id = Some("custom".to_string());
        assert_eq!(overlay.effective_id(), "custom");
    }

    #[test]
    fn test_current_project_marker() {
        let current = Overlay::current_project();
        assert!(current.is_current_project());
        assert!(!current.has_coordinates());
        assert_eq!(current.effective_id(), CURRENT_BUILD_ID);
    }

    #[test]
    fn test_overlay_equality_ignores_patterns() {
        let a = artifact("g", "a", "war");
        let mut left = Overlay::for_artifact(&a, &["**".to_string()], &[]);
        let right = Overlay::for_artifact(&a, &[], &["**/*.txt".to_string()]);
        assert_eq!(left, right);

        left.artifact_id = Some("other".to_string());
        assert_ne!(left, right);
    }

    #[test]
    fn test_artifact_matches_overlay() {
        let a = artifact("g", "a", "war");
        let overlay = Overlay::for_artifact(&a, &[], &[]);
        assert!(a.matches_overlay(&overlay));
        assert!(!artifact("g", "b", "war").matches_overlay(&overlay));
        assert!(!artifact("g", "a", "zip").matches_overlay(&overlay));
    }

    #[test]
    fn test_overlay_defaults_from_json() {
        let overlay: Overlay =
            serde_json::from_str(r#"{ "groupId": "g", "artifactId": "a" }"#).unwrap();
        assert_eq!(overlay.artifact_type, "war");
        assert_eq!(overlay.includes, vec!["**".to_string()]);
        assert_eq!(overlay.excludes, vec!["META-INF/MANIFEST.MF".to_string()]);
        assert!(!overlay.filtered);
        assert!(!overlay.skip);
    }

    #[test]
    fn test_project_from_json() {
        let project = WarProject::from_json_str(
            r#"{
                "name": "shop",
                "version": "2.1.0",
                "dependencies": [
                    { "groupId": "g", "artifactId": "a", "version": "1.0",
                      "type": "war", "file": "/repo/a-1.0.war" }
                ],
                "overlays": [ { "groupId": "g", "artifactId": "a" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(project.name, "shop");
        assert_eq!(project.dependencies.len(), 1);
        assert!(project.dependencies[0].is_mergeable());
        assert_eq!(project.overlays.len(), 1);
    }

    #[test]
    fn test_project_from_toml() {
        let project = WarProject::from_toml_str(
            r#"
            name = "shop"
            version = "2.1.0"

            [[overlays]]
            groupId = "g"
            artifactId = "a"
            skip = true
            "#,
        )
        .unwrap();
        assert!(project.overlays[0].skip);
    }

    #[test]
    fn test_project_name_validation() {
        assert!(WarProject::new("my shop", "1.0").validate().is_err());
        assert!(WarProject::new("", "1.0").validate().is_err());
        assert!(WarProject::new("shop", "1.0").validate().is_ok());
    }
}
