//! Packaging task pipeline.
//!
//! The [`WarPackager`] orchestrates one full assembly:
//!
//! 1. Resolve the overlay configuration into an ordered list
//!    ([`OverlayManager`]).
//! 2. Create a [`WebappStructure`] primed with every resolved overlay id and
//!    scan the previous output for outdated candidates.
//! 3. Expand the overlay list into a task sequence: the current-project slot
//!    becomes the project, classes and artifacts tasks; every other slot
//!    becomes an overlay task.
//! 4. Run the tasks strictly in order. Each task claims paths through the
//!    shared structure and copies only what it claimed, so earlier sources
//!    win every conflict. The deployment descriptors are the one exception:
//!    the project task force-registers them and they win regardless of
//!    pipeline position.
//! 5. Delete whatever outdated candidates were not rewritten.
//!
//! Execution is single-threaded and fail-fast: the first task error aborts
//! the rest of the pipeline.

use crate::archive::{Archiver, ZipArchiver};
use crate::artifacts::{self, DefaultFinalNameResolver, FinalNameResolver, CLASSES_PATH, LIB_PATH};
use crate::error::{Error, Result};
use crate::filter::{FileFilter, NoopFilter};
use crate::manager::{OverlayManager, ResolvedOverlay};
use crate::path_set::{normalize, PathSet};
use crate::structure::{Claim, WebappStructure};
use crate::utils::{copy_file, PathFilter};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;
use std::time::{Duration, Instant, SystemTime};
use walkdir::WalkDir;
use warpack_project::{WarProject, WebResource, CURRENT_BUILD_ID};

const WEB_XML_PATH: &str = "WEB-INF/web.xml";
const META_INF: &str = "META-INF";
const DEFAULT_OUTDATED_CHECK_PATH: &str = "WEB-INF/lib";

/// Summary returned after an assembly completes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReport {
    /// Root of the assembled webapp.
    pub output_dir: Utf8PathBuf,
    /// Number of paths registered across all overlays.
    pub registered_files: usize,
    /// Stale files from a previous build that were deleted.
    pub deleted_outdated: Vec<String>,
    /// Wall-clock time for the whole assembly.
    pub build_time: Duration,
}

impl PackageReport {
    /// Serialize the report for host tooling.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One step of the pipeline, selected by the resolved overlay list.
#[derive(Debug)]
enum PackagingTask {
    /// Web resources, webapp source tree and deployment descriptors.
    Project,
    /// Compiled classes, copied or archived into a library.
    Classes,
    /// Plain dependency artifacts routed by packaging type.
    Artifacts,
    /// One dependency overlay merged into the gaps left by earlier tasks.
    Overlay(ResolvedOverlay),
}

/// Everything a task needs, threaded through every call. The structure is
/// exclusively owned by the running build; there is exactly one writer.
pub(crate) struct PackagingContext<'a> {
    pub structure: &'a mut WebappStructure,
    pub output_dir: &'a Utf8Path,
    pub work_dir: &'a Utf8Path,
    pub archiver: &'a dyn Archiver,
    pub filter: &'a dyn FileFilter,
}

/// Assembles a webapp from the project build, its dependencies and its
/// overlays.
///
/// Create one with [`new`](Self::new), adjust it with the `with_*` methods,
/// then call [`package`](Self::package). The packager can be reused for
/// repeated incremental invocations; outdated files left over from earlier
/// runs are cleaned up automatically.
pub struct WarPackager {
    project: WarProject,
    webapp_source_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
    work_dir: Utf8PathBuf,
    classes_dir: Option<Utf8PathBuf>,
    web_xml: Option<Utf8PathBuf>,
    container_descriptor: Option<Utf8PathBuf>,
    fail_on_missing_web_xml: bool,
    filter_descriptors: bool,
    include_empty_directories: bool,
    archive_classes: bool,
    includes: Vec<String>,
    excludes: Vec<String>,
    overlay_includes: Vec<String>,
    overlay_excludes: Vec<String>,
    outdated_check_path: String,
    archiver: Box<dyn Archiver>,
    filter: Box<dyn FileFilter>,
    final_names: Box<dyn FinalNameResolver>,
}

impl WarPackager {
    /// Create a packager.
    ///
    /// # Arguments
    ///
    /// * `webapp_source_dir` — the project's webapp source tree.
    /// * `output_dir` — where the assembled webapp is written.
    /// * `work_dir` — scratch space for overlay extraction and staged
    ///   archives; reused across invocations to avoid re-extraction.
    pub fn new(
        project: WarProject,
        webapp_source_dir: impl Into<Utf8PathBuf>,
        output_dir: impl Into<Utf8PathBuf>,
        work_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            project,
            webapp_source_dir: webapp_source_dir.into(),
            output_dir: output_dir.into(),
            work_dir: work_dir.into(),
            classes_dir: None,
            web_xml: None,
            container_descriptor: None,
            fail_on_missing_web_xml: true,
            filter_descriptors: false,
            include_empty_directories: false,
            archive_classes: false,
            includes: Vec::new(),
            excludes: Vec::new(),
            overlay_includes: warpack_project::default_overlay_includes(),
            overlay_excludes: warpack_project::default_overlay_excludes(),
            outdated_check_path: DEFAULT_OUTDATED_CHECK_PATH.to_string(),
            archiver: Box::new(ZipArchiver),
            filter: Box::new(NoopFilter),
            final_names: Box::new(DefaultFinalNameResolver),
        }
    }

    /// Directory of compiled classes to place under `WEB-INF/classes`.
    pub fn with_classes_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.classes_dir = Some(dir.into());
        self
    }

    /// Explicit deployment descriptor source. Defaults to
    /// `WEB-INF/web.xml` inside the webapp source tree.
    pub fn with_web_xml(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.web_xml = Some(path.into());
        self
    }

    /// Container-specific descriptor, placed under `META-INF/` with its own
    /// file name.
    pub fn with_container_descriptor(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.container_descriptor = Some(path.into());
        self
    }

    /// Whether a missing deployment descriptor fails the build (default
    /// true).
    pub fn with_fail_on_missing_web_xml(mut self, fail: bool) -> Self {
        self.fail_on_missing_web_xml = fail;
        self
    }

    /// Run the deployment descriptors through the filtering collaborator.
    pub fn with_filter_descriptors(mut self, filter: bool) -> Self {
        self.filter_descriptors = filter;
        self
    }

    /// Recreate empty directories of the webapp source tree in the output.
    pub fn with_include_empty_directories(mut self, include: bool) -> Self {
        self.include_empty_directories = include;
        self
    }

    /// Package the classes directory into a library under `WEB-INF/lib`
    /// instead of copying the class tree.
    pub fn with_archive_classes(mut self, archive: bool) -> Self {
        self.archive_classes = archive;
        self
    }

    /// Global include/exclude patterns for the webapp source tree.
    pub fn with_source_patterns(mut self, includes: Vec<String>, excludes: Vec<String>) -> Self {
        self.includes = includes;
        self.excludes = excludes;
        self
    }

    /// Default include/exclude patterns applied to implicit overlays.
    pub fn with_overlay_defaults(mut self, includes: Vec<String>, excludes: Vec<String>) -> Self {
        self.overlay_includes = includes;
        self.overlay_excludes = excludes;
        self
    }

    /// Scope of the outdated-file cleanup (default `WEB-INF/lib`; `/` means
    /// the whole output tree).
    pub fn with_outdated_check_path(mut self, path: impl Into<String>) -> Self {
        self.outdated_check_path = path.into();
        self
    }

    pub fn with_archiver(mut self, archiver: Box<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_filter(mut self, filter: Box<dyn FileFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_final_name_resolver(mut self, resolver: Box<dyn FinalNameResolver>) -> Self {
        self.final_names = resolver;
        self
    }

    /// Run the full pipeline. See module-level docs for the algorithm.
    pub fn package(&mut self) -> Result<PackageReport> {
        let start_time = Instant::now();
        let build_start = SystemTime::now();

        tracing::info!(
            "Assembling webapp [{}] in {}",
            self.project.name,
            self.output_dir
        );
        self.project.validate()?;
        fs::create_dir_all(self.output_dir.as_std_path())?;
        fs::create_dir_all(self.work_dir.as_std_path())?;

        let manager = OverlayManager::resolve(
            &self.project.overlays,
            &self.project.dependencies,
            &self.overlay_includes,
            &self.overlay_excludes,
        )?;

        let mut structure = WebappStructure::new(&manager.ids(), self.project.dependencies.clone());
        structure.scan_outdated(&self.output_dir, &self.outdated_check_path, build_start);

        let tasks = self.build_tasks(&manager);
        let mut ctx = PackagingContext {
            structure: &mut structure,
            output_dir: &self.output_dir,
            work_dir: &self.work_dir,
            archiver: self.archiver.as_ref(),
            filter: self.filter.as_ref(),
        };
        for task in &tasks {
            self.run_task(task, &mut ctx)?;
        }

        // A descriptor contributed by an overlay satisfies the requirement,
        // so the check runs after the whole pipeline.
        if self.fail_on_missing_web_xml && !ctx.structure.is_registered(WEB_XML_PATH) {
            return Err(Error::MissingDescriptor(
                self.web_xml
                    .clone()
                    .unwrap_or_else(|| self.webapp_source_dir.join(WEB_XML_PATH)),
            ));
        }
        drop(ctx);

        let deleted = structure.delete_outdated(&self.output_dir);
        let report = PackageReport {
            output_dir: self.output_dir.clone(),
            registered_files: structure.full_structure().len(),
            deleted_outdated: deleted,
            build_time: start_time.elapsed(),
        };
        tracing::info!(
            "Webapp assembled: {} file(s), {} outdated deleted",
            report.registered_files,
            report.deleted_outdated.len()
        );
        Ok(report)
    }

    fn build_tasks(&self, manager: &OverlayManager) -> Vec<PackagingTask> {
        let mut tasks = Vec::new();
        for resolved in manager.overlays() {
            if resolved.overlay.is_current_project() {
                tasks.push(PackagingTask::Project);
                tasks.push(PackagingTask::Classes);
                tasks.push(PackagingTask::Artifacts);
            } else {
                tasks.push(PackagingTask::Overlay(resolved.clone()));
            }
        }
        tasks
    }

    fn run_task(&self, task: &PackagingTask, ctx: &mut PackagingContext<'_>) -> Result<()> {
        match task {
            PackagingTask::Project => self.package_project(ctx),
            PackagingTask::Classes => self.package_classes(ctx),
            PackagingTask::Artifacts => artifacts::package_artifacts(
                ctx,
                &self.project.dependencies,
                self.final_names.as_ref(),
            ),
            PackagingTask::Overlay(resolved) => self.package_overlay(ctx, resolved),
        }
    }

    fn package_project(&self, ctx: &mut PackagingContext<'_>) -> Result<()> {
        for resource in &self.project.web_resources {
            self.copy_web_resource(ctx, resource)?;
        }
        self.copy_webapp_sources(ctx)?;
        self.handle_descriptors(ctx)?;
        Ok(())
    }

    fn copy_web_resource(
        &self,
        ctx: &mut PackagingContext<'_>,
        resource: &WebResource,
    ) -> Result<()> {
        if resource.directory == self.output_dir {
            tracing::warn!(
                "Web resource directory {} is the output directory, skipping",
                resource.directory
            );
            return Ok(());
        }
        if !resource.directory.as_std_path().is_dir() {
            tracing::warn!("Web resource directory {} does not exist", resource.directory);
            return Ok(());
        }

        let filter = PathFilter::new(&resource.includes, &resource.excludes)?;
        let mut paths = PathSet::new();
        paths.add_files_in_directory(&resource.directory, "")?;

        for rel in paths.iter() {
            if !filter.matches(rel) {
                continue;
            }
            let dest_rel = match resource.target_path.as_deref() {
                Some(prefix) => normalize(&format!("{prefix}/{rel}")),
                None => rel.to_string(),
            };
            self.copy_claimed(
                ctx,
                CURRENT_BUILD_ID,
                &resource.directory.join(rel),
                &dest_rel,
                resource.filtered,
            )?;
        }
        Ok(())
    }

    fn copy_webapp_sources(&self, ctx: &mut PackagingContext<'_>) -> Result<()> {
        if !self.webapp_source_dir.as_std_path().is_dir() {
            tracing::debug!(
                "Webapp source directory {} does not exist",
                self.webapp_source_dir
            );
            return Ok(());
        }

        let filter = PathFilter::new(&self.includes, &self.excludes)?;
        let mut paths = PathSet::new();
        paths.add_files_in_directory(&self.webapp_source_dir, "")?;

        for rel in paths.iter() {
            // the descriptor step owns web.xml and force-registers it
            if rel == WEB_XML_PATH {
                continue;
            }
            if !filter.matches(rel) {
                continue;
            }
            self.copy_claimed(
                ctx,
                CURRENT_BUILD_ID,
                &self.webapp_source_dir.join(rel),
                rel,
                false,
            )?;
        }

        if self.include_empty_directories {
            for entry in WalkDir::new(self.webapp_source_dir.as_std_path()) {
                let entry = entry?;
                if !entry.file_type().is_dir() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(self.webapp_source_dir.as_std_path())
                    .unwrap_or(entry.path());
                let Some(rel) = rel.to_str() else { continue };
                let rel = normalize(rel);
                if rel.is_empty() || !filter.matches(&rel) {
                    continue;
                }
                fs::create_dir_all(ctx.output_dir.join(rel).as_std_path())?;
            }
        }
        Ok(())
    }

    fn handle_descriptors(&self, ctx: &mut PackagingContext<'_>) -> Result<()> {
        let web_xml_source = self
            .web_xml
            .clone()
            .unwrap_or_else(|| self.webapp_source_dir.join(WEB_XML_PATH));
        if web_xml_source.as_std_path().is_file() {
            if ctx.structure.register_file_forced(CURRENT_BUILD_ID, WEB_XML_PATH) {
                tracing::debug!("{WEB_XML_PATH} reclaimed from an overlay");
            }
            self.write_file(ctx, &web_xml_source, WEB_XML_PATH, self.filter_descriptors)?;
        } else {
            tracing::debug!("No deployment descriptor at {web_xml_source}");
        }

        if let Some(descriptor) = &self.container_descriptor {
            if descriptor.as_std_path().is_file() {
                let name = descriptor.file_name().ok_or_else(|| {
                    Error::Other(format!("container descriptor has no file name: {descriptor}"))
                })?;
                let dest_rel = format!("{META_INF}/{name}");
                ctx.structure.register_file_forced(CURRENT_BUILD_ID, &dest_rel);
                self.write_file(ctx, descriptor, &dest_rel, self.filter_descriptors)?;
            } else if self.fail_on_missing_web_xml {
                return Err(Error::MissingDescriptor(descriptor.clone()));
            } else {
                tracing::debug!("Container descriptor {descriptor} missing, skipping");
            }
        }
        Ok(())
    }

    fn package_classes(&self, ctx: &mut PackagingContext<'_>) -> Result<()> {
        let Some(classes_dir) = &self.classes_dir else {
            return Ok(());
        };
        if !classes_dir.as_std_path().is_dir()
            || fs::read_dir(classes_dir.as_std_path())?.next().is_none()
        {
            tracing::debug!("No classes to package in {classes_dir}");
            return Ok(());
        }

        if self.archive_classes {
            let jar_name = format!("{}-{}.jar", self.project.name, self.project.version);
            tracing::info!("Archiving classes into {jar_name}");
            let staged = ctx.work_dir.join(&jar_name);
            ctx.archiver.create(classes_dir, &staged)?;
            self.copy_claimed(
                ctx,
                CURRENT_BUILD_ID,
                &staged,
                &format!("{LIB_PATH}/{jar_name}"),
                false,
            )?;
        } else {
            let mut paths = PathSet::new();
            paths.add_files_in_directory(classes_dir, "")?;
            for rel in paths.iter() {
                self.copy_claimed(
                    ctx,
                    CURRENT_BUILD_ID,
                    &classes_dir.join(rel),
                    &format!("{CLASSES_PATH}/{rel}"),
                    false,
                )?;
            }
        }
        Ok(())
    }

    fn package_overlay(
        &self,
        ctx: &mut PackagingContext<'_>,
        resolved: &ResolvedOverlay,
    ) -> Result<()> {
        let overlay = &resolved.overlay;
        let id = resolved.id();
        if overlay.skip {
            tracing::info!("Skipping overlay [{id}]");
            return Ok(());
        }
        let Some(artifact) = &resolved.artifact else {
            return Err(Error::Other(format!("overlay [{id}] has no backing artifact")));
        };

        let extract_dir = ctx.work_dir.join(work_dir_name(&id));
        if needs_extraction(&artifact.file, &extract_dir)? {
            tracing::info!("Extracting overlay [{id}] to {extract_dir}");
            if extract_dir.as_std_path().exists() {
                fs::remove_dir_all(extract_dir.as_std_path())?;
            }
            ctx.archiver.extract(&artifact.file, &extract_dir)?;
        } else {
            tracing::debug!("Overlay [{id}] already extracted");
        }

        let filter = PathFilter::new(&overlay.includes, &overlay.excludes)?;
        let mut paths = PathSet::new();
        paths.add_files_in_directory(&extract_dir, "")?;

        for rel in paths.iter() {
            if !filter.matches(rel) {
                continue;
            }
            let dest_rel = match overlay.target_path.as_deref() {
                Some(prefix) => normalize(&format!("{prefix}/{rel}")),
                None => rel.to_string(),
            };
            self.copy_claimed(ctx, &id, &extract_dir.join(rel), &dest_rel, overlay.filtered)?;
        }
        Ok(())
    }

    /// Claim `dest_rel` for `owner` and copy only on success. Conflicts are
    /// resolved silently in favor of whoever registered the path first.
    fn copy_claimed(
        &self,
        ctx: &mut PackagingContext<'_>,
        owner: &str,
        source: &Utf8Path,
        dest_rel: &str,
        filtered: bool,
    ) -> Result<()> {
        match ctx.structure.claim(owner, dest_rel) {
            Claim::Claimed => self.write_file(ctx, source, dest_rel, filtered),
            Claim::AlreadyOwned { owner: current } => {
                tracing::debug!("{dest_rel} already registered to [{current}], skipping");
                Ok(())
            }
        }
    }

    fn write_file(
        &self,
        ctx: &mut PackagingContext<'_>,
        source: &Utf8Path,
        dest_rel: &str,
        filtered: bool,
    ) -> Result<()> {
        let dest = ctx.output_dir.join(normalize(dest_rel));
        if filtered {
            ctx.filter.filter_copy(source, &dest)?;
        } else {
            copy_file(source, &dest)?;
        }
        ctx.structure.mark_current(dest_rel);
        Ok(())
    }
}

/// Work subdirectory for an overlay's extracted content, unique per overlay
/// id so repeated builds reuse the extraction.
fn work_dir_name(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            ':' | '/' | '\\' => '-',
            c => c,
        })
        .collect()
}

/// Re-extract when the archive is newer than the extraction directory.
fn needs_extraction(archive: &Utf8Path, extract_dir: &Utf8Path) -> Result<bool> {
    if !extract_dir.as_std_path().exists() {
        return Ok(true);
    }
    let archive_mtime = fs::metadata(archive.as_std_path())?.modified()?;
    let dir_mtime = fs::metadata(extract_dir.as_std_path())?.modified()?;
    Ok(archive_mtime > dir_mtime)
}
