//! WAR overlay resolution and webapp assembly engine.
//!
//! This crate merges a project's webapp sources, compiled classes, dependency
//! artifacts and WAR overlays into a single exploded webapp directory. It
//! supports:
//!
//! - **Ordered overlays**: Earlier sources win every path conflict
//! - **First-writer-wins tracking**: A [`WebappStructure`] records which
//!   overlay owns every path
//! - **Incremental rebuilds**: Overlay extractions are reused and stale
//!   output files are cleaned up between runs
//! - **Artifact routing**: Plain dependencies are copied into the right
//!   `WEB-INF` subdirectory by packaging type
//! - **Resource filtering**: Property substitution for filtered resources
//!   and descriptors
//!
//! # Example
//!
//! ```no_run
//! use warpack_overlay::{WarPackager, WarProject};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let project = WarProject::new("shop", "1.0.0");
//!
//! let mut packager = WarPackager::new(
//!     project,
//!     "src/main/webapp",
//!     "target/shop-1.0.0",
//!     "target/war/work",
//! )
//! .with_classes_dir("target/classes");
//!
//! let report = packager.package()?;
//! println!(
//!     "assembled {} files, deleted {} outdated",
//!     report.registered_files,
//!     report.deleted_outdated.len()
//! );
//! # Ok(())
//! # }
//! ```

pub mod archive;
mod artifacts;
pub mod error;
pub mod filter;
pub mod manager;
pub mod path_set;
pub mod pipeline;
pub mod structure;
mod utils;

// Re-export main types
pub use archive::{Archiver, ZipArchiver};
pub use artifacts::{DefaultFinalNameResolver, FinalNameResolver};
pub use error::{Error, Result};
pub use filter::{FileFilter, NoopFilter, PropertyFilter};
pub use manager::{OverlayManager, ResolvedOverlay};
pub use path_set::{normalize, PathSet};
pub use pipeline::{PackageReport, WarPackager};
pub use structure::{Claim, DependencyRecord, RegistrationCallback, WebappStructure};
pub use utils::PathFilter;

// The project model crate, re-exported for convenience.
pub use warpack_project::{
    Artifact, ArtifactScope, Overlay, WarProject, WebResource, CURRENT_BUILD_ID,
};
