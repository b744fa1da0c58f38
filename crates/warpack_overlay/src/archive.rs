//! Archive collaborator.
//!
//! Extraction and creation of archives is opaque to the assembly engine: the
//! overlay task only needs "give me this archive's content as a directory"
//! and the classes task only needs "turn this directory into a library". The
//! default [`ZipArchiver`] covers war/zip/jar, which share the zip container
//! format.

use crate::error::{Error, Result};
use camino::Utf8Path;
use std::fs::{self, File};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Reads and writes archive files.
pub trait Archiver {
    /// Extract the full content of `archive` under `target_dir`.
    fn extract(&self, archive: &Utf8Path, target_dir: &Utf8Path) -> Result<()>;

    /// Create an archive at `dest` from every file under `source_dir`.
    fn create(&self, source_dir: &Utf8Path, dest: &Utf8Path) -> Result<()>;
}

/// Zip-based archiver for war, zip and jar files.
#[derive(Debug, Default)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn extract(&self, archive: &Utf8Path, target_dir: &Utf8Path) -> Result<()> {
        let file = File::open(archive.as_std_path())?;
        let mut zip = ZipArchive::new(file)?;
        fs::create_dir_all(target_dir.as_std_path())?;
        zip.extract(target_dir.as_std_path())?;
        Ok(())
    }

    fn create(&self, source_dir: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        let file = File::create(dest.as_std_path())?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in WalkDir::new(source_dir.as_std_path()).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(source_dir.as_std_path())
                .map_err(|_| {
                    Error::Other(format!("entry outside archive source: {}", entry.path().display()))
                })?;
            let Some(rel) = rel.to_str() else {
                tracing::warn!("Skipping non-UTF-8 path: {}", rel.display());
                continue;
            };
            writer.start_file(rel.replace('\\', "/"), options)?;
            let mut source = File::open(entry.path())?;
            std::io::copy(&mut source, &mut writer)?;
        }

        writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_extract() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        let content = root.join("content");
        fs::create_dir_all(content.join("WEB-INF").as_std_path()).unwrap();
        fs::write(content.join("index.jsp").as_std_path(), "<html/>").unwrap();
        fs::write(content.join("WEB-INF/web.xml").as_std_path(), "<web-app/>").unwrap();

        let archiver = ZipArchiver;
        let war = root.join("app.war");
        archiver.create(&content, &war).unwrap();

        let extracted = root.join("extracted");
        archiver.extract(&war, &extracted).unwrap();

        assert_eq!(
            fs::read_to_string(extracted.join("index.jsp").as_std_path()).unwrap(),
            "<html/>"
        );
        assert_eq!(
            fs::read_to_string(extracted.join("WEB-INF/web.xml").as_std_path()).unwrap(),
            "<web-app/>"
        );
    }

    #[test]
    fn test_extract_missing_archive_fails() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let err = ZipArchiver.extract(&root.join("missing.war"), &root.join("out"));
        assert!(err.is_err());
    }
}
