//! Resource filtering collaborator.
//!
//! Filtering is an opaque capability from the engine's point of view: when a
//! web resource, overlay or deployment descriptor is flagged as filtered, the
//! configured [`FileFilter`] performs the copy instead of a byte-for-byte
//! one. The crate ships a token-substituting [`PropertyFilter`] and a
//! pass-through [`NoopFilter`]; host build tools with richer templating plug
//! in their own implementation.

use crate::error::{Error, Result};
use crate::utils::copy_file;
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::fs;

/// Copies a file while applying property substitution.
pub trait FileFilter {
    fn filter_copy(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<()>;
}

/// Pass-through filter: copies files verbatim.
///
/// The default collaborator, so flagging a resource as filtered without
/// configuring a real filter degrades to a plain copy.
#[derive(Debug, Default)]
pub struct NoopFilter;

impl FileFilter for NoopFilter {
    fn filter_copy(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        copy_file(source, dest)
    }
}

/// Substitutes `${key}` and `@key@` tokens from a property map.
///
/// Only UTF-8 text sources are supported; a non-text source flagged as
/// filtered is a [`Error::Filter`] failure. Unknown tokens are left
/// untouched.
#[derive(Debug, Default)]
pub struct PropertyFilter {
    properties: BTreeMap<String, String>,
    delimiters: Vec<(String, String)>,
}

impl PropertyFilter {
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self {
            properties,
            delimiters: vec![
                ("${".to_string(), "}".to_string()),
                ("@".to_string(), "@".to_string()),
            ],
        }
    }

    /// Replace the default `${}`/`@@` token delimiters.
    pub fn with_delimiters(mut self, delimiters: Vec<(String, String)>) -> Self {
        self.delimiters = delimiters;
        self
    }

    fn substitute(&self, input: &str) -> String {
        let mut output = input.to_string();
        for (key, value) in &self.properties {
            for (start, end) in &self.delimiters {
                output = output.replace(&format!("{start}{key}{end}"), value);
            }
        }
        output
    }
}

impl FileFilter for PropertyFilter {
    fn filter_copy(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        let text = fs::read_to_string(source.as_std_path())
            .map_err(|e| Error::Filter(format!("cannot read {source} as text: {e}")))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        fs::write(dest.as_std_path(), self.substitute(&text))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::tempdir;

    fn properties(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitution_both_delimiters() {
        let filter = PropertyFilter::new(properties(&[("app.name", "shop"), ("env", "prod")]));
        assert_eq!(
            filter.substitute("<display-name>${app.name} (@env@)</display-name>"),
            "<display-name>shop (prod)</display-name>"
        );
    }

    #[test]
    fn test_unknown_tokens_are_left_alone() {
        let filter = PropertyFilter::new(properties(&[]));
        assert_eq!(filter.substitute("${missing}"), "${missing}");
    }

    #[test]
    fn test_filter_copy_writes_substituted_file() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = root.join("web.xml");
        std::fs::write(source.as_std_path(), "<web-app id=\"${id}\"/>").unwrap();

        let filter = PropertyFilter::new(properties(&[("id", "shop")]));
        let dest = root.join("out/web.xml");
        filter.filter_copy(&source, &dest).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.as_std_path()).unwrap(),
            "<web-app id=\"shop\"/>"
        );
    }

    #[test]
    fn test_binary_source_is_a_filter_error() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = root.join("blob.bin");
        std::fs::write(source.as_std_path(), [0u8, 159, 146, 150]).unwrap();

        let filter = PropertyFilter::new(properties(&[]));
        let err = filter.filter_copy(&source, &root.join("out.bin")).unwrap_err();
        assert!(matches!(err, Error::Filter(_)));
    }
}
