//! File copy and include/exclude matching utilities.

use crate::error::Result;
use crate::path_set::normalize;
use camino::Utf8Path;
use glob::{MatchOptions, Pattern};
use std::fs;

/// Copy `source` to `dest`, creating parent directories and preserving the
/// source modification time (best effort; a failure to carry the timestamp
/// over is not an error).
pub(crate) fn copy_file(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent.as_std_path())?;
    }
    fs::copy(source.as_std_path(), dest.as_std_path())?;
    preserve_mtime(source, dest);
    Ok(())
}

fn preserve_mtime(source: &Utf8Path, dest: &Utf8Path) {
    let Ok(modified) = fs::metadata(source.as_std_path()).and_then(|m| m.modified()) else {
        return;
    };
    let Ok(file) = fs::OpenOptions::new().write(true).open(dest.as_std_path()) else {
        return;
    };
    let _ = file.set_modified(modified);
}

fn match_options() -> MatchOptions {
    let mut options = MatchOptions::new();
    options.require_literal_separator = true;
    options
}

/// Compiled include/exclude patterns over normalized relative paths.
///
/// Patterns use glob syntax with `**` spanning directories. Two conveniences
/// match what build tools usually expect:
/// - a pattern starting with `**/` also matches its bare suffix
///   (`**/web.xml` matches `web.xml` at the root)
/// - a pattern ending with `/` selects the whole subtree (`WEB-INF/` is
///   `WEB-INF/**`)
///
/// Empty include lists select everything.
#[derive(Debug)]
pub struct PathFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        let includes = if includes.is_empty() {
            vec![Pattern::new("**")?]
        } else {
            Self::compile(includes)?
        };
        Ok(Self {
            includes,
            excludes: Self::compile(excludes)?,
        })
    }

    fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
        let mut compiled = Vec::new();
        for raw in patterns {
            let mut pattern = normalize(raw);
            if raw.ends_with('/') || raw.ends_with('\\') {
                pattern.push_str("/**");
            }
            if let Some(suffix) = pattern.strip_prefix("**/") {
                compiled.push(Pattern::new(suffix)?);
            }
            compiled.push(Pattern::new(&pattern)?);
        }
        Ok(compiled)
    }

    /// Whether the path is selected: matched by an include pattern and by no
    /// exclude pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        let options = match_options();
        self.includes.iter().any(|p| p.matches_with(&path, options))
            && !self.excludes.iter().any(|p| p.matches_with(&path, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::tempdir;

    fn filter(includes: &[&str], excludes: &[&str]) -> PathFilter {
        let includes: Vec<String> = includes.iter().map(ToString::to_string).collect();
        let excludes: Vec<String> = excludes.iter().map(ToString::to_string).collect();
        PathFilter::new(&includes, &excludes).unwrap()
    }

    #[test]
    fn test_empty_includes_select_everything() {
        let f = filter(&[], &[]);
        assert!(f.matches("index.jsp"));
        assert!(f.matches("WEB-INF/classes/App.class"));
    }

    #[test]
    fn test_recursive_include() {
        let f = filter(&["**/*.jsp"], &[]);
        assert!(f.matches("index.jsp"));
        assert!(f.matches("pages/deep/index.jsp"));
        assert!(!f.matches("pages/style.css"));
    }

    #[test]
    fn test_star_does_not_cross_separators() {
        let f = filter(&["*.jsp"], &[]);
        assert!(f.matches("index.jsp"));
        assert!(!f.matches("pages/index.jsp"));
    }

    #[test]
    fn test_excludes_win() {
        let f = filter(&["**"], &["META-INF/MANIFEST.MF", "**/*.bak"]);
        assert!(f.matches("index.jsp"));
        assert!(!f.matches("META-INF/MANIFEST.MF"));
        assert!(!f.matches("a/b/old.bak"));
        assert!(!f.matches("old.bak"));
    }

    #[test]
    fn test_trailing_slash_selects_subtree() {
        let f = filter(&["WEB-INF/"], &[]);
        assert!(f.matches("WEB-INF/web.xml"));
        assert!(f.matches("WEB-INF/lib/a.jar"));
        assert!(!f.matches("index.jsp"));
    }

    #[test]
    fn test_copy_file_creates_parents() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = root.join("src.txt");
        fs::write(source.as_std_path(), "payload").unwrap();

        let dest = root.join("deep/nested/dst.txt");
        copy_file(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.as_std_path()).unwrap(), "payload");
    }
}
