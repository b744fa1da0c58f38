//! Normalized relative-path sets.
//!
//! Every path that enters the assembly engine goes through [`normalize`]
//! first, so membership queries, ownership tracking and outdated-file
//! bookkeeping all agree on what a path looks like: forward slashes only, no
//! leading or trailing slash, no empty components.

use crate::error::Result;
use camino::Utf8Path;
use std::collections::BTreeSet;
use walkdir::WalkDir;

/// Normalize a logical relative path.
///
/// Rules:
/// - `\` is treated as `/`
/// - runs of separators collapse to a single `/`
/// - leading and trailing separators are stripped
/// - the empty string maps to the empty string
///
/// Normalization is idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' || c == '\\' {
            if !out.ends_with('/') {
                out.push('/');
            }
        } else {
            out.push(c);
        }
    }
    out.trim_matches('/').to_string()
}

/// A set of normalized relative paths.
///
/// Insertion order is not significant; iteration is lexicographic and
/// deterministic. All queries normalize their argument before comparing, so
/// `contains("a/b")`, `contains("/a/b")` and `contains("a\\b")` are
/// equivalent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathSet {
    paths: BTreeSet<String>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.add_all(paths);
        set
    }

    /// Add a path; returns whether it was newly inserted.
    pub fn add(&mut self, path: &str) -> bool {
        self.paths.insert(normalize(path))
    }

    pub fn add_all<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.add(path.as_ref());
        }
    }

    /// Add every path with a directory prefix prepended.
    pub fn add_all_with_prefix<I, S>(&mut self, paths: I, prefix: &str)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            let joined = format!("{}/{}", prefix, normalize(path.as_ref()));
            self.add(&joined);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(&normalize(path))
    }

    /// Remove a path; returns whether it was present.
    pub fn remove(&mut self, path: &str) -> bool {
        self.paths.remove(&normalize(path))
    }

    /// Rewrite every member to `normalize(prefix + "/" + member)`.
    pub fn add_prefix(&mut self, prefix: &str) {
        let rewritten = self
            .paths
            .iter()
            .map(|p| normalize(&format!("{prefix}/{p}")))
            .collect();
        self.paths = rewritten;
    }

    /// Add every regular file under `dir`, as a path relative to `dir`, with
    /// `prefix` prepended. Non-UTF-8 entries are skipped with a warning.
    pub fn add_files_in_directory(&mut self, dir: &Utf8Path, prefix: &str) -> Result<()> {
        if !dir.as_std_path().exists() {
            return Ok(());
        }
        for entry in WalkDir::new(dir.as_std_path()) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(dir.as_std_path()).unwrap_or(entry.path());
            let Some(rel) = rel.to_str() else {
                tracing::warn!("Skipping non-UTF-8 path: {}", rel.display());
                continue;
            };
            if prefix.is_empty() {
                self.add(rel);
            } else {
                self.add(&format!("{prefix}/{rel}"));
            }
        }
        Ok(())
    }

    pub fn extend_from(&mut self, other: &PathSet) {
        for path in &other.paths {
            self.paths.insert(path.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_slash_agnostic() {
        assert_eq!(normalize("a\\b//c/"), "a/b/c");
        assert_eq!(normalize("/a/b/c"), "a/b/c");
        assert_eq!(normalize("a/b/c"), "a/b/c");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("\\\\"), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in ["a\\b//c/", "/x/y", "", "single", "//a//"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_contains_is_normalization_invariant() {
        let mut set = PathSet::new();
        set.add("a/b/c");

        assert!(set.contains("a/b/c"));
        assert!(set.contains("/a/b/c"));
        assert!(set.contains("a\\b\\c"));
        assert!(!set.contains("a/b/c/x"));
        assert!(!set.contains("y/a/b/c"));
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut set = PathSet::new();
        set.add("a/b");
        assert!(set.remove("/a/b/"));
        assert!(!set.remove("a/b"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_add_all_with_prefix() {
        let mut set = PathSet::new();
        set.add_all_with_prefix(["x.jsp", "/sub/y.jsp"], "WEB-INF");
        assert!(set.contains("WEB-INF/x.jsp"));
        assert!(set.contains("WEB-INF/sub/y.jsp"));
    }

    #[test]
    fn test_add_prefix_composes_without_double_slashes() {
        let mut set = PathSet::from_paths(["a.txt", "d/b.txt"]);
        set.add_prefix("one/");
        set.add_prefix("/two");

        let paths: Vec<&str> = set.iter().collect();
        assert_eq!(paths, vec!["two/one/a.txt", "two/one/d/b.txt"]);
        assert!(paths.iter().all(|p| !p.contains("//")));

        let mut direct = PathSet::from_paths(["a.txt", "d/b.txt"]);
        direct.add_prefix("two/one");
        assert_eq!(set, direct);
    }

    #[test]
    fn test_add_files_in_directory() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::write(root.join("a.jsp"), "a").unwrap();
        fs::create_dir_all(root.join("WEB-INF").as_std_path()).unwrap();
        fs::write(root.join("WEB-INF/web.xml"), "<web-app/>").unwrap();

        let mut set = PathSet::new();
        set.add_files_in_directory(&root, "").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("a.jsp"));
        assert!(set.contains("WEB-INF/web.xml"));

        let mut prefixed = PathSet::new();
        prefixed.add_files_in_directory(&root, "app").unwrap();
        assert!(prefixed.contains("app/a.jsp"));
    }

    #[test]
    fn test_add_files_in_missing_directory_is_empty() {
        let mut set = PathSet::new();
        set.add_files_in_directory(Utf8Path::new("/does/not/exist"), "")
            .unwrap();
        assert!(set.is_empty());
    }
}
