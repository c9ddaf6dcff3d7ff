//! Test file discovery.
//!
//! Lists the plugin test directory and the installer-script test directory
//! (non-recursively, like a `dir/*test*.rb` glob), sorts each listing and
//! concatenates them into one [`TestFileSet`].

use crate::error::{SuiteError, SuiteResult};
use crate::models::TestFileSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Predicate deciding whether a file name marks a test file.
///
/// Matches the glob `*<substring>*.<extension>`: the name minus its
/// extension must contain the substring. Hidden files never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFilePattern {
    substring: String,
    extension: String,
}

impl TestFilePattern {
    pub fn new(substring: &str, extension: &str) -> Self {
        Self {
            substring: substring.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Check a path's file name against the pattern. Names that are not
    /// valid UTF-8 are matched on their lossy form.
    pub fn is_test_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };

        if name.starts_with('.') {
            return false;
        }

        let suffix = format!(".{}", self.extension);
        match name.strip_suffix(suffix.as_str()) {
            Some(stem) => stem.contains(self.substring.as_str()),
            None => false,
        }
    }
}

impl Default for TestFilePattern {
    fn default() -> Self {
        Self::new("test", "rb")
    }
}

/// The two directories searched for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRoots {
    pub plugins_dir: PathBuf,
    pub scripts_dir: PathBuf,
}

impl DiscoveryRoots {
    /// Build the roots from the plugin directory and the base directory;
    /// script tests live in `scripts_subdir` below the base.
    pub fn new(plugins_dir: &Path, base_dir: &Path, scripts_subdir: &str) -> Self {
        Self {
            plugins_dir: plugins_dir.to_path_buf(),
            scripts_dir: base_dir.join(scripts_subdir),
        }
    }
}

/// Directory lister producing the ordered test file set.
#[derive(Debug, Clone)]
pub struct TestScanner {
    pattern: TestFilePattern,
    strict: bool,
}

impl TestScanner {
    /// Create a scanner. With `strict` unset a missing directory yields no
    /// files instead of an error.
    pub fn new(pattern: TestFilePattern, strict: bool) -> Self {
        Self { pattern, strict }
    }

    /// Plugin tests (sorted) followed by script tests (sorted).
    pub fn discover(&self, roots: &DiscoveryRoots) -> SuiteResult<TestFileSet> {
        let plugin_files = self.list_matching(&roots.plugins_dir)?;
        let script_files = self.list_matching(&roots.scripts_dir)?;

        debug!(
            "Discovered {} plugin and {} script test files",
            plugin_files.len(),
            script_files.len()
        );

        Ok(TestFileSet::concat(plugin_files, script_files))
    }

    /// Sorted matching files directly inside `dir`.
    pub fn list_matching(&self, dir: &Path) -> SuiteResult<Vec<PathBuf>> {
        if !dir.exists() {
            if self.strict {
                return Err(SuiteError::DirectoryNotFound(dir.to_path_buf()));
            }
            warn!("Test directory not found, skipping: {}", dir.display());
            return Ok(Vec::new());
        }

        if !dir.is_dir() {
            if self.strict {
                return Err(SuiteError::NotADirectory(dir.to_path_buf()));
            }
            warn!("Not a directory, skipping: {}", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(dir).min_depth(1).max_depth(1);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // One bad entry does not make the directory unreadable.
                Err(err) if err.path().is_some_and(|p| p != dir) => {
                    warn!("Skipping unreadable entry: {}", err);
                    continue;
                }
                Err(source) => {
                    return Err(SuiteError::Unreadable {
                        path: dir.to_path_buf(),
                        source,
                    })
                }
            };

            // Match the name before resolving anything.
            if !self.pattern.is_test_file(entry.path()) {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_file() {
                files.push(entry.into_path());
            } else if file_type.is_symlink() {
                match std::fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => files.push(entry.into_path()),
                    Ok(_) => {}
                    Err(e) => {
                        // Kept so the run reports it, as a shell glob would.
                        warn!("Broken link to test file {}: {}", entry.path().display(), e);
                        files.push(entry.into_path());
                    }
                }
            }
        }

        // Byte-wise ordering of the full path string.
        files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestOrigin;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    fn layout() -> (TempDir, DiscoveryRoots) {
        let tmp = tempfile::tempdir().unwrap();
        let plugins = tmp.path().join("plugins");
        let base = tmp.path().join("base");
        fs::create_dir_all(&plugins).unwrap();
        fs::create_dir_all(base.join("test/installer/scripts")).unwrap();
        let roots = DiscoveryRoots::new(&plugins, &base, "test/installer/scripts");
        (tmp, roots)
    }

    fn names(set: &TestFileSet) -> Vec<String> {
        set.iter().map(|f| f.display_name()).collect()
    }

    #[test]
    fn test_pattern_matches_glob() {
        let pattern = TestFilePattern::default();
        assert!(pattern.is_test_file(Path::new("a_test.rb")));
        assert!(pattern.is_test_file(Path::new("test.rb")));
        assert!(pattern.is_test_file(Path::new("dir/test_helper_spec.rb")));
        assert!(pattern.is_test_file(Path::new("contest.rb")));
        assert!(!pattern.is_test_file(Path::new("a_test.py")));
        assert!(!pattern.is_test_file(Path::new("helper.rb")));
        assert!(!pattern.is_test_file(Path::new("a_test.rb.bak")));
        assert!(!pattern.is_test_file(Path::new(".hidden_test.rb")));
    }

    #[test]
    fn test_pattern_extension_with_dot() {
        let pattern = TestFilePattern::new("spec", ".py");
        assert!(pattern.is_test_file(Path::new("x_spec.py")));
        assert!(!pattern.is_test_file(Path::new("x_test.py")));
    }

    #[test]
    fn test_discover_orders_plugins_then_scripts() {
        let (_tmp, roots) = layout();
        touch(&roots.plugins_dir, "b_test.rb");
        touch(&roots.plugins_dir, "a_test.rb");
        touch(&roots.scripts_dir, "z_test.rb");

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        let set = scanner.discover(&roots).unwrap();

        assert_eq!(names(&set), vec!["a_test.rb", "b_test.rb", "z_test.rb"]);
        assert_eq!(set.count_from(TestOrigin::Plugin), 2);
        assert_eq!(set.count_from(TestOrigin::Script), 1);
    }

    #[test]
    fn test_discover_never_interleaves() {
        let (_tmp, roots) = layout();
        touch(&roots.plugins_dir, "m_test.rb");
        touch(&roots.plugins_dir, "z_test.rb");
        touch(&roots.scripts_dir, "a_test.rb");
        touch(&roots.scripts_dir, "n_test.rb");

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        let set = scanner.discover(&roots).unwrap();

        assert_eq!(
            names(&set),
            vec!["m_test.rb", "z_test.rb", "a_test.rb", "n_test.rb"]
        );
        let paths: Vec<_> = set.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths[0], roots.plugins_dir.join("m_test.rb"));
        assert_eq!(paths[2], roots.scripts_dir.join("a_test.rb"));
    }

    #[test]
    fn test_discover_is_idempotent() {
        let (_tmp, roots) = layout();
        for name in ["c_test.rb", "a_test.rb", "b_test.rb"] {
            touch(&roots.plugins_dir, name);
        }
        touch(&roots.scripts_dir, "x_test.rb");

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        let first = scanner.discover(&roots).unwrap();
        let second = scanner.discover(&roots).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_discover_skips_non_matching_and_nested() {
        let (_tmp, roots) = layout();
        touch(&roots.plugins_dir, "helper.rb");
        touch(&roots.plugins_dir, "README.md");
        touch(&roots.plugins_dir, ".x_test.rb");
        fs::create_dir_all(roots.plugins_dir.join("dir_test.rb")).unwrap();
        fs::create_dir_all(roots.plugins_dir.join("nested")).unwrap();
        touch(&roots.plugins_dir.join("nested"), "deep_test.rb");

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        let set = scanner.discover(&roots).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_directory_strict() {
        let tmp = tempfile::tempdir().unwrap();
        let plugins = tmp.path().join("plugins");
        fs::create_dir_all(&plugins).unwrap();
        let roots = DiscoveryRoots::new(&plugins, &tmp.path().join("nope"), "test/installer/scripts");

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        match scanner.discover(&roots) {
            Err(SuiteError::DirectoryNotFound(path)) => assert_eq!(path, roots.scripts_dir),
            other => panic!("expected DirectoryNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_directory_lenient() {
        let tmp = tempfile::tempdir().unwrap();
        let plugins = tmp.path().join("plugins");
        fs::create_dir_all(&plugins).unwrap();
        touch(&plugins, "a_test.rb");
        let roots = DiscoveryRoots::new(&plugins, &tmp.path().join("nope"), "test/installer/scripts");

        let scanner = TestScanner::new(TestFilePattern::default(), false);
        let set = scanner.discover(&roots).unwrap();
        assert_eq!(names(&set), vec!["a_test.rb"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_matches() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"caf\xe9_test.rb");
        let pattern = TestFilePattern::default();
        assert!(pattern.is_test_file(Path::new(name)));
        assert!(!pattern.is_test_file(Path::new(OsStr::from_bytes(b"caf\xe9.rb"))));

        let (_tmp, roots) = layout();
        // Some filesystems reject such names; nothing to check there.
        if fs::write(roots.plugins_dir.join(name), "").is_err() {
            return;
        }

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        let set = scanner.discover(&roots).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].path, roots.plugins_dir.join(name));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_links_do_not_fail_discovery() {
        use std::os::unix::fs::symlink;

        let (tmp, roots) = layout();
        touch(&roots.plugins_dir, "a_test.rb");
        symlink(tmp.path().join("gone.txt"), roots.plugins_dir.join("notes.txt")).unwrap();
        symlink(tmp.path().join("gone.rb"), roots.plugins_dir.join("b_test.rb")).unwrap();
        touch(tmp.path(), "real.rb");
        symlink(tmp.path().join("real.rb"), roots.plugins_dir.join("c_test.rb")).unwrap();
        symlink(tmp.path(), roots.plugins_dir.join("d_test.rb")).unwrap();

        for strict in [true, false] {
            let scanner = TestScanner::new(TestFilePattern::default(), strict);
            let set = scanner.discover(&roots).unwrap();
            assert_eq!(names(&set), vec!["a_test.rb", "b_test.rb", "c_test.rb"]);
        }
    }

    #[test]
    fn test_file_as_directory_strict() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "plugins");

        let scanner = TestScanner::new(TestFilePattern::default(), true);
        let err = scanner.list_matching(&tmp.path().join("plugins")).unwrap_err();
        assert!(matches!(err, SuiteError::NotADirectory(_)));
    }
}
