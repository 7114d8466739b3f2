//! Local tree enumeration and remote URL mapping.
//!
//! [`PathMapper`] walks a local root, keeps regular files whose extension is
//! allowed, and pairs each with the remote URL it is fetched from:
//!
//! ```text
//! remote_url = remote_root.trim_end_matches('/') + "/" + relative_path
//! ```
//!
//! where `relative_path` always uses `/` separators and is not percent-encoded
//! here.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Extensions accepted when the caller does not supply an allow-list.
pub const DEFAULT_EXTENSIONS: [&str; 8] = [
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "svg",
];

/// Scan failures that prevent any task from being produced.
#[derive(Debug, Error)]
pub enum MapError {
    /// The local root is missing or is not a directory.
    #[error("local directory '{}' does not exist or is not a directory", path.display())]
    DirectoryNotFound {
        /// The root that was requested.
        path: PathBuf,
    },
}

/// A single (local path, remote URL) pairing. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    local_path: PathBuf,
    remote_url: String,
}

impl DownloadTask {
    /// Creates a task directly, bypassing the directory walk.
    #[must_use]
    pub fn new(local_path: impl Into<PathBuf>, remote_url: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_url: remote_url.into(),
        }
    }

    /// Destination on disk.
    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Source URL.
    #[must_use]
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }
}

/// Case-insensitive extension allow-list. An empty list accepts every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: BTreeSet<String>,
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

impl ExtensionFilter {
    /// Builds a filter; entries may be given with or without a leading dot.
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { allowed }
    }

    /// A filter that accepts every file.
    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            allowed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn accepts_all(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether the final path segment's extension is allowed.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if self.accepts_all() {
            return true;
        }
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.allowed.contains(&ext.to_ascii_lowercase()))
    }
}

/// A non-fatal problem met while walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapWarning {
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Output of a scan: tasks in traversal order plus skipped entries.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub tasks: Vec<DownloadTask>,
    pub warnings: Vec<MapWarning>,
}

/// Maps a local root onto a remote root.
#[derive(Debug, Clone)]
pub struct PathMapper {
    local_root: PathBuf,
    remote_root: String,
    filter: ExtensionFilter,
}

impl PathMapper {
    /// Creates a mapper. Trailing slashes on `remote_root` are dropped.
    #[must_use]
    pub fn new(
        local_root: impl Into<PathBuf>,
        remote_root: &str,
        filter: ExtensionFilter,
    ) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: remote_root.trim_end_matches('/').to_string(),
            filter,
        }
    }

    #[must_use]
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Remote root with trailing slashes removed.
    #[must_use]
    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Remote URL for a path relative to the local root.
    #[must_use]
    pub fn remote_url_for(&self, relative: &Path) -> String {
        let relative = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.remote_root, relative)
    }

    /// Walks the local root and produces one task per allowed regular file.
    ///
    /// Entries are visited in file-name order. Unreadable entries and broken
    /// symlinks become warnings; they never abort the scan.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::DirectoryNotFound`] if the root does not exist or is
    /// not a directory.
    #[instrument(level = "debug", skip(self), fields(root = %self.local_root.display()))]
    pub fn scan(&self) -> Result<ScanResult, MapError> {
        let is_dir = std::fs::metadata(&self.local_root).is_ok_and(|meta| meta.is_dir());
        if !is_dir {
            return Err(MapError::DirectoryNotFound {
                path: self.local_root.clone(),
            });
        }
        let root =
            std::path::absolute(&self.local_root).unwrap_or_else(|_| self.local_root.clone());

        let mut result = ScanResult::default();
        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    let path = error.path().map(Path::to_path_buf);
                    warn!(path = ?path, error = %error, "skipping unreadable entry");
                    result.warnings.push(MapWarning {
                        path,
                        message: error.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.filter.matches(entry.path()) {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let remote_url = self.remote_url_for(relative);
            result
                .tasks
                .push(DownloadTask::new(entry.path().to_path_buf(), remote_url));
        }

        debug!(
            tasks = result.tasks.len(),
            warnings = result.warnings.len(),
            "scan complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_remote_url_strips_trailing_slashes() {
        let mapper = PathMapper::new(
            "/data",
            "https://cdn.example.com/assets///",
            ExtensionFilter::accept_all(),
        );
        assert_eq!(mapper.remote_root(), "https://cdn.example.com/assets");
        assert_eq!(
            mapper.remote_url_for(Path::new("img/a.png")),
            "https://cdn.example.com/assets/img/a.png"
        );
    }

    #[test]
    fn test_remote_url_same_with_or_without_trailing_slash() {
        let a = PathMapper::new("/d", "https://h/x", ExtensionFilter::accept_all());
        let b = PathMapper::new("/d", "https://h/x/", ExtensionFilter::accept_all());
        let rel = Path::new("deep/er/file.jpg");
        assert_eq!(a.remote_url_for(rel), b.remote_url_for(rel));
        assert!(!a.remote_url_for(rel).contains("x//"));
    }

    #[test]
    fn test_remote_url_is_not_percent_encoded() {
        let mapper = PathMapper::new("/d", "https://h", ExtensionFilter::accept_all());
        assert_eq!(
            mapper.remote_url_for(Path::new("my photos/a b.png")),
            "https://h/my photos/a b.png"
        );
    }

    #[test]
    fn test_extension_filter_case_insensitive_and_dot_tolerant() {
        let filter = ExtensionFilter::new([".PNG", "jpg"]);
        assert!(filter.matches(Path::new("a.png")));
        assert!(filter.matches(Path::new("a.PnG")));
        assert!(filter.matches(Path::new("dir.png/a.JPG")));
        assert!(!filter.matches(Path::new("a.gif")));
        assert!(!filter.matches(Path::new("png")));
    }

    #[test]
    fn test_extension_filter_empty_accepts_all() {
        let filter = ExtensionFilter::new(Vec::<String>::new());
        assert!(filter.accepts_all());
        assert!(filter.matches(Path::new("README")));
        assert!(filter.matches(Path::new("a.txt")));
    }

    #[test]
    fn test_default_filter_is_images() {
        let filter = ExtensionFilter::default();
        for name in ["a.jpg", "a.jpeg", "a.png", "a.gif", "a.webp", "a.bmp", "a.tiff", "a.svg"] {
            assert!(filter.matches(Path::new(name)), "{name} should match");
        }
        assert!(!filter.matches(Path::new("a.html")));
    }

    #[test]
    fn test_scan_missing_root_is_directory_not_found() {
        let temp = TempDir::new().unwrap();
        let mapper = PathMapper::new(
            temp.path().join("nope"),
            "https://h",
            ExtensionFilter::default(),
        );
        assert!(matches!(mapper.scan(), Err(MapError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_scan_file_root_is_directory_not_found() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.png");
        let mapper = PathMapper::new(
            temp.path().join("a.png"),
            "https://h",
            ExtensionFilter::default(),
        );
        assert!(matches!(mapper.scan(), Err(MapError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_scan_filters_and_maps_nested_files() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "b.png");
        touch(temp.path(), "a.JPG");
        touch(temp.path(), "notes.txt");
        touch(temp.path(), "sub/deeper/c.gif");

        let mapper = PathMapper::new(
            temp.path(),
            "https://cdn.example.com/root/",
            ExtensionFilter::default(),
        );
        let result = mapper.scan().unwrap();

        let urls: Vec<&str> = result.tasks.iter().map(DownloadTask::remote_url).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/root/a.JPG",
                "https://cdn.example.com/root/b.png",
                "https://cdn.example.com/root/sub/deeper/c.gif",
            ]
        );
        for task in &result.tasks {
            assert!(task.local_path().is_absolute());
            assert!(task.local_path().exists());
        }
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_empty_directory_yields_no_tasks() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("empty/child")).unwrap();
        let mapper = PathMapper::new(temp.path(), "https://h", ExtensionFilter::default());
        let result = mapper.scan().unwrap();
        assert!(result.tasks.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_broken_symlink_becomes_warning() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "ok.png");
        std::os::unix::fs::symlink(
            temp.path().join("missing.png"),
            temp.path().join("dangling.png"),
        )
        .unwrap();

        let mapper = PathMapper::new(temp.path(), "https://h", ExtensionFilter::default());
        let result = mapper.scan().unwrap();
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }
}
