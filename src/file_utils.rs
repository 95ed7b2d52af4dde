use crate::error::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Returns true when the path has the given extension (case-insensitive).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext_str| ext_str.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Lists files directly inside `dir` with the given extension, sorted by name.
pub fn scan_directory(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect();

    files.sort();
    Ok(files)
}

/// Removes every file in `dir` matching one of `extensions`.
///
/// Files that cannot be removed are skipped. Returns the number actually removed;
/// a missing directory counts as nothing to remove.
pub fn clear_matching(dir: &Path, extensions: &[&str]) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && extensions.iter().any(|ext| has_extension(path, ext))
        })
        .filter(|path| match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                debug!("Skipping {}: {}", path.format_for_log(), e);
                false
            }
        })
        .count()
}

/// Size and modification time of a file, used to notice rewrites in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    /// Reads the stamp for `path`, or `None` if the file is gone.
    pub fn read(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Formatting helpers for paths in log messages and status text.
pub trait PathExt {
    /// File name only, falling back to the full path.
    fn display_name(&self) -> String;
    /// Quoted full path for log lines.
    fn format_for_log(&self) -> String;
}

impl PathExt for Path {
    fn display_name(&self) -> String {
        self.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display().to_string())
    }

    fn format_for_log(&self) -> String {
        format!("\"{}\"", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn scan_filters_by_extension_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "c.png");
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.PNG");
        touch(dir.path(), "b.json");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = scan_directory(dir.path(), "png").unwrap();
        let names: Vec<String> = files.iter().map(|p| p.display_name()).collect();

        assert_eq!(names, vec!["a.png", "b.PNG", "c.png"]);
    }

    #[test]
    fn scan_of_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_directory(&dir.path().join("missing"), "png").is_err());
    }

    #[test]
    fn clear_removes_only_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");
        touch(dir.path(), "c.png");
        touch(dir.path(), "keep.txt");

        let removed = clear_matching(dir.path(), &["png"]);

        assert_eq!(removed, 3);
        assert!(dir.path().join("keep.txt").exists());
        assert!(scan_directory(dir.path(), "png").unwrap().is_empty());
    }

    #[test]
    fn clear_counts_images_and_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "a.json");
        touch(dir.path(), "run.log");

        assert_eq!(clear_matching(dir.path(), &["png", "json"]), 2);
        assert!(dir.path().join("run.log").exists());
    }

    #[test]
    fn clear_of_missing_directory_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(clear_matching(&dir.path().join("missing"), &["png"]), 0);
    }

    #[test]
    fn stamp_changes_when_file_grows() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a.png");
        let before = FileStamp::read(&path).unwrap();

        fs::write(&path, b"longer contents").unwrap();
        let after = FileStamp::read(&path).unwrap();

        assert_ne!(before, after);
        assert!(FileStamp::read(&dir.path().join("gone.png")).is_none());
    }
}
