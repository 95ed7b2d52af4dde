//! Directory-backed image list with a current selection.

use crate::config::{IMAGE_EXTENSION, MATRIX_POLL_INTERVAL, PLOT_POLL_INTERVAL};
use crate::file_utils::{self, PathExt};
use crate::workspace::Workspace;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The two galleries the viewer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GalleryKind {
    Plots,
    Matrices,
}

impl GalleryKind {
    /// Directory of this gallery inside a workspace.
    pub fn directory(self, workspace: &Workspace) -> PathBuf {
        match self {
            GalleryKind::Plots => workspace.plots_dir(),
            GalleryKind::Matrices => workspace.matrices_dir(),
        }
    }

    pub fn poll_interval(self) -> Duration {
        match self {
            GalleryKind::Plots => PLOT_POLL_INTERVAL,
            GalleryKind::Matrices => MATRIX_POLL_INTERVAL,
        }
    }

    /// Noun used in "N of M" status lines.
    pub fn item_label(self) -> &'static str {
        match self {
            GalleryKind::Plots => "Plot",
            GalleryKind::Matrices => "Matrix",
        }
    }

    pub fn empty_status(self) -> &'static str {
        match self {
            GalleryKind::Plots => "No plots to display",
            GalleryKind::Matrices => "No correlation matrices to display",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            GalleryKind::Plots => "No plots available",
            GalleryKind::Matrices => "No correlation matrices available",
        }
    }

    /// Console label used when the gallery folder is cleared.
    pub fn cleared_label(self) -> &'static str {
        match self {
            GalleryKind::Plots => "plots",
            GalleryKind::Matrices => "matrices",
        }
    }
}

/// Sorted file list of one directory plus the selected entry.
///
/// The selection is `None` exactly when the list is empty, and otherwise always
/// a valid index into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryState {
    kind: GalleryKind,
    directory: PathBuf,
    extension: &'static str,
    files: Vec<PathBuf>,
    selected: Option<usize>,
}

impl GalleryState {
    /// Creates an empty gallery watching `directory` for `*.png` files.
    pub fn new(kind: GalleryKind, directory: PathBuf) -> Self {
        Self {
            kind,
            directory,
            extension: IMAGE_EXTENSION,
            files: Vec::new(),
            selected: None,
        }
    }

    pub fn kind(&self) -> GalleryKind {
        self.kind
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn selection(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selection()
            .and_then(|index| self.files().get(index))
            .map(PathBuf::as_path)
    }

    /// Rescans the directory and replaces the file list.
    ///
    /// A missing directory yields an empty list; any other listing error keeps
    /// the previous list so a transient failure does not blank the view.
    pub fn poll(self) -> Self {
        match file_utils::scan_directory(&self.directory, self.extension) {
            Ok(files) => self.with_files(files),
            Err(_) if !self.directory.exists() => self.with_files(Vec::new()),
            Err(e) => {
                debug!("Keeping previous listing of {}: {}", self.directory.format_for_log(), e);
                self
            }
        }
    }

    /// Replaces the file list, keeping the selection where it is still valid.
    ///
    /// An out-of-range selection is clamped to the last file; an empty list
    /// clears it; a list appearing after being empty selects the first file.
    pub fn with_files(mut self, mut files: Vec<PathBuf>) -> Self {
        files.sort();
        self.selected = match (files.len(), self.selected) {
            (0, _) => None,
            (len, Some(index)) => Some(index.min(len - 1)),
            (_, None) => Some(0),
        };
        self.files = files;
        self
    }

    /// Selects `index`, saturating at the last file. No-op on an empty list.
    pub fn select(&mut self, index: usize) {
        if let Some(last) = self.files.len().checked_sub(1) {
            self.selected = Some(index.min(last));
        }
    }

    /// Moves the selection by `delta`, stopping at either end instead of wrapping.
    ///
    /// Returns whether the selection changed.
    pub fn step(&mut self, delta: isize) -> bool {
        let Some(current) = self.selection() else {
            return false;
        };
        let target = current.saturating_add_signed(delta);
        let before = self.selected;
        self.select(target);
        self.selected != before
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.selected, Some(index) if index > 0)
    }

    pub fn has_next(&self) -> bool {
        matches!(self.selected, Some(index) if index + 1 < self.len())
    }

    /// Moves the selection back to the first file (or none when empty).
    pub fn reset_selection(&mut self) {
        self.selected = if self.is_empty() { None } else { Some(0) };
    }

    /// Points the gallery at another directory and drops the current list.
    pub fn retarget(&mut self, directory: PathBuf) {
        self.directory = directory;
        self.files.clear();
        self.selected = None;
    }

    /// "Plot 2 of 5: name.png", or the empty-gallery message.
    pub fn status_text(&self) -> String {
        match (self.selected, self.selected_path()) {
            (Some(index), Some(path)) => format!(
                "{} {} of {}: {}",
                self.kind.item_label(),
                index + 1,
                self.files.len(),
                path.display_name()
            ),
            _ => self.kind.empty_status().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(state: &GalleryState) -> Vec<String> {
        state.files().iter().map(|p| p.display_name()).collect()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn poll_lists_sorted_pngs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "c.png");
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");
        touch(dir.path(), "b.json");

        let state = GalleryState::new(GalleryKind::Plots, dir.path().to_path_buf()).poll();

        assert_eq!(names(&state), vec!["a.png", "b.png", "c.png"]);
        assert_eq!(state.selection(), Some(0));
        assert_eq!(state.status_text(), "Plot 1 of 3: a.png");
    }

    #[test]
    fn poll_is_idempotent_for_unchanged_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");

        let mut state = GalleryState::new(GalleryKind::Plots, dir.path().to_path_buf()).poll();
        state.select(1);
        let again = state.clone().poll().poll();

        assert_eq!(again, state);
    }

    #[test]
    fn monotonic_growth_keeps_list_sorted_and_growing() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = GalleryState::new(GalleryKind::Plots, dir.path().to_path_buf());
        let mut previous_len = 0;

        for name in ["step_03.png", "step_01.png", "step_10.png", "step_02.png"] {
            touch(dir.path(), name);
            state = state.poll();

            assert!(state.len() >= previous_len);
            assert!(state.files().windows(2).all(|pair| pair[0] <= pair[1]));
            previous_len = state.len();
        }
        assert_eq!(previous_len, 4);
    }

    #[test]
    fn shrinking_list_clamps_selection() {
        let state = GalleryState::new(GalleryKind::Plots, PathBuf::from("/w/plots"));
        let mut state = state.with_files(vec!["a.png".into(), "b.png".into(), "c.png".into()]);
        state.select(2);

        let state = state.with_files(vec!["a.png".into(), "b.png".into()]);
        assert_eq!(state.selection(), Some(1));

        let state = state.with_files(Vec::new());
        assert_eq!(state.selection(), None);
        assert_eq!(state.selected_path(), None);
        assert_eq!(state.status_text(), "No plots to display");
    }

    #[test]
    fn missing_directory_polls_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = GalleryState::new(GalleryKind::Matrices, dir.path().join("missing"))
            .with_files(vec!["old.png".into()])
            .poll();

        assert!(state.is_empty());
        assert_eq!(state.status_text(), "No correlation matrices to display");
    }

    #[test]
    fn navigation_saturates_at_edges() {
        let mut state = GalleryState::new(GalleryKind::Plots, PathBuf::from("/w/plots"))
            .with_files(vec!["a.png".into(), "b.png".into(), "c.png".into()]);

        assert!(!state.step(-1));
        assert_eq!(state.selection(), Some(0));
        assert!(!state.has_previous());

        assert!(state.step(1));
        assert!(state.step(1));
        assert!(!state.step(1));
        assert_eq!(state.selection(), Some(2));
        assert!(!state.has_next());
        assert!(state.has_previous());

        state.select(99);
        assert_eq!(state.selection(), Some(2));
    }

    #[test]
    fn navigation_on_empty_gallery_is_noop() {
        let mut state = GalleryState::new(GalleryKind::Plots, PathBuf::from("/w/plots"));

        assert!(!state.step(1));
        assert!(!state.step(-1));
        state.select(0);
        assert_eq!(state.selection(), None);
        assert!(!state.has_next());
    }

    #[test]
    fn retarget_and_reset_clear_selection() {
        let mut state = GalleryState::new(GalleryKind::Matrices, PathBuf::from("/a"))
            .with_files(vec!["a.png".into(), "b.png".into()]);
        state.select(1);

        state.reset_selection();
        assert_eq!(state.selection(), Some(0));
        assert_eq!(state.status_text(), "Matrix 1 of 2: a.png");

        state.retarget(PathBuf::from("/b"));
        assert_eq!(state.directory(), Path::new("/b"));
        assert!(state.is_empty());
        assert_eq!(state.selection(), None);
    }
}
