//! Service keeping one gallery in sync with its directory.
//!
//! Each tick rescans the directory and works out what the view should show.
//! Frames are only presented after a successful decode, so a file that is still
//! being written leaves the previous frame and status on screen until a later
//! tick decodes it.

use crate::config::{FRAME_CACHE_CAPACITY, VIEWPORT_MAX_HEIGHT, VIEWPORT_MAX_WIDTH};
use crate::error::Result;
use crate::file_utils::{self, PathExt};
use crate::image_cache::{FrameKey, ImageCache};
use crate::image_loader::{self, ScaledImage};
use crate::metadata::{self, NO_METADATA_TEXT};
use crate::state::{GalleryKind, GalleryState};
use log::debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Text side of a presented gallery view.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewSignature {
    frame: Option<FrameKey>,
    status: String,
    metadata: String,
    has_previous: bool,
    has_next: bool,
}

/// A frame ready to show, with its status and metadata.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub frame: ScaledImage,
    pub status: String,
    pub metadata: String,
    pub has_previous: bool,
    pub has_next: bool,
}

/// What an empty gallery shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyView {
    pub placeholder: String,
    pub status: String,
    pub metadata: String,
}

/// Decode work to run off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub key: FrameKey,
    pub max_width: u32,
    pub max_height: u32,
}

impl RenderRequest {
    /// Decodes and scales the frame. Blocking.
    pub fn run(&self) -> Result<ScaledImage> {
        image_loader::load_scaled(&self.key.path, self.max_width, self.max_height)
    }
}

/// Change the UI has to apply after a tick or navigation.
#[derive(Debug, Clone)]
pub enum GalleryUpdate {
    /// Nothing visible changed.
    Unchanged,
    /// Show the empty placeholder.
    Empty(EmptyView),
    /// Show this frame now.
    Ready(RenderedView),
    /// Decode in the background, then pass the result to `finish_render`.
    Decode(RenderRequest),
}

struct GalleryInner {
    state: GalleryState,
    cache: ImageCache,
    presented: Option<ViewSignature>,
    in_flight: Option<FrameKey>,
    failed: Option<FrameKey>,
    viewport: (u32, u32),
}

impl GalleryInner {
    fn signature(&self) -> Option<ViewSignature> {
        let Some(path) = self.state.selected_path() else {
            return Some(ViewSignature {
                frame: None,
                status: self.state.status_text(),
                metadata: NO_METADATA_TEXT.to_string(),
                has_previous: false,
                has_next: false,
            });
        };

        // The file may have vanished between listing and now; wait for the next poll.
        let key = FrameKey::current(path.to_path_buf())?;
        let metadata = metadata::format_metadata(metadata::load_sidecar(path).as_ref());

        Some(ViewSignature {
            frame: Some(key),
            status: self.state.status_text(),
            metadata,
            has_previous: self.state.has_previous(),
            has_next: self.state.has_next(),
        })
    }

    fn refresh(&mut self) -> GalleryUpdate {
        let Some(wanted) = self.signature() else {
            return GalleryUpdate::Unchanged;
        };
        if self.presented.as_ref() == Some(&wanted) {
            return GalleryUpdate::Unchanged;
        }

        let Some(key) = wanted.frame.clone() else {
            let view = EmptyView {
                placeholder: self.state.kind().placeholder().to_string(),
                status: wanted.status.clone(),
                metadata: wanted.metadata.clone(),
            };
            self.presented = Some(wanted);
            return GalleryUpdate::Empty(view);
        };

        if let Some(frame) = self.cache.get(&key) {
            let view = RenderedView {
                frame,
                status: wanted.status.clone(),
                metadata: wanted.metadata.clone(),
                has_previous: wanted.has_previous,
                has_next: wanted.has_next,
            };
            self.presented = Some(wanted);
            return GalleryUpdate::Ready(view);
        }

        // A failed version is retried only once its size or mtime changes, not on
        // every tick; an unchanged broken file would otherwise be decoded forever.
        if self.failed.as_ref() == Some(&key) || self.in_flight.as_ref() == Some(&key) {
            return GalleryUpdate::Unchanged;
        }

        self.in_flight = Some(key.clone());
        GalleryUpdate::Decode(RenderRequest {
            key,
            max_width: self.viewport.0,
            max_height: self.viewport.1,
        })
    }
}

/// Shared handle to one gallery. Clones refer to the same gallery.
#[derive(Clone)]
pub struct GalleryService {
    inner: Arc<Mutex<GalleryInner>>,
}

impl GalleryService {
    /// Creates a gallery over `directory` with the default viewport.
    pub fn new(kind: GalleryKind, directory: PathBuf) -> Self {
        Self::with_viewport(kind, directory, VIEWPORT_MAX_WIDTH, VIEWPORT_MAX_HEIGHT)
    }

    pub fn with_viewport(kind: GalleryKind, directory: PathBuf, max_width: u32, max_height: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GalleryInner {
                state: GalleryState::new(kind, directory),
                cache: ImageCache::new(FRAME_CACHE_CAPACITY),
                presented: None,
                in_flight: None,
                failed: None,
                viewport: (max_width, max_height),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GalleryInner> {
        self.inner.lock().expect("gallery state poisoned")
    }

    pub fn kind(&self) -> GalleryKind {
        self.lock().state.kind()
    }

    /// Copy of the current list and selection.
    #[cfg(test)]
    pub fn snapshot(&self) -> GalleryState {
        self.lock().state.clone()
    }

    /// Rescans the directory and reports what to show.
    pub fn tick(&self) -> GalleryUpdate {
        let mut inner = self.lock();
        let state = inner.state.clone();
        inner.state = state.poll();
        inner.refresh()
    }

    /// Moves the selection by `delta` (saturating) and reports what to show.
    pub fn navigate(&self, delta: isize) -> GalleryUpdate {
        let mut inner = self.lock();
        if !inner.state.step(delta) {
            return GalleryUpdate::Unchanged;
        }
        inner.refresh()
    }

    /// Returns to the first image, e.g. when a new run starts.
    pub fn reset_selection(&self) -> GalleryUpdate {
        let mut inner = self.lock();
        inner.state.reset_selection();
        inner.refresh()
    }

    /// Points the gallery at a different directory.
    pub fn retarget(&self, directory: PathBuf) -> GalleryUpdate {
        let mut inner = self.lock();
        inner.state.retarget(directory);
        inner.cache.clear();
        inner.in_flight = None;
        inner.failed = None;
        let state = inner.state.clone();
        inner.state = state.poll();
        inner.refresh()
    }

    /// Deletes images and sidecars from the directory. Returns how many were removed.
    pub fn clear(&self, extensions: &[&str]) -> (usize, GalleryUpdate) {
        let mut inner = self.lock();
        let removed = file_utils::clear_matching(inner.state.directory(), extensions);
        inner.cache.clear();
        inner.failed = None;
        let state = inner.state.clone();
        inner.state = state.poll();
        inner.state.reset_selection();
        (removed, inner.refresh())
    }

    /// Accepts the result of a background decode started by a `Decode` update.
    ///
    /// Failures are expected while the worker is still writing a file; they are
    /// remembered so the same file version is not decoded again, and the view
    /// stays as it was.
    pub fn finish_render(&self, key: FrameKey, result: Result<ScaledImage>) -> GalleryUpdate {
        let mut inner = self.lock();
        if inner.in_flight.as_ref() == Some(&key) {
            inner.in_flight = None;
        }

        match result {
            Ok(frame) => {
                inner.cache.put(key, frame);
                inner.refresh()
            }
            Err(e) => {
                debug!("Deferring {}: {}", key.path.format_for_log(), e);
                inner.failed = Some(key);
                GalleryUpdate::Unchanged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::path::Path;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save(dir.join(name))
            .unwrap();
    }

    /// Runs decode requests inline until the service settles.
    fn settle(service: &GalleryService, mut update: GalleryUpdate) -> GalleryUpdate {
        while let GalleryUpdate::Decode(request) = update {
            let result = request.run();
            update = service.finish_render(request.key, result);
        }
        update
    }

    fn gallery_with_three_plots() -> (tempfile::TempDir, GalleryService) {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 30);
        write_png(dir.path(), "b.png", 40, 30);
        write_png(dir.path(), "c.png", 40, 30);
        fs::write(
            dir.path().join("b.json"),
            r#"{"plot_type":"scan","params":{"x":1}}"#,
        )
        .unwrap();
        let service = GalleryService::with_viewport(GalleryKind::Plots, dir.path().to_path_buf(), 20, 20);
        (dir, service)
    }

    #[test]
    fn first_tick_decodes_then_presents_first_plot() {
        let (_dir, service) = gallery_with_three_plots();

        let update = settle(&service, service.tick());

        match update {
            GalleryUpdate::Ready(view) => {
                assert_eq!(view.status, "Plot 1 of 3: a.png");
                assert_eq!(view.metadata, NO_METADATA_TEXT);
                assert_eq!((view.frame.width, view.frame.height), (20, 15));
                assert!(!view.has_previous);
                assert!(view.has_next);
            }
            other => panic!("expected a ready view, got {:?}", other),
        }
        let names: Vec<String> = service
            .snapshot()
            .files()
            .iter()
            .map(|p| p.display_name())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn unchanged_directory_produces_no_updates() {
        let (_dir, service) = gallery_with_three_plots();
        settle(&service, service.tick());

        assert!(matches!(service.tick(), GalleryUpdate::Unchanged));
        assert!(matches!(service.tick(), GalleryUpdate::Unchanged));
        assert_eq!(service.snapshot().selection(), Some(0));
    }

    #[test]
    fn selecting_plot_with_sidecar_renders_metadata() {
        let (_dir, service) = gallery_with_three_plots();
        settle(&service, service.tick());

        match settle(&service, service.navigate(1)) {
            GalleryUpdate::Ready(view) => {
                assert_eq!(view.status, "Plot 2 of 3: b.png");
                let plot_type = view.metadata.find("plot_type: scan").unwrap();
                let params = view.metadata.find("params:").unwrap();
                let x = view.metadata.find("  x: 1").unwrap();
                assert!(plot_type < params && params < x);
            }
            other => panic!("expected a ready view, got {:?}", other),
        }

        match settle(&service, service.navigate(1)) {
            GalleryUpdate::Ready(view) => assert_eq!(view.metadata, NO_METADATA_TEXT),
            other => panic!("expected a ready view, got {:?}", other),
        }
    }

    #[test]
    fn navigation_past_the_end_is_a_noop() {
        let (_dir, service) = gallery_with_three_plots();
        settle(&service, service.tick());

        assert!(matches!(service.navigate(-1), GalleryUpdate::Unchanged));
        settle(&service, service.navigate(2));
        assert!(matches!(service.navigate(1), GalleryUpdate::Unchanged));
        assert_eq!(service.snapshot().selection(), Some(2));
    }

    #[test]
    fn revisiting_a_plot_uses_the_cache() {
        let (_dir, service) = gallery_with_three_plots();
        settle(&service, service.tick());
        settle(&service, service.navigate(1));

        assert!(matches!(service.navigate(-1), GalleryUpdate::Ready(_)));
    }

    #[test]
    fn partial_file_keeps_previous_view_until_complete() {
        let (dir, service) = gallery_with_three_plots();
        settle(&service, service.tick());
        settle(&service, service.navigate(2));
        fs::write(dir.path().join("d.png"), b"").unwrap();

        // The new, still empty file is not selected; only the status changes.
        match settle(&service, service.tick()) {
            GalleryUpdate::Ready(view) => assert_eq!(view.status, "Plot 3 of 4: c.png"),
            other => panic!("expected a ready view, got {:?}", other),
        }

        // Selecting the empty file fails to decode and keeps the old view.
        assert!(matches!(settle(&service, service.navigate(1)), GalleryUpdate::Unchanged));
        assert!(matches!(service.tick(), GalleryUpdate::Unchanged));
        assert_eq!(service.snapshot().selection(), Some(3));

        // Once the worker finishes writing, the next tick picks it up.
        write_png(dir.path(), "d.png", 40, 30);
        match settle(&service, service.tick()) {
            GalleryUpdate::Ready(view) => assert_eq!(view.status, "Plot 4 of 4: d.png"),
            other => panic!("expected a ready view, got {:?}", other),
        }
    }

    /// Records log output per thread so parallel tests do not see each other.
    struct CaptureLogger {
        records: Mutex<Vec<(std::thread::ThreadId, log::Level, String)>>,
    }

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.records.lock().unwrap().push((
                std::thread::current().id(),
                record.level(),
                record.args().to_string(),
            ));
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLogger = CaptureLogger {
        records: Mutex::new(Vec::new()),
    };

    fn captured_on_this_thread() -> Vec<(log::Level, String)> {
        static INSTALL: std::sync::Once = std::sync::Once::new();
        INSTALL.call_once(|| {
            let _ = log::set_logger(&CAPTURE);
            log::set_max_level(log::LevelFilter::Trace);
        });
        let me = std::thread::current().id();
        CAPTURE
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(thread, _, _)| *thread == me)
            .map(|(_, level, message)| (*level, message.clone()))
            .collect()
    }

    #[test]
    fn failed_decode_logs_nothing_above_debug() {
        captured_on_this_thread();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("partial.png"), b"\x89PNG\r\n").unwrap();
        let service = GalleryService::new(GalleryKind::Plots, dir.path().to_path_buf());

        let GalleryUpdate::Decode(request) = service.tick() else {
            panic!("expected a decode request");
        };
        let result = request.run();
        assert!(result.is_err());
        assert!(matches!(
            service.finish_render(request.key, result),
            GalleryUpdate::Unchanged
        ));

        let records = captured_on_this_thread();
        assert!(records.iter().any(|(_, message)| message.starts_with("Deferring")));
        assert!(
            records.iter().all(|(level, _)| *level >= log::Level::Debug),
            "unexpected records: {:?}",
            records
        );
    }

    #[test]
    fn empty_directory_shows_placeholder_once() {
        let dir = tempfile::tempdir().unwrap();
        let service = GalleryService::new(GalleryKind::Matrices, dir.path().to_path_buf());

        match service.tick() {
            GalleryUpdate::Empty(view) => {
                assert_eq!(view.placeholder, "No correlation matrices available");
                assert_eq!(view.status, "No correlation matrices to display");
                assert_eq!(view.metadata, NO_METADATA_TEXT);
            }
            other => panic!("expected the empty view, got {:?}", other),
        }
        assert!(matches!(service.tick(), GalleryUpdate::Unchanged));
    }

    #[test]
    fn clear_removes_images_and_sidecars_and_empties_view() {
        let (dir, service) = gallery_with_three_plots();
        fs::write(dir.path().join("notes.txt"), b"keep").unwrap();
        settle(&service, service.tick());

        let (removed, update) = service.clear(&["png", "json"]);

        assert_eq!(removed, 4);
        assert!(matches!(update, GalleryUpdate::Empty(_)));
        assert!(dir.path().join("notes.txt").exists());
        assert!(service.snapshot().is_empty());
    }

    #[test]
    fn retarget_switches_directory() {
        let (_dir, service) = gallery_with_three_plots();
        settle(&service, service.tick());
        let other = tempfile::tempdir().unwrap();
        write_png(other.path(), "z.png", 10, 10);

        match settle(&service, service.retarget(other.path().to_path_buf())) {
            GalleryUpdate::Ready(view) => assert_eq!(view.status, "Plot 1 of 1: z.png"),
            other => panic!("expected a ready view, got {:?}", other),
        }
    }
}
