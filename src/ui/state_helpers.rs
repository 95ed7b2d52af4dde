//! Helper functions to set groups of ViewerState properties at once.

use crate::image_loader;
use crate::services::gallery_service::{EmptyView, RenderedView};
use crate::services::process_controller::WorkerStatus;
use crate::state::GalleryKind;
use crate::workspace::TreeEntry;
use slint::{ComponentHandle, ModelRc, VecModel};
use std::path::Path;

/// Maps the UI panel enum onto the gallery it shows.
pub fn panel_kind(panel: crate::Panel) -> GalleryKind {
    match panel {
        crate::Panel::Plots => GalleryKind::Plots,
        crate::Panel::Matrices => GalleryKind::Matrices,
    }
}

fn set_gallery_view(ui: &crate::AppWindow, kind: GalleryKind, view: crate::GalleryView) {
    let viewer_state = ui.global::<crate::ViewerState>();
    match kind {
        GalleryKind::Plots => viewer_state.set_plots(view),
        GalleryKind::Matrices => viewer_state.set_matrices(view),
    }
}

/// Shows a decoded frame with its status line, metadata and navigation state.
pub fn show_rendered(ui: &crate::AppWindow, kind: GalleryKind, view: RenderedView) {
    let image = image_loader::create_slint_image(&view.frame.data, view.frame.width, view.frame.height);
    set_gallery_view(
        ui,
        kind,
        crate::GalleryView {
            image,
            loaded: true,
            placeholder: kind.placeholder().into(),
            status: view.status.into(),
            metadata: view.metadata.into(),
            has_previous: view.has_previous,
            has_next: view.has_next,
        },
    );
}

/// Clears the frame and shows the empty-gallery placeholder.
pub fn show_empty(ui: &crate::AppWindow, kind: GalleryKind, view: EmptyView) {
    set_gallery_view(
        ui,
        kind,
        crate::GalleryView {
            image: slint::Image::default(),
            loaded: false,
            placeholder: view.placeholder.into(),
            status: view.status.into(),
            metadata: view.metadata.into(),
            has_previous: false,
            has_next: false,
        },
    );
}

/// Sets the start/stop button state and the worker status label.
pub fn set_running(ui: &crate::AppWindow, running: bool, status: WorkerStatus) {
    let viewer_state = ui.global::<crate::ViewerState>();
    viewer_state.set_running(running);
    viewer_state.set_worker_status(status.to_string().into());
}

/// Sets the workspace path field and the project footer.
pub fn set_workspace_info(ui: &crate::AppWindow, workspace: &Path, project_root: &Path) {
    let viewer_state = ui.global::<crate::ViewerState>();
    viewer_state.set_workspace_path(workspace.display().to_string().into());
    let project_name = project_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_root.display().to_string());
    viewer_state.set_project_name(project_name.into());
}

/// Replaces the file browser rows.
pub fn set_file_tree(ui: &crate::AppWindow, entries: &[TreeEntry]) {
    let rows: Vec<crate::TreeRow> = entries
        .iter()
        .map(|entry| crate::TreeRow {
            label: entry.name.as_str().into(),
            depth: entry.depth as i32,
            is_dir: entry.is_dir,
        })
        .collect();
    ui.global::<crate::ViewerState>()
        .set_file_tree(ModelRc::new(VecModel::from(rows)));
}
