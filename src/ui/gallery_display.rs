//! Gallery polling and frame display.
//!
//! Directory scans run on the UI thread from a `slint::Timer`. Decoding runs on
//! `rayon::spawn`, and the result returns to the UI thread through
//! `slint::invoke_from_event_loop`, so a slow decode never holds up the timer.

use crate::services::gallery_service::RenderRequest;
use crate::services::{GalleryService, GalleryUpdate};
use crate::ui::state_helpers::{show_empty, show_rendered};
use slint::{ComponentHandle, Timer, TimerMode};

/// Applies a gallery update to the window, starting a background decode if needed.
pub fn apply_update(
    ui: &slint::Weak<crate::AppWindow>,
    service: &GalleryService,
    update: GalleryUpdate,
) {
    match update {
        GalleryUpdate::Unchanged => {}
        GalleryUpdate::Empty(view) => {
            if let Some(app) = ui.upgrade() {
                show_empty(&app, service.kind(), view);
            }
        }
        GalleryUpdate::Ready(view) => {
            if let Some(app) = ui.upgrade() {
                show_rendered(&app, service.kind(), view);
            }
        }
        GalleryUpdate::Decode(request) => spawn_render(ui.clone(), service.clone(), request),
    }
}

fn spawn_render(ui: slint::Weak<crate::AppWindow>, service: GalleryService, request: RenderRequest) {
    rayon::spawn(move || {
        let result = request.run();
        let _ = slint::invoke_from_event_loop(move || {
            let update = service.finish_render(request.key, result);
            apply_update(&ui, &service, update);
        });
    });
}

/// Polls the gallery once now and then on its own cadence.
///
/// The returned timer must be kept alive for polling to continue.
pub fn start_polling(ui: &crate::AppWindow, service: GalleryService) -> Timer {
    let handle = ui.as_weak();
    apply_update(&handle, &service, service.tick());

    let timer = Timer::default();
    timer.start(TimerMode::Repeated, service.kind().poll_interval(), move || {
        apply_update(&handle, &service, service.tick());
    });
    timer
}
