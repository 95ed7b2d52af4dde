//! Event handlers for UI callbacks.
//!
//! Sets up all Logic callbacks (toggle_simulation, run_function, clear_gallery,
//! navigate, etc.) and the timers that drain worker output and poll the
//! galleries.

use crate::config::{CLEARABLE_EXTENSIONS, CONSOLE_DRAIN_INTERVAL, FILE_TREE_MAX_ITEMS};
use crate::error::ControllerError;
use crate::services::{EntryPoint, WorkerEvent, WorkerOutput};
use crate::state::{AppState, GalleryKind};
use crate::ui::console::Console;
use crate::ui::gallery_display::{apply_update, start_polling};
use crate::ui::state_helpers::{panel_kind, set_file_tree, set_running, set_workspace_info};
use crate::workspace::TreeEntry;
use log::{info, warn};
use rfd::AsyncFileDialog;
use slint::{ComponentHandle, Timer, TimerMode};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::TryRecvError;

/// Upper bound on output lines moved into the console per drain tick.
const MAX_LINES_PER_TICK: usize = 500;

/// Timers that must outlive the event loop. Dropping this stops all polling.
pub struct UiRuntime {
    _timers: Vec<Timer>,
}

/// Everything the callbacks share. Lives on the UI thread only.
#[derive(Clone)]
struct Context {
    ui: slint::Weak<crate::AppWindow>,
    state: Rc<AppState>,
    console: Console,
    /// Output of the run currently shown in the console.
    session: Rc<RefCell<Option<WorkerOutput>>>,
    /// Rows currently shown in the file browser, by index.
    tree: Rc<RefCell<Vec<TreeEntry>>>,
}

impl Context {
    fn refresh_tree(&self) {
        let entries = self.state.current_workspace().file_tree(FILE_TREE_MAX_ITEMS);
        if let Some(ui) = self.ui.upgrade() {
            set_file_tree(&ui, &entries);
        }
        *self.tree.borrow_mut() = entries;
    }

    /// A run stays "running" for the UI until its last output has been drained.
    fn has_session(&self) -> bool {
        self.session.borrow().is_some()
    }

    fn sync_running(&self) {
        if let Some(ui) = self.ui.upgrade() {
            set_running(&ui, self.has_session(), self.state.simulation.status());
        }
    }

    fn begin_session(&self, output: WorkerOutput) {
        info!("Worker run {} started (pid {})", output.run_id(), output.pid());
        *self.session.borrow_mut() = Some(output);
        self.sync_running();

        let plots = &self.state.plots;
        apply_update(&self.ui, plots, plots.reset_selection());
    }

    fn finish_session(&self) {
        *self.session.borrow_mut() = None;
        self.sync_running();
        self.console.info("Simulation finished.");
        self.refresh_tree();
    }

    fn start_simulation(&self) {
        if self.has_session() || self.state.simulation.is_running() {
            self.console.warning(ControllerError::AlreadyRunning.to_string());
            return;
        }

        self.console.info("Starting Josephson simulation...");
        let workspace = self.state.current_workspace();
        match self.state.simulation.start_run(&workspace) {
            Ok(output) => {
                self.begin_session(output);
                self.refresh_tree();
            }
            Err(ControllerError::AlreadyRunning) => {
                self.console.warning(ControllerError::AlreadyRunning.to_string());
            }
            Err(e) => {
                self.console.error(e.to_string());
                self.finish_session();
            }
        }
    }

    fn toggle_simulation(&self) {
        if self.has_session() {
            self.stop_simulation();
        } else {
            self.start_simulation();
        }
    }

    fn stop_simulation(&self) {
        match self.state.simulation.stop() {
            Ok(()) => {
                self.console.warning("✗ Simulation stopped by user.");
                self.finish_session();
            }
            Err(e) => {
                // Exited on its own; the drain timer reports the end of the run.
                self.console.info(e.to_string());
                self.sync_running();
            }
        }
    }

    fn run_function(&self, name: &str) {
        if self.has_session() || self.state.simulation.is_running() {
            self.console.warning(ControllerError::AlreadyRunning.to_string());
            return;
        }

        let Some(entry) = EntryPoint::function(name) else {
            self.console.error(format!("Invalid function name: '{}'", name.trim()));
            return;
        };

        self.console.info(format!("Running function: {}", name.trim()));
        match self.state.simulation.run_function(&entry) {
            Ok(output) => self.begin_session(output),
            Err(ControllerError::AlreadyRunning) => {
                self.console.warning(ControllerError::AlreadyRunning.to_string());
            }
            Err(e) => {
                self.console.error(e.to_string());
                self.finish_session();
            }
        }
    }

    /// Moves pending worker output into the console.
    fn drain_output(&self) {
        let mut exited = None;
        let mut disconnected = false;

        {
            let session = self.session.borrow();
            let Some(output) = session.as_ref() else {
                return;
            };

            for _ in 0..MAX_LINES_PER_TICK {
                match output.try_next() {
                    Ok(WorkerEvent::Line(line)) => self.console.info(line),
                    Ok(WorkerEvent::Exited(summary)) => {
                        exited = Some(summary);
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if let Some(summary) = exited {
            if !summary.success {
                match summary.code {
                    Some(code) => self
                        .console
                        .error(format!("Simulation exited with code {}.", code)),
                    None => self.console.error("Simulation was terminated by a signal."),
                }
            }
            self.finish_session();
        } else {
            if disconnected {
                // The run was finalized elsewhere (stop) after its last line.
                *self.session.borrow_mut() = None;
            }
            self.sync_running();
        }
    }

    fn clear_gallery(&self, kind: GalleryKind) {
        let gallery = self.state.gallery(kind);
        let (removed, update) = gallery.clear(&CLEARABLE_EXTENSIONS);
        apply_update(&self.ui, gallery, update);
        self.console.success(format!(
            "✓ Cleared {} + metadata ({} files).",
            kind.cleared_label(),
            removed
        ));
        self.refresh_tree();
    }

    fn change_workspace(&self, root: PathBuf) {
        if root.as_os_str().is_empty() {
            self.console.warning("Workspace path is empty.");
            return;
        }

        match self.state.set_workspace(root) {
            Ok(workspace) => {
                for kind in [GalleryKind::Plots, GalleryKind::Matrices] {
                    let gallery = self.state.gallery(kind);
                    let update = gallery.retarget(kind.directory(&workspace));
                    apply_update(&self.ui, gallery, update);
                }
                if let Some(ui) = self.ui.upgrade() {
                    set_workspace_info(&ui, workspace.root(), &self.state.config.project_root);
                }
                self.refresh_tree();
                self.console
                    .info(format!("Workspace set to: {}", workspace.root().display()));
            }
            Err(e) => {
                self.console.error(format!("Could not use workspace: {}", e));
            }
        }
    }

    fn open_tree_row(&self, index: usize) {
        let path = {
            let tree = self.tree.borrow();
            tree.get(index).and_then(|entry| entry.path.clone())
        };
        let Some(path) = path else {
            return;
        };

        if !self.state.opener.open_in_default_application(&path) {
            self.console
                .warning(format!("Could not open {}", path.display()));
        }
    }
}

/// Sets up all UI event handlers for the application.
///
/// Takes the UI handle and the application state, registers every Logic
/// callback and starts the polling timers. Keep the returned runtime alive
/// for as long as the window runs.
pub fn setup_handlers(ui: &crate::AppWindow, state: AppState) -> UiRuntime {
    let ctx = Context {
        ui: ui.as_weak(),
        console: Console::attach(ui),
        state: Rc::new(state),
        session: Rc::new(RefCell::new(None)),
        tree: Rc::new(RefCell::new(Vec::new())),
    };

    let workspace = ctx.state.current_workspace();
    if let Err(e) = workspace.ensure_structure() {
        warn!("Could not create workspace folders: {}", e);
        ctx.console
            .warning(format!("Could not create workspace folders: {}", e));
    }
    set_workspace_info(ui, workspace.root(), &ctx.state.config.project_root);
    ctx.sync_running();
    ctx.refresh_tree();
    ctx.console.info("GUI initialized. Ready to run simulations.");

    let logic = ui.global::<crate::Logic>();

    logic.on_toggle_simulation({
        let ctx = ctx.clone();
        move || ctx.toggle_simulation()
    });

    logic.on_run_function({
        let ctx = ctx.clone();
        move |name| ctx.run_function(name.as_str())
    });

    logic.on_clear_output({
        let ctx = ctx.clone();
        move || {
            ctx.console.clear();
            ctx.console.info("Output cleared.");
        }
    });

    logic.on_clear_gallery({
        let ctx = ctx.clone();
        move |panel| ctx.clear_gallery(panel_kind(panel))
    });

    logic.on_navigate({
        let ctx = ctx.clone();
        move |panel, delta| {
            let gallery = ctx.state.gallery(panel_kind(panel));
            apply_update(&ctx.ui, gallery, gallery.navigate(delta as isize));
        }
    });

    logic.on_workspace_edited({
        let ctx = ctx.clone();
        move |text| ctx.change_workspace(PathBuf::from(text.trim()))
    });

    // Folder picker
    // Uses slint::spawn_local because AsyncFileDialog must run on the main thread
    logic.on_browse_workspace({
        let ctx = ctx.clone();
        move || {
            let ctx = ctx.clone();
            let start_dir = ctx.state.current_workspace().root().to_path_buf();
            let _ = slint::spawn_local(async move {
                // AsyncFileDialog has to run on the main thread, never on rayon.
                let Some(folder) = AsyncFileDialog::new()
                    .set_directory(&start_dir)
                    .pick_folder()
                    .await
                else {
                    return;
                };
                ctx.change_workspace(folder.path().to_path_buf());
            });
        }
    });

    logic.on_open_workspace({
        let ctx = ctx.clone();
        move || {
            let root = ctx.state.current_workspace().root().to_path_buf();
            if !ctx.state.opener.open_in_default_application(&root) {
                ctx.console
                    .warning(format!("Could not open {}", root.display()));
            }
        }
    });

    logic.on_open_tree_row({
        let ctx = ctx.clone();
        move |index| {
            if let Ok(index) = usize::try_from(index) {
                ctx.open_tree_row(index);
            }
        }
    });

    ui.window().on_close_requested({
        let ctx = ctx.clone();
        move || {
            if ctx.state.simulation.is_running() {
                info!("Window closing, stopping worker");
                let _ = ctx.state.simulation.stop();
            }
            slint::CloseRequestResponse::HideWindow
        }
    });

    let drain_timer = Timer::default();
    drain_timer.start(TimerMode::Repeated, CONSOLE_DRAIN_INTERVAL, {
        let ctx = ctx.clone();
        move || ctx.drain_output()
    });

    let plots_timer = start_polling(ui, ctx.state.plots.clone());
    let matrices_timer = start_polling(ui, ctx.state.matrices.clone());

    UiRuntime {
        _timers: vec![drain_timer, plots_timer, matrices_timer],
    }
}
