//! Application configuration constants and command-line derived settings.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Image files the galleries pick up.
pub const IMAGE_EXTENSION: &str = "png";

/// Sidecar metadata written next to an image.
pub const METADATA_EXTENSION: &str = "json";

/// Extensions removed when a gallery directory is cleared.
pub const CLEARABLE_EXTENSIONS: [&str; 2] = [IMAGE_EXTENSION, METADATA_EXTENSION];

/// Bounding box every displayed image is fitted into.
pub const VIEWPORT_MAX_WIDTH: u32 = 600;
pub const VIEWPORT_MAX_HEIGHT: u32 = 450;

/// Refresh cadence for the plot gallery.
pub const PLOT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Refresh cadence for the correlation matrix gallery.
pub const MATRIX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How often the console drains pending worker output.
pub const CONSOLE_DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Oldest console messages are dropped beyond this many.
pub const CONSOLE_MAX_ENTRIES: usize = 5000;

/// Capacity of the worker output channel. Readers block once it is full.
pub const OUTPUT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum number of decoded frames kept for instant navigation.
pub const FRAME_CACHE_CAPACITY: usize = 16;

/// Maximum number of children listed per folder in the file tree.
pub const FILE_TREE_MAX_ITEMS: usize = 300;

/// Workspace sub-folders.
pub const PLOTS_DIR: &str = "plots";
pub const MATRICES_DIR: &str = "correlation_matrix";
pub const OUTPUTS_DIR: &str = "outputs";
pub const USER_INPUTS_DIR: &str = "user_inputs";

/// Order in which workspace folders appear in the file tree.
pub const FILE_TREE_FOLDERS: [&str; 4] = [USER_INPUTS_DIR, OUTPUTS_DIR, PLOTS_DIR, MATRICES_DIR];

/// Default workspace folder name below the project root.
pub const DEFAULT_WORKSPACE_DIR: &str = "working_space";

/// Interpreter used when none is given on the command line and none is on PATH.
pub const DEFAULT_INTERPRETER: &str = "julia";

/// Module the worker script imports.
pub const WORKER_MODULE: &str = "JosephsonCircuitsOptimizer";

/// Settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interpreter binary used to launch the worker.
    pub interpreter: PathBuf,
    /// Project root; the worker runs with this as its working directory.
    pub project_root: PathBuf,
    /// Workspace selected when the application starts.
    pub default_workspace: PathBuf,
}

impl AppConfig {
    /// Builds the configuration from process arguments (program name excluded).
    ///
    /// The first argument that does not start with `-` overrides the interpreter.
    pub fn from_args<I>(args: I, project_root: PathBuf) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let interpreter = args
            .into_iter()
            .find(|arg| !arg.to_string_lossy().starts_with('-'))
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                find_on_path(DEFAULT_INTERPRETER, std::env::var_os("PATH"))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER))
            });

        let default_workspace = project_root.join(DEFAULT_WORKSPACE_DIR);

        Self {
            interpreter,
            project_root,
            default_workspace,
        }
    }
}

/// Looks up an executable by name in a `PATH`-style variable.
pub fn find_on_path(name: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| executable_candidates(&dir, name))
        .find(|candidate| candidate.is_file())
}

#[cfg(target_os = "windows")]
fn executable_candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(format!("{}.exe", name)), dir.join(name)]
}

#[cfg(not(target_os = "windows"))]
fn executable_candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}
