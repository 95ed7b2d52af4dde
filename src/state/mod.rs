//! State management for the launcher and viewer.

use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{GalleryService, OpenService, SimulationService};
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub mod gallery;

pub use gallery::{GalleryKind, GalleryState};

/// Application-wide state container.
pub struct AppState {
    pub config: AppConfig,
    /// Workspace handed to new runs and watched by the galleries.
    pub workspace: Arc<Mutex<Workspace>>,
    /// Owner of the single worker slot.
    pub simulation: Arc<SimulationService>,
    pub plots: GalleryService,
    pub matrices: GalleryService,
    pub opener: Arc<OpenService>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let workspace = Workspace::new(config.default_workspace.clone());
        Self {
            plots: GalleryService::new(GalleryKind::Plots, GalleryKind::Plots.directory(&workspace)),
            matrices: GalleryService::new(
                GalleryKind::Matrices,
                GalleryKind::Matrices.directory(&workspace),
            ),
            simulation: Arc::new(SimulationService::new(&config)),
            opener: Arc::new(OpenService::for_current_platform()),
            workspace: Arc::new(Mutex::new(workspace)),
            config,
        }
    }

    pub fn gallery(&self, kind: GalleryKind) -> &GalleryService {
        match kind {
            GalleryKind::Plots => &self.plots,
            GalleryKind::Matrices => &self.matrices,
        }
    }

    pub fn current_workspace(&self) -> Workspace {
        self.workspace.lock().unwrap().clone()
    }

    /// Switches to `root`, creating its folders. Galleries must be retargeted by the caller.
    pub fn set_workspace(&self, root: PathBuf) -> Result<Workspace> {
        let workspace = Workspace::new(root);
        workspace.ensure_structure()?;
        *self.workspace.lock().unwrap() = workspace.clone();
        Ok(workspace)
    }
}
