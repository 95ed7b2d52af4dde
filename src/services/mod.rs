//! Service layer for business logic.
//!
//! Keeps process control, gallery polling and platform calls out of the UI
//! handlers so they can be exercised without a window.

pub mod gallery_service;
pub mod open_service;
pub mod process_controller;
pub mod simulation_service;

pub use gallery_service::{GalleryService, GalleryUpdate};
pub use open_service::OpenService;
pub use process_controller::{WorkerEvent, WorkerOutput};
pub use simulation_service::{EntryPoint, SimulationService};
