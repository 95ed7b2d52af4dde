//! UI module for handling user interactions and UI updates.
//!
//! Threading model:
//! - `slint::Timer`: directory polling and worker output draining, on the UI thread
//! - `slint::spawn_local`: async UI work that must stay on the main thread (folder picker)
//! - `rayon::spawn`: image decode and scaling off the UI thread
//! - `slint::invoke_from_event_loop`: returns decoded frames from rayon to the UI thread
//!
//! Worker output never touches the window directly; the drain timer pulls it
//! from the controller's channel.

mod console;
mod gallery_display;
pub mod handlers;
mod state_helpers;

pub use handlers::setup_handlers;
