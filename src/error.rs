//! Unified error types for the launcher and viewer.

use std::fmt;

/// Application-specific errors.
#[derive(Debug)]
pub enum AppError {
    /// Error loading or decoding an image file
    ImageLoad(String),
    /// Error scanning or modifying a directory
    DirectoryScan(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ImageLoad(msg) => write!(f, "Image load error: {}", msg),
            AppError::DirectoryScan(msg) => write!(f, "Directory scan error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::ImageLoad(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::DirectoryScan(err.to_string())
    }
}

/// Type alias for Results in this application.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors reported by the worker process controller.
///
/// None of these are fatal; the caller reports them and stays in its current state.
#[derive(Debug)]
pub enum ControllerError {
    /// A worker is already live.
    AlreadyRunning,
    /// Stop was requested with no live worker.
    NotRunning,
    /// The operating system refused to create the worker process.
    Spawn(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::AlreadyRunning => write!(f, "Simulation already running!"),
            ControllerError::NotRunning => write!(f, "No simulation running."),
            ControllerError::Spawn(msg) => write!(f, "Error running simulation: {}", msg),
        }
    }
}

impl std::error::Error for ControllerError {}
