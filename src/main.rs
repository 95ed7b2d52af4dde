// Prevent console window in addition to Slint window in Windows release builds when, e.g., starting the app via file manager. Ignored on other platforms.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

slint::include_modules!();

mod config;
mod error;
mod file_utils;
mod image_cache;
mod image_loader;
mod metadata;
mod services;
mod state;
mod ui;
mod workspace;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = env_logger::Builder::from_default_env();
    #[cfg(debug_assertions)]
    logger.filter_level(log::LevelFilter::Debug);
    logger.init();

    let project_root = std::env::current_dir()?;
    let config = config::AppConfig::from_args(std::env::args_os().skip(1), project_root);
    log::info!(
        "Using interpreter {} with project {}",
        config.interpreter.display(),
        config.project_root.display()
    );

    let app = AppWindow::new()?;
    let app_state = state::AppState::new(config);

    // Setup all UI event handlers; the runtime keeps the timers alive
    let _runtime = ui::setup_handlers(&app, app_state);

    app.run()?;

    Ok(())
}
