//! Opening files and folders with the platform's default application.

use crate::file_utils::PathExt;
use log::{info, warn};
use std::io;
use std::path::Path;

/// Platform mechanism that hands a path to the default application.
pub trait OpenStrategy: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// Launches a helper command (`open` on macOS, `xdg-open` elsewhere) with the path.
pub struct LauncherCommand {
    program: &'static str,
}

impl LauncherCommand {
    pub fn new(program: &'static str) -> Self {
        Self { program }
    }
}

impl OpenStrategy for LauncherCommand {
    fn open(&self, path: &Path) -> io::Result<()> {
        let mut child = std::process::Command::new(self.program).arg(path).spawn()?;
        // Reap the launcher without blocking the caller.
        rayon::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Uses the shell's "open" verb on Windows.
#[cfg(target_os = "windows")]
pub struct ShellExecute;

#[cfg(target_os = "windows")]
impl OpenStrategy for ShellExecute {
    fn open(&self, path: &Path) -> io::Result<()> {
        use std::os::windows::ffi::OsStrExt;
        use windows::Win32::UI::Shell::ShellExecuteW;
        use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;
        use windows::core::{PCWSTR, w};

        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // Values above 32 indicate success.
        let result = unsafe {
            ShellExecuteW(
                None,
                w!("open"),
                PCWSTR(wide.as_ptr()),
                PCWSTR::null(),
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };

        if result.0 as isize > 32 {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "ShellExecuteW failed with code {}",
                result.0 as isize
            )))
        }
    }
}

/// Fire-and-forget "open with default application".
pub struct OpenService {
    strategy: Box<dyn OpenStrategy>,
}

impl OpenService {
    pub fn new(strategy: Box<dyn OpenStrategy>) -> Self {
        Self { strategy }
    }

    /// Picks the strategy for the platform this binary was built for.
    pub fn for_current_platform() -> Self {
        #[cfg(target_os = "windows")]
        {
            Self::new(Box::new(ShellExecute))
        }

        #[cfg(target_os = "macos")]
        {
            Self::new(Box::new(LauncherCommand::new("open")))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Self::new(Box::new(LauncherCommand::new("xdg-open")))
        }
    }

    /// Opens `path` in its default application. Failures are logged, never returned.
    ///
    /// Returns whether the request was handed off.
    pub fn open_in_default_application(&self, path: &Path) -> bool {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        match self.strategy.open(&absolute) {
            Ok(()) => {
                info!("Opened {}", absolute.format_for_log());
                true
            }
            Err(e) => {
                warn!("Could not open path: {} ({})", absolute.display(), e);
                false
            }
        }
    }
}
