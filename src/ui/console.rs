//! Simulation output console.

use crate::config::CONSOLE_MAX_ENTRIES;
use crate::{LogEntry, MessageKind};
use chrono::Local;
use slint::{ComponentHandle, Model, ModelRc, VecModel};
use std::rc::Rc;

/// Message list shown in the "Simulation Output" panel.
///
/// Keeps the newest `max_entries` messages and follows the last one.
#[derive(Clone)]
pub struct Console {
    ui: slint::Weak<crate::AppWindow>,
    entries: Rc<VecModel<LogEntry>>,
    max_entries: usize,
}

impl Console {
    /// Creates an empty console bound to the window.
    pub fn attach(ui: &crate::AppWindow) -> Self {
        let entries = Rc::new(VecModel::<LogEntry>::default());
        ui.global::<crate::ViewerState>()
            .set_log_entries(ModelRc::from(entries.clone()));
        Self {
            ui: ui.as_weak(),
            entries,
            max_entries: CONSOLE_MAX_ENTRIES,
        }
    }

    /// Console with no window, for exercising handlers in tests.
    #[cfg(test)]
    pub fn detached(max_entries: usize) -> Self {
        Self {
            ui: slint::Weak::default(),
            entries: Rc::new(VecModel::default()),
            max_entries,
        }
    }

    pub fn log(&self, kind: MessageKind, message: impl Into<String>) {
        self.entries.push(LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string().into(),
            message: message.into().into(),
            kind,
        });
        while self.entries.row_count() > self.max_entries {
            self.entries.remove(0);
        }

        if let Some(ui) = self.ui.upgrade() {
            ui.invoke_scroll_console_to_end();
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(MessageKind::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(MessageKind::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(MessageKind::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(MessageKind::Error, message);
    }

    pub fn clear(&self) {
        self.entries.set_vec(Vec::new());
    }

    /// Message texts, oldest first.
    #[cfg(test)]
    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.message.to_string()).collect()
    }
}
