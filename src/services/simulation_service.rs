//! Service for launching optimizer runs.
//!
//! Builds the interpreter invocation for an entry point and hands it to the
//! process controller.

use crate::config::{AppConfig, WORKER_MODULE};
use crate::error::ControllerError;
use crate::services::process_controller::{
    ProcessController, WorkerCommand, WorkerOutput, WorkerStatus,
};
use crate::workspace::Workspace;
use log::info;
use std::path::{Path, PathBuf};

/// Function of the worker module to invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// The main optimizer run writing into a workspace.
    Run {
        workspace: PathBuf,
        create_workspace: bool,
    },
    /// Any other exported function, called without arguments.
    Function(String),
}

impl EntryPoint {
    /// Ad hoc entry point. The name must be a plain identifier.
    pub fn function(name: &str) -> Option<Self> {
        let name = name.trim();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '!');

        if valid_start && valid_rest {
            Some(EntryPoint::Function(name.to_string()))
        } else {
            None
        }
    }

    fn call_expression(&self) -> String {
        match self {
            EntryPoint::Run {
                workspace,
                create_workspace,
            } => format!(
                "run(workspace={}, create_workspace={})",
                string_literal(&forward_slashes(workspace)),
                create_workspace
            ),
            EntryPoint::Function(name) => format!("{}()", name),
        }
    }
}

/// The interpreter expects forward slashes even on Windows.
fn forward_slashes(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Quoted string literal for the inline script. Quotes, backslashes and `$`
/// are escaped so user paths cannot end the string or interpolate.
fn string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '$') {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push('"');
    literal
}

/// Launches optimizer runs through a single process controller.
pub struct SimulationService {
    interpreter: PathBuf,
    project_root: PathBuf,
    controller: ProcessController,
}

impl SimulationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            project_root: config.project_root.clone(),
            controller: ProcessController::new(),
        }
    }

    /// Inline script that activates the project and calls `entry`.
    pub fn script(&self, entry: &EntryPoint) -> String {
        let project = string_literal(&forward_slashes(&self.project_root));
        let src = string_literal(&forward_slashes(&self.project_root.join("src")));
        format!(
            "using Pkg\n\
             Pkg.activate({project})\n\
             push!(LOAD_PATH, {src})\n\
             using {module}\n\
             {module}.{call}\n",
            project = project,
            src = src,
            module = WORKER_MODULE,
            call = entry.call_expression(),
        )
    }

    /// Full command line for `entry`, run from the project root.
    pub fn command(&self, entry: &EntryPoint) -> WorkerCommand {
        WorkerCommand::new(&self.interpreter)
            .arg(format!("--project={}", forward_slashes(&self.project_root)))
            .arg("-e")
            .arg(self.script(entry))
            .current_dir(&self.project_root)
    }

    /// Starts a full run writing into `workspace`, creating its folders first.
    pub fn start_run(&self, workspace: &Workspace) -> Result<WorkerOutput, ControllerError> {
        if self.controller.is_running() {
            return Err(ControllerError::AlreadyRunning);
        }
        workspace
            .ensure_structure()
            .map_err(|e| ControllerError::Spawn(e.to_string()))?;

        let entry = EntryPoint::Run {
            workspace: workspace.root().to_path_buf(),
            create_workspace: true,
        };
        info!("Starting run in {}", workspace.root().display());
        self.controller.start(&self.command(&entry))
    }

    /// Starts an ad hoc entry point.
    pub fn run_function(&self, entry: &EntryPoint) -> Result<WorkerOutput, ControllerError> {
        info!("Running entry point {:?}", entry);
        self.controller.start(&self.command(entry))
    }

    pub fn stop(&self) -> Result<(), ControllerError> {
        self.controller.stop()
    }

    pub fn status(&self) -> WorkerStatus {
        self.controller.status()
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(interpreter: &str, project_root: &Path) -> SimulationService {
        SimulationService::new(&AppConfig {
            interpreter: PathBuf::from(interpreter),
            project_root: project_root.to_path_buf(),
            default_workspace: project_root.join("working_space"),
        })
    }

    #[test]
    fn run_script_activates_project_and_passes_workspace() {
        let service = service("julia", Path::new("/proj"));
        let entry = EntryPoint::Run {
            workspace: PathBuf::from("/data/exp1"),
            create_workspace: true,
        };

        let script = service.script(&entry);

        assert_eq!(
            script,
            "using Pkg\n\
             Pkg.activate(\"/proj\")\n\
             push!(LOAD_PATH, \"/proj/src\")\n\
             using JosephsonCircuitsOptimizer\n\
             JosephsonCircuitsOptimizer.run(workspace=\"/data/exp1\", create_workspace=true)\n"
        );
    }

    #[test]
    fn paths_are_escaped_in_script() {
        let service = service("julia", Path::new("/pro$j"));
        let entry = EntryPoint::Run {
            workspace: PathBuf::from("/data/a\"b$c"),
            create_workspace: false,
        };

        let script = service.script(&entry);

        assert!(script.contains("Pkg.activate(\"/pro\\$j\")"));
        assert!(script.contains("push!(LOAD_PATH, \"/pro\\$j/src\")"));
        assert!(script.contains("run(workspace=\"/data/a\\\"b\\$c\", create_workspace=false)"));
    }

    #[test]
    fn command_uses_project_flag_and_root_as_cwd() {
        let service = service("/opt/julia", Path::new("/proj"));
        let command = service.command(&EntryPoint::Function("sweep".into()));

        assert_eq!(command.program(), &PathBuf::from("/opt/julia"));
        assert_eq!(command.args()[0], "--project=/proj");
        assert_eq!(command.args()[1], "-e");
        assert!(
            command.args()[2]
                .to_string_lossy()
                .ends_with("JosephsonCircuitsOptimizer.sweep()\n")
        );
        assert_eq!(command.working_dir(), Some(&PathBuf::from("/proj")));
    }

    #[test]
    fn function_names_must_be_identifiers() {
        assert_eq!(
            EntryPoint::function(" optimize_all "),
            Some(EntryPoint::Function("optimize_all".into()))
        );
        assert!(EntryPoint::function("").is_none());
        assert!(EntryPoint::function("1run").is_none());
        assert!(EntryPoint::function("run(); rm").is_none());
    }

    #[test]
    fn start_run_with_missing_interpreter_prepares_workspace_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let service = service("/nonexistent/julia", dir.path());
        let workspace = Workspace::new(dir.path().join("ws"));

        let result = service.start_run(&workspace);

        assert!(matches!(result, Err(ControllerError::Spawn(_))));
        assert!(workspace.plots_dir().is_dir());
        assert!(workspace.user_inputs_dir().is_dir());
        assert_eq!(service.status(), WorkerStatus::Idle);
    }
}
