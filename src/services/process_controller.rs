//! Lifecycle control for the external worker process.
//!
//! At most one worker is live at a time. Its stdout and stderr are drained on
//! dedicated threads into a bounded channel owned by the caller, one line per
//! event in the order the pipes deliver them. Exit is detected by polling the
//! process, not by end of output, so a grandchild holding the pipes open does
//! not keep the run alive. A natural exit is reported as a final event; an
//! explicit stop just closes the stream.

use crate::config::OUTPUT_CHANNEL_CAPACITY;
use crate::error::ControllerError;
use log::{debug, info, warn};
use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the drain thread checks whether the worker has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long readers may keep forwarding output after the worker is gone.
const OUTPUT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Program, arguments and working directory of a worker launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(self.program());
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = self.working_dir() {
            command.current_dir(dir);
        }
        command
    }
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Running,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "stopped"),
            WorkerStatus::Running => write!(f, "running"),
        }
    }
}

/// How a worker ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

impl From<ExitStatus> for ExitSummary {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }
}

/// Event produced by the drain threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One line of combined stdout/stderr, without its line terminator.
    Line(String),
    /// The worker exited by itself. Always the last event of a run.
    Exited(ExitSummary),
}

/// Output of one worker run.
///
/// Iterating blocks for the next event and ends after `Exited`, or once the
/// stream is closed after a stop. The stream cannot be restarted.
pub struct WorkerOutput {
    run_id: u64,
    pid: u32,
    events: Receiver<WorkerEvent>,
    finished: bool,
}

impl WorkerOutput {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Next event if one is ready, without blocking.
    pub fn try_next(&self) -> Result<WorkerEvent, TryRecvError> {
        self.events.try_recv()
    }
}

impl Iterator for WorkerOutput {
    type Item = WorkerEvent;

    fn next(&mut self) -> Option<WorkerEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().ok();
        self.finished = matches!(event, None | Some(WorkerEvent::Exited(_)));
        event
    }
}

/// The single live worker.
struct WorkerHandle {
    run_id: u64,
    pid: u32,
    child: Child,
}

type Slot = Arc<Mutex<Option<WorkerHandle>>>;

/// Sending side of a run's event stream, shared by the reader threads.
///
/// Once closed, late lines are dropped so `Exited` stays the last event.
struct EventSink {
    tx: SyncSender<WorkerEvent>,
    open: Mutex<bool>,
}

impl EventSink {
    fn new(tx: SyncSender<WorkerEvent>) -> Self {
        Self {
            tx,
            open: Mutex::new(true),
        }
    }

    /// Forwards a line. Returns `false` once nobody wants more lines.
    fn send_line(&self, line: String) -> bool {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        *open && self.tx.send(WorkerEvent::Line(line)).is_ok()
    }

    fn close(&self, last: Option<WorkerEvent>) {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        *open = false;
        if let Some(event) = last {
            let _ = self.tx.send(event);
        }
    }
}

fn lock_slot(slot: &Mutex<Option<WorkerHandle>>) -> MutexGuard<'_, Option<WorkerHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the worker slot. Start and stop are safe to call from any thread.
pub struct ProcessController {
    slot: Slot,
    next_run_id: AtomicU64,
}

impl Default for ProcessController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessController {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        if lock_slot(&self.slot).is_some() {
            WorkerStatus::Running
        } else {
            WorkerStatus::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == WorkerStatus::Running
    }

    /// Spawns the worker and starts draining its output.
    ///
    /// The slot stays locked from the liveness check until the new handle is
    /// stored, so two rapid calls can never both spawn.
    pub fn start(&self, command: &WorkerCommand) -> Result<WorkerOutput, ControllerError> {
        let mut slot = lock_slot(&self.slot);
        if slot.is_some() {
            return Err(ControllerError::AlreadyRunning);
        }

        let mut child = command.to_command().spawn().map_err(|e| {
            ControllerError::Spawn(format!("{}: {}", command.program().display(), e))
        })?;

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, rx) = mpsc::sync_channel(OUTPUT_CHANNEL_CAPACITY);
        let sink = Arc::new(EventSink::new(tx));

        let drain_slot = Arc::clone(&self.slot);
        let spawned = thread::Builder::new()
            .name(format!("worker-output-{}", run_id))
            .spawn(move || drain_output(run_id, stdout, stderr, sink, drain_slot));

        if let Err(e) = spawned {
            let _ = child.kill();
            rayon::spawn(move || {
                let _ = child.wait();
            });
            return Err(ControllerError::Spawn(format!(
                "failed to start output reader: {}",
                e
            )));
        }

        info!("Worker {} started with pid {}", run_id, pid);
        *slot = Some(WorkerHandle { run_id, pid, child });

        Ok(WorkerOutput {
            run_id,
            pid,
            events: rx,
            finished: false,
        })
    }

    /// Sends the worker a terminate request without waiting for it to die.
    ///
    /// The slot is cleared immediately; the process is reaped in the background.
    pub fn stop(&self) -> Result<(), ControllerError> {
        let WorkerHandle {
            run_id,
            pid,
            mut child,
        } = lock_slot(&self.slot)
            .take()
            .ok_or(ControllerError::NotRunning)?;

        if let Err(e) = terminate(&mut child) {
            debug!("Worker {} (pid {}) was already gone: {}", run_id, pid, e);
        }
        rayon::spawn(move || {
            let _ = child.wait();
        });

        info!("Worker {} (pid {}) stopped", run_id, pid);
        Ok(())
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

/// Asks the process to shut down: SIGTERM on Unix, `TerminateProcess` elsewhere.
///
/// The child is not yet reaped, so its pid cannot have been reused.
#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(child.id()).map_err(std::io::Error::other)?;
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn drain_output(
    run_id: u64,
    stdout: Option<impl Read + Send + 'static>,
    stderr: Option<impl Read + Send + 'static>,
    sink: Arc<EventSink>,
    slot: Slot,
) {
    let mut readers: Vec<JoinHandle<()>> = Vec::new();
    if let Some(stdout) = stdout {
        let sink = Arc::clone(&sink);
        readers.push(thread::spawn(move || forward_lines(stdout, &sink)));
    }
    if let Some(stderr) = stderr {
        let sink = Arc::clone(&sink);
        readers.push(thread::spawn(move || forward_lines(stderr, &sink)));
    }

    let summary = await_exit(run_id, &slot);

    let deadline = Instant::now() + OUTPUT_GRACE_PERIOD;
    while readers.iter().any(|reader| !reader.is_finished()) && Instant::now() < deadline {
        thread::sleep(EXIT_POLL_INTERVAL);
    }
    if readers.iter().any(|reader| !reader.is_finished()) {
        debug!("Worker {} output still open after exit, detaching readers", run_id);
    }

    if let Some(summary) = &summary {
        if !summary.success {
            warn!("Worker {} exited with {:?}", run_id, summary.code);
        }
    }
    sink.close(summary.map(WorkerEvent::Exited));
}

/// Sends each line of `reader` until EOF or until the sink stops accepting lines.
fn forward_lines(reader: impl Read, sink: &EventSink) {
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer).trim_end().to_string();
                if !sink.send_line(line) {
                    break;
                }
            }
            Err(e) => {
                debug!("Worker output read failed: {}", e);
                break;
            }
        }
    }
}

/// Waits for run `run_id` to exit and clears the slot.
///
/// Returns `None` if the slot no longer holds this run, meaning it was stopped
/// explicitly and has already been finalized.
fn await_exit(run_id: u64, slot: &Mutex<Option<WorkerHandle>>) -> Option<ExitSummary> {
    loop {
        {
            let mut guard = lock_slot(slot);
            let handle = guard.as_mut().filter(|handle| handle.run_id == run_id)?;
            match handle.child.try_wait() {
                Ok(Some(status)) => {
                    guard.take();
                    return Some(status.into());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Could not query worker {} status: {}", run_id, e);
                    guard.take();
                    return Some(ExitSummary {
                        code: None,
                        success: false,
                    });
                }
            }
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}
