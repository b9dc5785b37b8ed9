//! Subprocess boundary: the submit command, its captured result, and the executor seam.
//!
//! ## ScriptExecutor Trait
//!
//! The harness never touches `std::process` directly. It hands a [`SubmitCommand`] to a [`ScriptExecutor`], which
//! allows for:
//! - Canned executors in unit tests (no real engine needed)
//! - Alternative execution strategies (remote submission, dry runs)
//!
//! [`SystemExecutor`] preserves the plain behavior: spawn, capture both streams in full, block until exit. With a
//! timeout, the child runs in its own process group and the whole group is killed when the bound elapses.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

/// Interval between exit checks while a bounded wait is in progress.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to keep reading after the child is gone before settling for partial output.
const READER_GRACE: Duration = Duration::from_secs(1);

/// Errors raised at the subprocess boundary.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The submitter could not be started (missing, not executable, ...).
    #[error("failed to launch {}: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The child did not exit within the configured bound and was killed.
    #[error("script did not finish within {timeout:?}")]
    Timeout {
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("I/O error while waiting for the script: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Output captured before a timeout, as `(stdout, stderr)`.
    pub fn partial_output(&self) -> Option<(&str, &str)> {
        match self {
            ExecutionError::Timeout { stdout, stderr, .. } => Some((stdout.as_str(), stderr.as_str())),
            _ => None,
        }
    }
}

/// A fully-specified submitter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommand {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(String, OsString)>,
}

impl SubmitCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Set a variable in the child's environment. Later values for the same name win.
    pub fn env(mut self, name: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        let name = name.into();
        self.envs.retain(|(existing, _)| *existing != name);
        self.envs.push((name, value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn envs(&self) -> &[(String, OsString)] {
        &self.envs
    }

    /// Look up a variable this command sets on the child.
    pub fn env_value(&self, name: &str) -> Option<&OsStr> {
        self.envs
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_os_str())
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<OsString> {
        std::iter::once(self.program.as_os_str().to_os_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Space-joined command line, for logs and diagnostics.
    pub fn display(&self) -> String {
        self.argv()
            .iter()
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (name, value) in &self.envs {
            cmd.env(name, value);
        }
        cmd
    }
}

/// Exit status and decoded output of a finished child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    /// Exit code, or `-1` when the child was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// `(exit_code, stdout, stderr)`.
    pub fn into_parts(self) -> (i32, String, String) {
        (self.exit_code, self.stdout, self.stderr)
    }
}

impl From<Output> for ProcessResult {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Run a submit command to completion and capture its result.
pub trait ScriptExecutor {
    /// Run `command`, blocking until it exits.
    ///
    /// With `timeout` set, the child is killed once the bound elapses and [`ExecutionError::Timeout`] is returned.
    fn execute(&self, command: &SubmitCommand, timeout: Option<Duration>) -> Result<ProcessResult, ExecutionError>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ScriptExecutor for SystemExecutor {
    fn execute(&self, command: &SubmitCommand, timeout: Option<Duration>) -> Result<ProcessResult, ExecutionError> {
        match timeout {
            None => {
                let output = command
                    .to_command()
                    .stdin(Stdio::null())
                    .output()
                    .map_err(|source| launch_error(command, source))?;
                Ok(ProcessResult::from(output))
            }
            Some(limit) => execute_bounded(command, limit),
        }
    }
}

fn launch_error(command: &SubmitCommand, source: std::io::Error) -> ExecutionError {
    ExecutionError::Launch {
        program: command.program.clone(),
        source,
    }
}

fn execute_bounded(command: &SubmitCommand, limit: Duration) -> Result<ProcessResult, ExecutionError> {
    let start = Instant::now();
    let mut cmd = command.to_command();
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // The submitter forks its own children (JVM, Python driver); give them one group to kill.
        cmd.process_group(0);
    }
    let mut child = cmd.spawn().map_err(|source| launch_error(command, source))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout = StreamBuffer::spawn(child.stdout.take(), done_tx.clone());
    let stderr = StreamBuffer::spawn(child.stderr.take(), done_tx);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                terminate(&mut child);
                return Err(e.into());
            }
        }
        if start.elapsed() >= limit {
            terminate(&mut child);
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    // A descendant outside the group may still hold the pipes open; take what has been read so far.
    let deadline = Instant::now() + READER_GRACE;
    let mut open_streams = [&stdout, &stderr].iter().filter(|s| s.reader.is_some()).count();
    while open_streams > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if done_rx.recv_timeout(remaining).is_err() {
            tracing::debug!("Output pipes still open after {:?}; using partial output", READER_GRACE);
            break;
        }
        open_streams -= 1;
    }

    let stdout = stdout.contents();
    let stderr = stderr.contents();

    match status {
        Some(status) => Ok(ProcessResult {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        }),
        None => {
            tracing::warn!("Killed `{}` after {:?}", command.display(), limit);
            Err(ExecutionError::Timeout {
                timeout: limit,
                stdout,
                stderr,
            })
        }
    }
}

/// Kill the child's process group (unix) and the child itself, then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id()) {
            if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                tracing::debug!("killpg({}) failed: {}", pgid, err);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Output collected by a reader thread. Readable at any time, so a stalled pipe still yields partial output.
struct StreamBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl StreamBuffer {
    fn spawn(stream: Option<impl Read + Send + 'static>, done: mpsc::Sender<()>) -> Self {
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let reader = stream.map(|mut stream| {
            let sink = Arc::clone(&bytes);
            thread::spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    match stream.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => match sink.lock() {
                            Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                            Err(_) => break,
                        },
                    }
                }
                let _ = done.send(());
            })
        });
        Self { bytes, reader }
    }

    fn contents(&self) -> String {
        match self.bytes.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_starts_with_program() {
        let cmd = SubmitCommand::new("/opt/spark/bin/spark-submit").arg("--master").arg("local[4]");
        let argv = cmd.argv();
        assert_eq!(argv[0], OsString::from("/opt/spark/bin/spark-submit"));
        assert_eq!(argv[1..], [OsString::from("--master"), OsString::from("local[4]")]);
        assert_eq!(cmd.display(), "/opt/spark/bin/spark-submit --master local[4]");
    }

    #[test]
    fn test_env_last_value_wins() {
        let cmd = SubmitCommand::new("submit").env("PYTHONPATH", "/a").env("PYTHONPATH", "/b");
        assert_eq!(cmd.envs().len(), 1);
        assert_eq!(cmd.env_value("PYTHONPATH"), Some(OsStr::new("/b")));
        assert_eq!(cmd.env_value("HOME"), None);
    }

    #[test]
    fn test_process_result_parts() {
        let result = ProcessResult::new(2, "X\n", "");
        assert!(!result.success());
        assert_eq!(result.into_parts(), (2, "X\n".to_string(), String::new()));
    }

    #[test]
    fn test_process_result_serializes() {
        let json = serde_json::to_value(ProcessResult::new(0, "out", "err")).unwrap();
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["stdout"], "out");
        assert_eq!(json["stderr"], "err");
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let cmd = SubmitCommand::new("/definitely/not/a/real/spark-submit");
        for timeout in [None, Some(Duration::from_secs(5))] {
            let err = SystemExecutor.execute(&cmd, timeout).unwrap_err();
            assert!(matches!(err, ExecutionError::Launch { .. }), "got {:?}", err);
            assert!(err.to_string().contains("/definitely/not/a/real/spark-submit"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_captures_streams() {
        let cmd = SubmitCommand::new("sh").arg("-c").arg("echo out; echo err >&2; exit 3");
        let result = SystemExecutor.execute(&cmd, None).unwrap();
        assert_eq!(result, ProcessResult::new(3, "out\n", "err\n"));

        let bounded = SystemExecutor.execute(&cmd, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(bounded, result);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_passes_env() {
        let cmd = SubmitCommand::new("sh").arg("-c").arg("printf %s \"$CLOUDANT_USER\"").env("CLOUDANT_USER", "admin");
        let result = SystemExecutor.execute(&cmd, None).unwrap();
        assert_eq!(result.stdout, "admin");
    }

    #[cfg(unix)]
    #[test]
    fn test_bounded_wait_kills_hung_child() {
        let cmd = SubmitCommand::new("sh").arg("-c").arg("echo started; exec sleep 30");
        let start = Instant::now();
        let err = SystemExecutor.execute(&cmd, Some(Duration::from_millis(200))).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(20));
        match err {
            ExecutionError::Timeout { timeout, stdout, .. } => {
                assert_eq!(timeout, Duration::from_millis(200));
                assert_eq!(stdout, "started\n");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_bounded_wait_kills_forked_descendants() {
        // No `exec`: the shell forks `sleep`, which inherits the pipes.
        let cmd = SubmitCommand::new("sh").arg("-c").arg("echo started; sleep 30; echo done");
        let start = Instant::now();
        let err = SystemExecutor.execute(&cmd, Some(Duration::from_millis(200))).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());
        assert!(matches!(err, ExecutionError::Timeout { .. }), "got {:?}", err);
        assert_eq!(err.partial_output(), Some(("started\n", "")));
    }

    #[cfg(unix)]
    #[test]
    fn test_bounded_wait_returns_when_background_holder_keeps_pipes() {
        let cmd = SubmitCommand::new("sh").arg("-c").arg("echo hi; sleep 30 & exit 4");
        let start = Instant::now();
        let result = SystemExecutor.execute(&cmd, Some(Duration::from_secs(20))).unwrap();
        assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());
        assert_eq!(result.exit_code, 4);
        assert_eq!(result.stdout, "hi\n");
    }
}
