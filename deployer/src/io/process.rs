//! Helpers for running external tools with bounded waits and bounded output.
//!
//! Every external invocation (git, the test interpreter, the deploy CLI) goes
//! through the [`CommandRunner`] trait so orchestration can be exercised with
//! scripted runners in tests.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub cwd: Option<PathBuf>,
    /// Upper bound on wall-clock time before the child is killed.
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured child process output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Zero exit within the time bound.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// stdout followed by stderr, as the deploy tool prints its URL on either.
    pub fn combined_text(&self) -> String {
        let mut combined = self.stdout_text();
        combined.push_str(&self.stderr_text());
        combined
    }
}

/// Abstraction over external process execution.
pub trait CommandRunner {
    /// Run `spec` to completion or until its timeout elapses.
    ///
    /// Returns `Err` only when the command could not be run at all (spawn or
    /// wait failure). Non-zero exits and timeouts are reported in the output.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runner that spawns real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    output_limit_bytes: usize,
}

impl SystemRunner {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        run_command_with_timeout(cmd, spec.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {}", spec.program))
    }
}

/// How long reader threads may keep draining after the time bound has passed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

type Captured = (Vec<u8>, usize);

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
///
/// On unix the child leads its own process group. A child that outlives `timeout` is killed
/// together with everything it spawned, reaped, and the output is flagged `timed_out`. Readers
/// still blocked `DRAIN_GRACE` after the bound (a descendant that escaped the group holds the
/// pipes) are abandoned, so the call never outlasts `timeout + DRAIN_GRACE`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (tx, rx) = mpsc::channel();
    spawn_reader(Stream::Stdout, stdout, output_limit_bytes, tx.clone());
    spawn_reader(Stream::Stderr, stderr, output_limit_bytes, tx);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing process group"
            );
            timed_out = true;
            kill_process_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    let drain_deadline = started
        .checked_add(timeout.saturating_add(DRAIN_GRACE))
        .ok_or_else(|| anyhow!("timeout {timeout:?} is out of range"))?;
    let ((stdout, stdout_truncated), (stderr, stderr_truncated)) =
        collect_output(&rx, drain_deadline)?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, elapsed = ?started.elapsed(), "command finished");
    Ok(CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    reader: R,
    limit: usize,
    tx: mpsc::Sender<(Stream, Result<Captured>)>,
) {
    thread::spawn(move || {
        // The receiver is gone once the drain deadline passed; nothing left to report to.
        let _ = tx.send((stream, read_stream_limited(reader, limit)));
    });
}

/// Wait for both readers until `deadline`; missing streams come back empty.
fn collect_output(
    rx: &mpsc::Receiver<(Stream, Result<Captured>)>,
    deadline: Instant,
) -> Result<(Captured, Captured)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, result)) => stdout = Some(result.context("read stdout")?),
            Ok((Stream::Stderr, result)) => stderr = Some(result.context("read stderr")?),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    stdout_done = stdout.is_some(),
                    stderr_done = stderr.is_some(),
                    "output pipes still open after drain deadline, abandoning readers"
                );
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        }
    }
    Ok((stdout.unwrap_or_default(), stderr.unwrap_or_default()))
}

/// Kill the child's whole process group.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => {
            warn!(err = %err, "killpg failed, killing child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_stream_limited_counts_discarded_bytes() {
        let input = vec![b'x'; 100];
        let (kept, truncated) = read_stream_limited(input.as_slice(), 40).expect("read");
        assert_eq!(kept.len(), 40);
        assert_eq!(truncated, 60);
    }

    #[test]
    fn spec_display_joins_program_and_args() {
        let spec = CommandSpec::new("git", Duration::from_secs(1))
            .arg("clone")
            .args(["url", "dest"]);
        assert_eq!(spec.to_string(), "git clone url dest");
    }

    #[test]
    fn timed_out_output_is_not_success() {
        let output = CommandOutput {
            exit_code: Some(0),
            timed_out: true,
            ..CommandOutput::default()
        };
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn captures_exit_code_and_output() {
        let runner = SystemRunner::new(1024);
        let spec = CommandSpec::new("sh", Duration::from_secs(10))
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = runner.run(&spec).expect("run");
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout_text().trim(), "out");
        assert_eq!(output.stderr_text().trim(), "err");
        assert!(!output.timed_out);
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn kills_command_past_its_bound() {
        let runner = SystemRunner::new(1024);
        let spec = CommandSpec::new("sleep", Duration::from_millis(200)).arg("5");
        let output = runner.run(&spec).expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_requested_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("write marker");
        let runner = SystemRunner::new(1024);
        let spec = CommandSpec::new("cat", Duration::from_secs(10))
            .arg("marker.txt")
            .current_dir(temp.path());
        let output = runner.run(&spec).expect("run");
        assert!(output.success());
        assert_eq!(output.stdout_text(), "here");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_background_descendants() {
        let runner = SystemRunner::new(1024);
        let spec = CommandSpec::new("sh", Duration::from_millis(300))
            .arg("-c")
            .arg("sleep 5 & wait");
        let started = Instant::now();
        let output = runner.run(&spec).expect("run");
        let elapsed = started.elapsed();
        assert!(output.timed_out);
        assert!(
            elapsed < Duration::from_secs(2),
            "bound of 300ms took {elapsed:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn lingering_pipe_holder_does_not_block_past_drain_deadline() {
        let runner = SystemRunner::new(1024);
        let spec = CommandSpec::new("sh", Duration::from_millis(200))
            .arg("-c")
            .arg("echo started; sleep 5 & exit 0");
        let started = Instant::now();
        let output = runner.run(&spec).expect("run");
        let elapsed = started.elapsed();
        assert!(output.success());
        assert!(
            elapsed < Duration::from_millis(200) + DRAIN_GRACE + Duration::from_secs(1),
            "drain took {elapsed:?}"
        );
    }

    #[test]
    fn missing_program_is_an_error() {
        let runner = SystemRunner::new(1024);
        let spec = CommandSpec::new("definitely-not-a-real-program-xyz", Duration::from_secs(1));
        assert!(runner.run(&spec).is_err());
    }
}
