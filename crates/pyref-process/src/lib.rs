//! Bounded subprocess execution.
//!
//! PyRef talks to the Python interpreter through short-lived child processes. A package whose
//! import hangs or floods stdout must not take the indexer down with it, so every run here has
//! a per-stream capture limit and an optional wall-clock timeout that kills the child's whole
//! process group.

use std::{
    fmt,
    io::{self, Read},
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

/// Captured stdout/stderr, each truncated to [`Limits::max_bytes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream produced more bytes than were kept.
    pub truncated: bool,
}

/// Resource limits for a single run.
#[derive(Debug, Clone)]
pub struct Limits {
    pub timeout: Option<Duration>,
    /// Maximum bytes captured per stream.
    pub max_bytes: usize,
    /// Time between SIGTERM and SIGKILL when a timed-out child is torn down.
    pub kill_grace: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout: None,
            max_bytes: 64 * 1024 * 1024,
            kill_grace: Duration::from_millis(250),
        }
    }
}

impl Limits {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// Program, arguments, and environment for one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            // Inline scripts are long and multi-line; show only that one was passed.
            if arg.contains('\n') {
                f.write_str(" <script>")?;
            } else if arg.contains(' ') || arg.contains('\t') {
                write!(f, " \"{}\"", arg.replace('"', "\\\""))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// A child process that ran to completion or was killed on timeout.
#[derive(Debug, Clone)]
pub struct Completed {
    pub status: ExitStatus,
    pub output: Captured,
    pub timed_out: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run `{invocation}`: {source}")]
    Spawn {
        invocation: Invocation,
        #[source]
        source: io::Error,
    },
    #[error("`{invocation}` timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        invocation: Invocation,
        timeout: Duration,
        output: Captured,
    },
    #[error("`{invocation}` exited with {status}{}", stderr_tail(.output))]
    Failed {
        invocation: Invocation,
        status: ExitStatus,
        output: Captured,
    },
}

impl ProcessError {
    pub fn output(&self) -> Option<&Captured> {
        match self {
            Self::Spawn { .. } => None,
            Self::TimedOut { output, .. } | Self::Failed { output, .. } => Some(output),
        }
    }
}

fn stderr_tail(output: &Captured) -> String {
    let last = output
        .stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty());
    match last {
        Some(line) => format!(": {line}"),
        None => String::new(),
    }
}

/// Run `invocation` under `limits`. Non-zero exits and timeouts are reported in [`Completed`],
/// not as errors.
///
/// The run ends when the child exits. Anything it left running in its process group is killed
/// then, so a background grandchild holding the output pipes cannot outlive the timeout.
pub fn run(invocation: &Invocation, limits: &Limits) -> io::Result<Completed> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .envs(invocation.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &invocation.cwd {
        cmd.current_dir(cwd);
    }

    // Own process group, so a timeout also reaches grandchildren holding our pipes open.
    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;

        cmd.pre_exec(|| {
            // SAFETY: `setpgid` is async-signal-safe and does not allocate.
            if libc::setpgid(0, 0) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    let Some(stdout) = child.stdout.take() else {
        return Err(io::Error::other("child stdout was not captured"));
    };
    let Some(stderr) = child.stderr.take() else {
        return Err(io::Error::other("child stderr was not captured"));
    };

    let max_bytes = limits.max_bytes;
    let stdout_handle = thread::spawn(move || read_bounded(stdout, max_bytes));
    let stderr_handle = thread::spawn(move || read_bounded(stderr, max_bytes));

    let mut timed_out = false;
    let status = match limits.timeout {
        Some(timeout) => {
            let poll = Duration::from_millis(20);
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if start.elapsed() >= timeout {
                    timed_out = true;
                    tracing::debug!(
                        target: "pyref.process",
                        command = %invocation,
                        timeout_ms = timeout.as_millis() as u64,
                        "killing timed-out child process"
                    );
                    break terminate_process_group(&mut child, limits.kill_grace)?;
                }
                thread::sleep(poll.min(timeout.saturating_sub(start.elapsed())));
            }
        }
        None => child.wait()?,
    };
    if !timed_out {
        kill_stragglers(&child);
    }

    let (stdout_bytes, stdout_truncated) = join_reader(stdout_handle, "stdout")??;
    let (stderr_bytes, stderr_truncated) = join_reader(stderr_handle, "stderr")??;

    Ok(Completed {
        status,
        output: Captured {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            truncated: stdout_truncated || stderr_truncated,
        },
        timed_out,
        elapsed: start.elapsed(),
    })
}

/// Like [`run`], but a timeout or a non-zero exit is an error.
pub fn run_checked(invocation: &Invocation, limits: &Limits) -> Result<Completed, ProcessError> {
    let completed = run(invocation, limits).map_err(|source| ProcessError::Spawn {
        invocation: invocation.clone(),
        source,
    })?;

    if completed.timed_out {
        return Err(ProcessError::TimedOut {
            invocation: invocation.clone(),
            timeout: limits.timeout.unwrap_or_default(),
            output: completed.output,
        });
    }
    if !completed.status.success() {
        return Err(ProcessError::Failed {
            invocation: invocation.clone(),
            status: completed.status,
            output: completed.output,
        });
    }

    Ok(completed)
}

fn terminate_process_group(
    child: &mut std::process::Child,
    grace: Duration,
) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        // The group id equals the child's pid because of `setpgid(0, 0)` above.
        let pgid = child.id() as libc::pid_t;
        unsafe {
            let _ = libc::kill(-pgid, libc::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace {
            if let Some(status) = child.try_wait()? {
                // The leader is gone but stragglers in the group may still hold the pipes.
                unsafe {
                    let _ = libc::kill(-pgid, libc::SIGKILL);
                }
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(10));
        }

        unsafe {
            let _ = libc::kill(-pgid, libc::SIGKILL);
        }
        child.wait()
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        let _ = child.kill();
        child.wait()
    }
}

/// SIGKILL whatever is left in the (already reaped) child's process group.
fn kill_stragglers(child: &std::process::Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        // ESRCH just means the group is already empty.
        unsafe {
            let _ = libc::kill(-pgid, libc::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    let _ = child;
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<(Vec<u8>, bool)>>,
    stream: &'static str,
) -> io::Result<io::Result<(Vec<u8>, bool)>> {
    handle
        .join()
        .map_err(|_| io::Error::other(format!("{stream} reader thread panicked")))
}

fn read_bounded(mut reader: impl Read, max_bytes: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut out = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8 * 1024];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        let remaining = max_bytes.saturating_sub(out.len());
        let keep = remaining.min(n);
        out.extend_from_slice(&buf[..keep]);
        truncated |= keep < n;
    }

    Ok((out, truncated))
}
