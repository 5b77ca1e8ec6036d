use pyref_config::PythonConfig;
use pyref_process::{run_checked, Completed, Invocation, Limits, ProcessError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to launch Python, and how long each kind of call may take.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PythonInterpreter {
    program: PathBuf,
    listing_timeout: Duration,
    inspect_timeout: Duration,
}

impl PythonInterpreter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let defaults = PythonConfig::default();
        Self {
            program: program.into(),
            listing_timeout: defaults.listing_timeout(),
            inspect_timeout: defaults.inspect_timeout(),
        }
    }

    pub fn from_config(config: &PythonConfig) -> Self {
        Self {
            program: config.interpreter.clone(),
            listing_timeout: config.listing_timeout(),
            inspect_timeout: config.inspect_timeout(),
        }
    }

    pub fn with_listing_timeout(mut self, timeout: Duration) -> Self {
        self.listing_timeout = timeout;
        self
    }

    pub fn with_inspect_timeout(mut self, timeout: Duration) -> Self {
        self.inspect_timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn listing_timeout(&self) -> Duration {
        self.listing_timeout
    }

    pub fn inspect_timeout(&self) -> Duration {
        self.inspect_timeout
    }

    /// Base invocation: UTF-8 stdio, no pip self-update nag, and a neutral working directory so
    /// stray files in the caller's cwd cannot shadow real packages.
    pub(crate) fn invocation(&self) -> Invocation {
        Invocation::new(&self.program)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
            .current_dir(std::env::temp_dir())
    }

    pub(crate) fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<Completed, ProcessError> {
        let completed = run_checked(invocation, &Limits::with_timeout(timeout))?;
        tracing::trace!(
            target: "pyref.python",
            invocation = %invocation,
            elapsed_ms = completed.elapsed.as_millis() as u64,
            "python call finished"
        );
        Ok(completed)
    }
}

impl Default for PythonInterpreter {
    fn default() -> Self {
        Self::from_config(&PythonConfig::default())
    }
}

/// The last non-empty stdout line. Helper scripts print exactly one JSON line; anything before
/// it was printed by imported code.
pub(crate) fn last_line(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
}
