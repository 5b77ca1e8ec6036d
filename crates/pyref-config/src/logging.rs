use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Once};

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `warn`, `debug`, ... or an `EnvFilter` directive such as `pyref.remote=debug`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Write to stderr. The CLI owns stdout, so logs never go there.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Also append to this file. An unopenable file only disables the file sink.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    /// Canonical directives for `level`. Bare level names (any case, plus `warning`) are
    /// lowercased; anything else is passed through as an `EnvFilter` directive string.
    pub(crate) fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return Self::default_level();
        }
        if level.eq_ignore_ascii_case("warning") {
            return "warn".to_owned();
        }
        match LevelFilter::from_str(level) {
            Ok(filter) if !level.contains('=') => filter.to_string().to_ascii_lowercase(),
            _ => level.to_owned(),
        }
    }

    /// The configured directives, followed by `RUST_LOG` when it is set so the environment
    /// wins for any target it names.
    pub fn filter(&self) -> EnvFilter {
        let configured = self.directives();
        let from_env = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let candidates = match from_env {
            Some(env) => vec![format!("{configured},{}", env.trim()), configured],
            None => vec![configured],
        };
        candidates
            .iter()
            .find_map(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::default().add_directive(LevelFilter::WARN.into()))
    }

    fn open_log_file(&self) -> Option<Result<Arc<File>, (PathBuf, io::Error)>> {
        let path = self.file.as_ref()?;
        Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(Arc::new)
                .map_err(|err| (path.clone(), err)),
        )
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: LogFormat::default(),
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

static INIT: Once = Once::new();

/// Install the process-wide subscriber. Later calls are no-ops, so tests and the CLI can both
/// call it freely.
pub fn init_tracing(config: &LoggingConfig) {
    INIT.call_once(|| install(config));
}

fn install(config: &LoggingConfig) {
    let mut writer = if !config.stderr {
        BoxMakeWriter::new(io::sink)
    } else if cfg!(debug_assertions) {
        // Routed through the test harness so `cargo test` captures it.
        BoxMakeWriter::new(tracing_subscriber::fmt::writer::TestWriter::with_stderr)
    } else {
        BoxMakeWriter::new(io::stderr)
    };

    let mut file_error = None;
    match config.open_log_file() {
        Some(Ok(file)) => writer = BoxMakeWriter::new(writer.and(file)),
        Some(Err(err)) => file_error = Some(err),
        None => {}
    }

    let fmt = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);
    let fmt: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = match config.format {
        LogFormat::Text => fmt.boxed(),
        LogFormat::Json => fmt.json().boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt)
        .try_init()
        .is_ok();

    if let (true, Some((path, err))) = (installed, file_error) {
        tracing::warn!(
            target: "pyref.config",
            path = %path.display(),
            error = %err,
            "cannot open log file; logging to stderr only"
        );
    }
}
