use pyref_cache::{CacheConfig, CategoryKind, FreshnessPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use url::Url;

mod logging;

pub use logging::{init_tracing, LogFormat, LoggingConfig};

/// Environment variable pointing at an explicit config file.
pub const PYREF_CONFIG_ENV_VAR: &str = "PYREF_CONFIG_PATH";

/// File name looked up in the working directory.
pub const WORKSPACE_CONFIG_FILENAME: &str = "pyref.toml";

/// File name looked up in the user's home directory.
pub const HOME_CONFIG_FILENAME: &str = ".pyref.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PyrefConfig {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Cache root. When unset, `PYREF_CACHE_DIR` and then `~/.pyref_cache` are used.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Per-category time-to-live overrides.
    #[serde(default)]
    pub ttl: TtlOverrides,
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        match &self.root {
            Some(root) => CacheConfig::at(root.clone()),
            None => CacheConfig::from_env(),
        }
    }
}

/// TTL overrides in seconds. Unset entries keep the built-in defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlOverrides {
    #[serde(default)]
    pub builtins_secs: Option<u64>,
    #[serde(default)]
    pub installed_index_secs: Option<u64>,
    #[serde(default)]
    pub remote_index_secs: Option<u64>,
    #[serde(default)]
    pub remote_detail_secs: Option<u64>,
}

impl TtlOverrides {
    pub fn freshness_policy(&self) -> FreshnessPolicy {
        let overrides = [
            (CategoryKind::Builtins, self.builtins_secs),
            (CategoryKind::InstalledIndex, self.installed_index_secs),
            (CategoryKind::RemoteIndex, self.remote_index_secs),
            (CategoryKind::RemoteDetail, self.remote_detail_secs),
        ];
        overrides
            .into_iter()
            .fold(FreshnessPolicy::default(), |policy, (kind, secs)| match secs {
                Some(secs) => policy.with_ttl(kind, Duration::from_secs(secs)),
                None => policy,
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Interpreter used for package listing and module reflection.
    #[serde(default = "PythonConfig::default_interpreter")]
    pub interpreter: PathBuf,

    /// Timeout for `pip freeze` and the built-ins listing (in milliseconds).
    #[serde(default = "PythonConfig::default_listing_timeout_ms")]
    pub listing_timeout_ms: u64,

    /// Timeout for reflecting a single package (in milliseconds).
    #[serde(default = "PythonConfig::default_inspect_timeout_ms")]
    pub inspect_timeout_ms: u64,
}

impl PythonConfig {
    fn default_interpreter() -> PathBuf {
        PathBuf::from(if cfg!(windows) { "python" } else { "python3" })
    }

    fn default_listing_timeout_ms() -> u64 {
        60_000
    }

    fn default_inspect_timeout_ms() -> u64 {
        // Importing large scientific packages can take several seconds on a cold cache.
        30_000
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_millis(self.listing_timeout_ms.max(1))
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_millis(self.inspect_timeout_ms.max(1))
    }
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: Self::default_interpreter(),
            listing_timeout_ms: Self::default_listing_timeout_ms(),
            inspect_timeout_ms: Self::default_inspect_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Disable all network access. Remote categories are then served from cache only.
    #[serde(default = "RemoteConfig::default_enabled")]
    pub enabled: bool,

    /// Simple-repository listing of every project.
    #[serde(default = "RemoteConfig::default_index_url")]
    pub index_url: Url,

    /// Base of the per-project JSON API; `<base>/<name>/json` is fetched.
    #[serde(default = "RemoteConfig::default_detail_base_url")]
    pub detail_base_url: Url,

    #[serde(default = "RemoteConfig::default_index_timeout_ms")]
    pub index_timeout_ms: u64,

    #[serde(default = "RemoteConfig::default_detail_timeout_ms")]
    pub detail_timeout_ms: u64,
}

impl RemoteConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_index_url() -> Url {
        static URL: OnceLock<Url> = OnceLock::new();
        URL.get_or_init(|| {
            Url::parse("https://pypi.org/simple/").expect("default index url should parse")
        })
        .clone()
    }

    fn default_detail_base_url() -> Url {
        static URL: OnceLock<Url> = OnceLock::new();
        URL.get_or_init(|| {
            Url::parse("https://pypi.org/pypi/").expect("default detail url should parse")
        })
        .clone()
    }

    fn default_index_timeout_ms() -> u64 {
        10_000
    }

    fn default_detail_timeout_ms() -> u64 {
        5_000
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms.max(1))
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_timeout_ms.max(1))
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            index_url: Self::default_index_url(),
            detail_base_url: Self::default_detail_base_url(),
            index_timeout_ms: Self::default_index_timeout_ms(),
            detail_timeout_ms: Self::default_detail_timeout_ms(),
        }
    }
}

/// Overrides for which installed packages and member modules are indexed.
///
/// `None` keeps the built-in lists; `Some(vec![])` disables the corresponding filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub excluded_packages: Option<Vec<String>>,

    /// Appended to the exclusion list (default or overridden).
    #[serde(default)]
    pub extra_excluded_packages: Vec<String>,

    #[serde(default)]
    pub noise_modules: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a snippet of the source text; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

/// Redact user-provided values from a toml/serde error message.
///
/// Quoted strings are replaced wholesale. Backticked segments are redacted only where serde puts
/// user input there (unknown fields/variants and `invalid type` scalars); schema names such as
/// `missing field `root`` are kept.
fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED_STRING_RE: OnceLock<regex::Regex> = OnceLock::new();
    static SINGLE_QUOTED_STRING_RE: OnceLock<regex::Regex> = OnceLock::new();

    let re = QUOTED_STRING_RE.get_or_init(|| {
        regex::Regex::new(r#""(?:\\.|[^"\\])*""#).expect("quoted-string regex should compile")
    });
    let mut out = re.replace_all(message, r#""<redacted>""#).into_owned();

    let re_single = SINGLE_QUOTED_STRING_RE.get_or_init(|| {
        regex::Regex::new(r#"'(?:\\.|[^'\\])*'"#)
            .expect("single-quoted-string regex should compile")
    });
    out = re_single.replace_all(&out, "'<redacted>'").into_owned();

    let mut start = ["unknown field `", "unknown variant `"]
        .iter()
        .filter_map(|pattern| out.find(pattern).map(|pos| pos + pattern.len() - 1))
        .min();
    if start.is_none() && (out.contains("invalid type:") || out.contains("invalid value:")) {
        let boundary = out.find(", expected").unwrap_or(out.len());
        start = out[..boundary].find('`');
    }
    if let Some(start) = start {
        let after_start = &out[start + 1..];
        let end_rel = after_start
            .find("`, expected")
            .or_else(|| after_start.find('`'));
        if let Some(end_rel) = end_rel {
            out.replace_range(start + 1..start + 1 + end_rel, "<redacted>");
        }
    }

    out
}

impl PyrefConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn freshness_policy(&self) -> FreshnessPolicy {
        self.cache.ttl.freshness_policy()
    }

    pub fn cache_config(&self) -> CacheConfig {
        self.cache.cache_config()
    }
}

/// Find the config file to use.
///
/// Search order:
/// 1) `PYREF_CONFIG_PATH` (absolute, or relative to `working_dir`)
/// 2) `pyref.toml` in `working_dir`
/// 3) `.pyref.toml` in the home directory
///
/// The env var wins even when it names a file that does not exist, so a typo surfaces as a
/// read error instead of silently falling back.
pub fn discover_config_path(working_dir: &Path) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(PYREF_CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            working_dir.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from);

    std::iter::once(working_dir.join(WORKSPACE_CONFIG_FILENAME))
        .chain(home.map(|home| home.join(HOME_CONFIG_FILENAME)))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the discovered config, or defaults when no file is present.
pub fn load_discovered(working_dir: &Path) -> Result<(PyrefConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(working_dir) else {
        return Ok((PyrefConfig::default(), None));
    };

    let config = PyrefConfig::load_from_path(&path)?;
    tracing::debug!(target: "pyref.config", path = %path.display(), "loaded config");
    Ok((config, Some(path)))
}
