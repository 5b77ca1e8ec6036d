use crate::category::CacheCategory;
use crate::error::CacheError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the default cache root.
pub const CACHE_DIR_ENV_VAR: &str = "PYREF_CACHE_DIR";

const BUILTINS_FILENAME: &str = "builtins.json";
const INSTALLED_INDEX_FILENAME: &str = "installed_index.json";
const REMOTE_INDEX_FILENAME: &str = "remote_index.json";
const REMOTE_DETAILS_DIRNAME: &str = "remote_details";

/// Configuration for selecting the on-disk cache root.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// Use this directory instead of `~/.pyref_cache`.
    pub cache_root_override: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            cache_root_override: std::env::var_os(CACHE_DIR_ENV_VAR).map(PathBuf::from),
        }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root_override: Some(root.into()),
        }
    }
}

/// The cache root and the fixed file layout beneath it.
#[derive(Clone, Debug)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let root = match config.cache_root_override {
            Some(root) => root,
            None => default_cache_root()?,
        };

        std::fs::create_dir_all(root.join(REMOTE_DETAILS_DIRNAME))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote_details_dir(&self) -> PathBuf {
        self.root.join(REMOTE_DETAILS_DIRNAME)
    }

    /// Path of the record file backing `category`.
    pub fn record_path(&self, category: &CacheCategory) -> PathBuf {
        match category {
            CacheCategory::Builtins => self.root.join(BUILTINS_FILENAME),
            CacheCategory::InstalledIndex => self.root.join(INSTALLED_INDEX_FILENAME),
            CacheCategory::RemoteIndex => self.root.join(REMOTE_INDEX_FILENAME),
            CacheCategory::RemoteDetail(package) => self
                .remote_details_dir()
                .join(format!("{}.json", escape_file_stem(package))),
        }
    }

    pub(crate) fn ensure_under_root(&self, path: &Path) -> Result<(), CacheError> {
        if path.starts_with(&self.root) {
            Ok(())
        } else {
            Err(CacheError::PathNotUnderCacheRoot {
                path: path.to_path_buf(),
                cache_root: self.root.clone(),
            })
        }
    }
}

/// Map an arbitrary package name onto a portable file stem.
///
/// Path separators, wildcard and quoting characters, `.`, and control characters all become
/// `_`. Distinct names can collide (`a.b` and `a_b`); the record envelope keeps the original
/// name so the store can tell them apart.
pub fn escape_file_stem(name: &str) -> String {
    let escaped: String = name
        .chars()
        .map(|ch| match ch {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    if escaped.is_empty() {
        "_".to_owned()
    } else {
        escaped
    }
}

pub(crate) fn default_cache_root() -> Result<PathBuf, CacheError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(CacheError::MissingHomeDir)?;

    Ok(home.join(".pyref_cache"))
}
