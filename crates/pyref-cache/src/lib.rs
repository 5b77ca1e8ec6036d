//! Persisted category records and their freshness policy.
//!
//! This crate implements the durable half of PyRef's tiered cache:
//! - a cache root with one JSON record per category
//! - atomic full-replace writes (temp file + rename)
//! - corruption self-healing (an undecodable record is deleted and treated as absent)
//! - a per-category time-to-live table that decides whether a record is still valid
//!
//! ## On-disk layout (inventory)
//!
//! Everything lives under `<cache_root>/` (default `~/.pyref_cache`, overridable via
//! [`CacheConfig`] or `PYREF_CACHE_DIR`):
//! - `builtins.json`: [`CacheCategory::Builtins`]
//! - `installed_index.json`: [`CacheCategory::InstalledIndex`]
//! - `remote_index.json`: [`CacheCategory::RemoteIndex`]
//! - `remote_details/<escaped>.json`: [`CacheCategory::RemoteDetail`], one file per package,
//!   named via [`escape_file_stem`]
//!
//! Every file is a JSON envelope (`schema_version`, `category`, `written_at_millis`,
//! `payload`). The payload type is chosen by the caller.

mod cache_dir;
mod category;
mod error;
mod freshness;
mod store;
mod util;

pub use cache_dir::{escape_file_stem, CacheConfig, CacheDir, CACHE_DIR_ENV_VAR};
pub use category::{CacheCategory, CategoryKind};
pub use error::CacheError;
pub use freshness::{Clock, FreshnessPolicy, ManualClock, SystemClock};
pub use store::{CacheLookup, CacheRecord, RecordInfo, RecordStore, RECORD_SCHEMA_VERSION};
pub use util::{atomic_write, now_millis, MAX_RECORD_BYTES};

pub type Result<T> = std::result::Result<T, CacheError>;
