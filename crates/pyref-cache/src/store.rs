use crate::cache_dir::{CacheConfig, CacheDir};
use crate::category::CacheCategory;
use crate::error::CacheError;
use crate::freshness::FreshnessPolicy;
use crate::util::{
    atomic_write, read_file_limited, remove_file_best_effort, MAX_RECORD_BYTES, TMP_MARKER,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version of the on-disk record envelope. Records with any other version are discarded.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// A decoded category record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheRecord<T> {
    pub category: CacheCategory,
    pub payload: T,
    pub written_at_millis: u64,
}

impl<T> CacheRecord<T> {
    pub fn is_fresh(&self, policy: &FreshnessPolicy, now_millis: u64) -> bool {
        policy.is_valid(self.category.kind(), self.written_at_millis, now_millis)
    }
}

/// Result of consulting the store through a [`FreshnessPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Fresh(CacheRecord<T>),
    /// A readable record whose TTL has elapsed. Callers may still fall back to it when
    /// recomputation fails.
    Stale(CacheRecord<T>),
    Missing,
}

impl<T> CacheLookup<T> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn fresh(self) -> Option<CacheRecord<T>> {
        match self {
            Self::Fresh(record) => Some(record),
            Self::Stale(_) | Self::Missing => None,
        }
    }

    /// The record regardless of its age.
    pub fn into_record(self) -> Option<CacheRecord<T>> {
        match self {
            Self::Fresh(record) | Self::Stale(record) => Some(record),
            Self::Missing => None,
        }
    }
}

/// Size and timestamp of a stored record, without its payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordInfo {
    pub category: CacheCategory,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub written_at_millis: u64,
}

#[derive(Debug, Serialize)]
struct PersistedRecord<'a, T> {
    schema_version: u32,
    category: &'a CacheCategory,
    written_at_millis: u64,
    payload: &'a T,
}

#[derive(Debug, Deserialize)]
struct PersistedRecordOwned<T> {
    schema_version: u32,
    category: CacheCategory,
    written_at_millis: u64,
    payload: T,
}

enum Decoded<T> {
    Record(PersistedRecordOwned<T>),
    /// The slot holds a valid record for a different package whose name escapes to the same
    /// file stem. That record belongs to someone else, so it is neither used nor deleted.
    Collision,
    Corrupt(&'static str),
}

/// Category-keyed JSON records under a [`CacheDir`].
///
/// Reads never fail: anything that is missing, oversized, or undecodable is a miss, and
/// undecodable files are deleted so a corrupted cache cannot wedge later runs. Writes are
/// atomic full replacements.
#[derive(Clone, Debug)]
pub struct RecordStore {
    dir: CacheDir,
    max_record_bytes: usize,
}

impl RecordStore {
    pub fn new(dir: CacheDir) -> Self {
        Self {
            dir,
            max_record_bytes: MAX_RECORD_BYTES,
        }
    }

    /// Cap on the encoded size of a record, enforced on both save and load.
    pub fn with_max_record_bytes(mut self, limit: usize) -> Self {
        self.max_record_bytes = limit;
        self
    }

    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        Ok(Self::new(CacheDir::new(config)?))
    }

    pub fn cache_dir(&self) -> &CacheDir {
        &self.dir
    }

    pub fn record_path(&self, category: &CacheCategory) -> PathBuf {
        self.dir.record_path(category)
    }

    pub fn load<T: DeserializeOwned>(&self, category: &CacheCategory) -> Option<CacheRecord<T>> {
        let path = self.dir.record_path(category);
        let bytes = read_file_limited(&path, self.max_record_bytes)?;

        match decode::<T>(category, &bytes) {
            Decoded::Record(persisted) => Some(CacheRecord {
                category: persisted.category,
                payload: persisted.payload,
                written_at_millis: persisted.written_at_millis,
            }),
            Decoded::Collision => {
                tracing::debug!(
                    target: "pyref.cache",
                    category = %category,
                    path = %path.display(),
                    "cache slot holds a record for another package; treating as a miss"
                );
                None
            }
            Decoded::Corrupt(reason) => {
                tracing::debug!(
                    target: "pyref.cache",
                    category = %category,
                    path = %path.display(),
                    reason,
                    "discarding corrupt cache record"
                );
                remove_file_best_effort(&path, reason);
                None
            }
        }
    }

    pub fn lookup<T: DeserializeOwned>(
        &self,
        category: &CacheCategory,
        policy: &FreshnessPolicy,
        now_millis: u64,
    ) -> CacheLookup<T> {
        match self.load(category) {
            Some(record) if record.is_fresh(policy, now_millis) => CacheLookup::Fresh(record),
            Some(record) => CacheLookup::Stale(record),
            None => CacheLookup::Missing,
        }
    }

    /// Atomically replace the record for `category`, stamping it with `now_millis`.
    pub fn save<T: Serialize>(
        &self,
        category: &CacheCategory,
        payload: &T,
        now_millis: u64,
    ) -> Result<u64, CacheError> {
        let path = self.dir.record_path(category);
        let persisted = PersistedRecord {
            schema_version: RECORD_SCHEMA_VERSION,
            category,
            written_at_millis: now_millis,
            payload,
        };
        let bytes = serde_json::to_vec(&persisted)?;
        if bytes.len() > self.max_record_bytes {
            // It could never be read back; keep whatever is stored instead.
            return Err(CacheError::RecordTooLarge {
                path,
                limit: self.max_record_bytes,
            });
        }
        atomic_write(&path, &bytes)?;

        tracing::debug!(
            target: "pyref.cache",
            category = %category,
            bytes = bytes.len(),
            "saved cache record"
        );
        Ok(now_millis)
    }

    /// Delete the record for `category`. Returns `false` when nothing was stored.
    pub fn remove(&self, category: &CacheCategory) -> Result<bool, CacheError> {
        let path = self.dir.record_path(category);
        self.dir.ensure_under_root(&path)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Timestamp and size of a stored record. Corrupt records are reported as absent (and
    /// removed, exactly as [`RecordStore::load`] would).
    pub fn record_info(&self, category: &CacheCategory) -> Option<RecordInfo> {
        let record = self.load::<IgnoredAny>(category)?;
        let path = self.dir.record_path(category);
        let size_bytes = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        Some(RecordInfo {
            category: record.category,
            path,
            size_bytes,
            written_at_millis: record.written_at_millis,
        })
    }

    /// Number of files currently stored under the remote-details directory.
    pub fn remote_detail_count(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(self.dir.remote_details_dir()) else {
            return 0;
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| is_record_file(&entry.path()))
            .count()
    }

    /// Remove every record (including remote details and stray temp files). Returns the
    /// number of files deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0usize;
        for dir in [self.dir.root().to_path_buf(), self.dir.remote_details_dir()] {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            for entry in entries.filter_map(|entry| entry.ok()) {
                let path = entry.path();
                let is_file = entry.file_type().map(|ty| ty.is_file()).unwrap_or(false);
                if !is_file || !(is_record_file(&path) || is_temp_file(&path)) {
                    continue;
                }
                if remove_file_best_effort(&path, "clear") {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn decode<T: DeserializeOwned>(expected: &CacheCategory, bytes: &[u8]) -> Decoded<T> {
    let persisted: PersistedRecordOwned<T> = match serde_json::from_slice(bytes) {
        Ok(persisted) => persisted,
        Err(_) => return Decoded::Corrupt("decode_failed"),
    };

    if persisted.schema_version != RECORD_SCHEMA_VERSION {
        return Decoded::Corrupt("schema_mismatch");
    }

    if &persisted.category != expected {
        return match (&persisted.category, expected) {
            (CacheCategory::RemoteDetail(_), CacheCategory::RemoteDetail(_)) => {
                Decoded::Collision
            }
            _ => Decoded::Corrupt("category_mismatch"),
        };
    }

    Decoded::Record(persisted)
}

fn is_record_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(TMP_MARKER))
}
