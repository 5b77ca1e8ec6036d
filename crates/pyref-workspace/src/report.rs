use pyref_cache::RecordInfo;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    /// A fresh record was on disk; nothing was recomputed.
    CachedFresh,
    /// Recomputed. `error` is set when writing it back failed and only memory holds it.
    Recomputed,
    /// Recomputed (or re-diffed) with no change; the fresh record on disk was kept.
    Unchanged,
    /// Recomputation failed; an older snapshot is being served.
    Degraded,
    /// Recomputation failed and nothing was cached.
    Unavailable,
}

/// Freshness indicator for one category after a refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryStatus {
    pub state: CategoryState,
    /// When the data being served was produced, if known.
    pub written_at_millis: Option<u64>,
    pub error: Option<String>,
}

impl CategoryStatus {
    pub(crate) fn new(state: CategoryState, written_at_millis: Option<u64>) -> Self {
        Self {
            state,
            written_at_millis,
            error: None,
        }
    }

    /// Freshly computed data; `saved` is the write-back outcome.
    pub(crate) fn recomputed(saved: Result<u64, String>) -> Self {
        match saved {
            Ok(written_at) => Self::new(CategoryState::Recomputed, Some(written_at)),
            Err(error) => Self::failed(CategoryState::Recomputed, None, error),
        }
    }

    pub(crate) fn failed(
        state: CategoryState,
        written_at_millis: Option<u64>,
        error: impl ToString,
    ) -> Self {
        Self {
            state,
            written_at_millis,
            error: Some(error.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self.state,
            CategoryState::Degraded | CategoryState::Unavailable
        )
    }
}

/// Counts from the installed-package diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub inspected: usize,
    pub carried_over: usize,
    pub dropped: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub builtins: CategoryStatus,
    pub installed: CategoryStatus,
    pub remote: CategoryStatus,
    /// Present when the installed-package listing succeeded.
    pub sync: Option<SyncStats>,
}

impl RefreshReport {
    pub fn is_degraded(&self) -> bool {
        self.builtins.is_degraded() || self.installed.is_degraded() || self.remote.is_degraded()
    }
}

/// On-disk view for `cache status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub root: PathBuf,
    pub records: Vec<RecordInfo>,
    pub remote_details: usize,
}
