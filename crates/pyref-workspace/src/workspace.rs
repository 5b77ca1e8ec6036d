use crate::collaborators::Collaborators;
use crate::report::{CacheStatus, CategoryState, CategoryStatus, RefreshReport, SyncStats};
use pyref_cache::{
    CacheCategory, CacheError, CacheLookup, CacheRecord, Clock, FreshnessPolicy, RecordStore,
};
use pyref_config::{IndexConfig, PyrefConfig};
use pyref_index::{
    BuiltinsSnapshot, BuiltinsSource, IndexPolicy, InstalledIndexSnapshot, ModuleInspector,
    PackageLister, QuerySurface, RemoteIndexSnapshot, Synchronizer,
};
use pyref_remote::{IndexFetch, RemoteDetailRecord, RemoteEndpoints, RemoteIndexFetcher};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to open cache: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// Reuse fresh records; recompute only stale or missing categories.
    #[default]
    Startup,
    /// Ignore every TTL. Installed packages are all re-inspected, which also picks up in-place
    /// upgrades that keep the same name.
    Force,
}

/// Build the [`IndexPolicy`] described by the `[index]` config section.
pub fn index_policy(config: &IndexConfig) -> IndexPolicy {
    let mut policy = IndexPolicy::default();
    if let Some(excluded) = &config.excluded_packages {
        policy = policy.with_excluded_packages(excluded);
    }
    policy = policy.exclude_packages(&config.extra_excluded_packages);
    if let Some(noise) = &config.noise_modules {
        policy = policy.with_noise_modules(noise);
    }
    policy
}

pub struct Workspace {
    store: RecordStore,
    freshness: FreshnessPolicy,
    index_policy: IndexPolicy,
    lister: Arc<dyn PackageLister>,
    inspector: Arc<dyn ModuleInspector>,
    builtins_source: Arc<dyn BuiltinsSource>,
    clock: Arc<dyn Clock>,
    remote: RemoteIndexFetcher,
    builtins: Arc<BuiltinsSnapshot>,
    installed: Arc<InstalledIndexSnapshot>,
    remote_index: Arc<RemoteIndexSnapshot>,
    surface: QuerySurface,
}

impl Workspace {
    /// Open the cache and publish whatever it holds, regardless of age. Nothing is recomputed
    /// until [`Workspace::refresh`] is called.
    pub fn open(config: &PyrefConfig, collaborators: Collaborators) -> Result<Self, WorkspaceError> {
        let store = RecordStore::open(config.cache_config())?;
        let freshness = config.freshness_policy();
        let endpoints = RemoteEndpoints {
            enabled: config.remote.enabled,
            index_url: config.remote.index_url.clone(),
            detail_base_url: config.remote.detail_base_url.clone(),
        };
        let remote = RemoteIndexFetcher::new(
            collaborators.transport,
            store.clone(),
            freshness,
            Arc::clone(&collaborators.clock),
            endpoints,
        );

        let builtins = Arc::new(load_any::<BuiltinsSnapshot>(&store, &CacheCategory::Builtins));
        let installed = Arc::new(load_any::<InstalledIndexSnapshot>(
            &store,
            &CacheCategory::InstalledIndex,
        ));
        let remote_index = Arc::new(load_any::<RemoteIndexSnapshot>(
            &store,
            &CacheCategory::RemoteIndex,
        ));
        let surface = QuerySurface::new(
            Arc::clone(&builtins),
            Arc::clone(&installed),
            Arc::clone(&remote_index),
        );

        tracing::debug!(
            target: "pyref.workspace",
            root = %store.cache_dir().root().display(),
            builtins = builtins.len(),
            installed = installed.len(),
            remote = remote_index.len(),
            "workspace opened"
        );

        Ok(Self {
            store,
            freshness,
            index_policy: index_policy(&config.index),
            lister: collaborators.lister,
            inspector: collaborators.inspector,
            builtins_source: collaborators.builtins,
            clock: collaborators.clock,
            remote,
            builtins,
            installed,
            remote_index,
            surface,
        })
    }

    /// Bring every category up to date, one after the other. Snapshots are swapped in only
    /// after all three passes complete.
    pub fn refresh(&mut self, mode: RefreshMode) -> RefreshReport {
        let start = Instant::now();
        let (builtins, builtins_status) = self.refresh_builtins(mode);
        let (installed, installed_status, sync) = self.refresh_installed(mode);
        let (remote_index, remote_status) = self.refresh_remote(mode);

        self.builtins = builtins;
        self.installed = installed;
        self.remote_index = remote_index;
        self.rebuild_surface();

        let report = RefreshReport {
            builtins: builtins_status,
            installed: installed_status,
            remote: remote_status,
            sync,
        };
        tracing::info!(
            target: "pyref.workspace",
            ?mode,
            degraded = report.is_degraded(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refresh complete"
        );
        report
    }

    fn refresh_builtins(&self, mode: RefreshMode) -> (Arc<BuiltinsSnapshot>, CategoryStatus) {
        let category = CacheCategory::Builtins;
        let now = self.clock.now_millis();
        let lookup = self
            .store
            .lookup::<BuiltinsSnapshot>(&category, &self.freshness, now);
        if mode == RefreshMode::Startup {
            if let CacheLookup::Fresh(record) = lookup {
                return cached_fresh(record);
            }
        }

        match self.builtins_source.list_builtins() {
            Ok(names) => {
                let snapshot: BuiltinsSnapshot = names.into_iter().collect();
                let saved = self.persist(&category, &snapshot, now);
                (Arc::new(snapshot), CategoryStatus::recomputed(saved))
            }
            Err(err) => {
                tracing::warn!(
                    target: "pyref.workspace",
                    error = %err,
                    "failed to list built-ins"
                );
                self.fall_back(lookup.into_record(), &self.builtins, err)
            }
        }
    }

    fn refresh_installed(
        &self,
        mode: RefreshMode,
    ) -> (Arc<InstalledIndexSnapshot>, CategoryStatus, Option<SyncStats>) {
        let category = CacheCategory::InstalledIndex;
        let now = self.clock.now_millis();
        let lookup = self
            .store
            .lookup::<InstalledIndexSnapshot>(&category, &self.freshness, now);

        // Only a fresh record is trusted for carry-over; anything else is re-inspected.
        let (previous, previous_written_at) = match (&lookup, mode) {
            (CacheLookup::Fresh(record), RefreshMode::Startup) => {
                (record.payload.clone(), Some(record.written_at_millis))
            }
            _ => (InstalledIndexSnapshot::new(), None),
        };

        let synchronizer = Synchronizer::new(
            self.lister.as_ref(),
            self.inspector.as_ref(),
            &self.index_policy,
        );
        match synchronizer.refresh(&previous) {
            Ok(outcome) => {
                let stats = SyncStats {
                    inspected: outcome.inspected.len(),
                    carried_over: outcome.carried_over.len(),
                    dropped: outcome.dropped.len(),
                };
                let status = match previous_written_at {
                    Some(written_at) if !outcome.changed => {
                        CategoryStatus::new(CategoryState::Unchanged, Some(written_at))
                    }
                    _ => CategoryStatus::recomputed(self.persist(&category, &outcome.snapshot, now)),
                };
                (Arc::new(outcome.snapshot), status, Some(stats))
            }
            Err(err) => {
                tracing::warn!(
                    target: "pyref.workspace",
                    error = %err,
                    "installed package listing failed; keeping previous index"
                );
                let (snapshot, status) = self.fall_back(lookup.into_record(), &self.installed, err);
                (snapshot, status, None)
            }
        }
    }

    fn refresh_remote(&self, mode: RefreshMode) -> (Arc<RemoteIndexSnapshot>, CategoryStatus) {
        let category = CacheCategory::RemoteIndex;
        let now = self.clock.now_millis();
        let lookup = self
            .store
            .lookup::<RemoteIndexSnapshot>(&category, &self.freshness, now);
        if mode == RefreshMode::Startup {
            if let CacheLookup::Fresh(record) = lookup {
                return cached_fresh(record);
            }
        }

        let previous_written_at = lookup.into_record().map(|record| record.written_at_millis);
        let previous = (!self.remote_index.is_empty()).then_some(&self.remote_index);
        match self.remote.fetch_index(previous) {
            Ok(IndexFetch::Fetched { snapshot, saved }) => {
                (snapshot, CategoryStatus::recomputed(saved))
            }
            Ok(IndexFetch::Offline { snapshot, error }) => (
                snapshot,
                CategoryStatus::failed(CategoryState::Degraded, previous_written_at, error),
            ),
            Err(error) => (
                Arc::clone(&self.remote_index),
                CategoryStatus::failed(CategoryState::Unavailable, None, error),
            ),
        }
    }

    fn persist<T: serde::Serialize>(
        &self,
        category: &CacheCategory,
        payload: &T,
        now: u64,
    ) -> Result<u64, String> {
        self.store.save(category, payload, now).map_err(|err| {
            tracing::warn!(
                target: "pyref.workspace",
                category = %category,
                error = %err,
                "failed to persist record; keeping it in memory only"
            );
            format!("not saved to cache: {err}")
        })
    }

    /// After a failed recomputation: serve the stored record if there is one, else whatever
    /// is already in memory.
    fn fall_back<T: Default + PartialEq>(
        &self,
        stored: Option<CacheRecord<T>>,
        current: &Arc<T>,
        error: impl ToString,
    ) -> (Arc<T>, CategoryStatus) {
        match stored {
            Some(record) => (
                Arc::new(record.payload),
                CategoryStatus::failed(
                    CategoryState::Degraded,
                    Some(record.written_at_millis),
                    error,
                ),
            ),
            None if **current != T::default() => (
                Arc::clone(current),
                CategoryStatus::failed(CategoryState::Degraded, None, error),
            ),
            None => (
                Arc::clone(current),
                CategoryStatus::failed(CategoryState::Unavailable, None, error),
            ),
        }
    }

    fn rebuild_surface(&mut self) {
        self.surface = QuerySurface::new(
            Arc::clone(&self.builtins),
            Arc::clone(&self.installed),
            Arc::clone(&self.remote_index),
        );
    }

    /// Lookup and search over the published snapshots. Never touches disk or network.
    pub fn query(&self) -> &QuerySurface {
        &self.surface
    }

    pub fn builtins(&self) -> &Arc<BuiltinsSnapshot> {
        &self.builtins
    }

    pub fn installed(&self) -> &Arc<InstalledIndexSnapshot> {
        &self.installed
    }

    pub fn remote_index(&self) -> &Arc<RemoteIndexSnapshot> {
        &self.remote_index
    }

    pub fn index_policy(&self) -> &IndexPolicy {
        &self.index_policy
    }

    /// Metadata for one remote package, fetched on first use and cached.
    pub fn fetch_detail(&self, package: &str) -> Option<RemoteDetailRecord> {
        self.remote.fetch_detail(package)
    }

    /// Cached metadata regardless of age, for offline display.
    pub fn cached_detail(&self, package: &str) -> Option<CacheRecord<RemoteDetailRecord>> {
        self.remote.cached_detail(package)
    }

    pub fn cache_status(&self) -> CacheStatus {
        let records = [
            CacheCategory::Builtins,
            CacheCategory::InstalledIndex,
            CacheCategory::RemoteIndex,
        ]
        .iter()
        .filter_map(|category| self.store.record_info(category))
        .collect();
        CacheStatus {
            root: self.store.cache_dir().root().to_path_buf(),
            records,
            remote_details: self.store.remote_detail_count(),
        }
    }

    /// Delete every record and unpublish all snapshots. Returns the number of files removed.
    pub fn clear_cache(&mut self) -> Result<usize, CacheError> {
        let removed = self.store.clear()?;
        self.builtins = Arc::default();
        self.installed = Arc::default();
        self.remote_index = Arc::default();
        self.rebuild_surface();
        tracing::info!(target: "pyref.workspace", removed, "cache cleared");
        Ok(removed)
    }
}

fn load_any<T: DeserializeOwned + Default>(store: &RecordStore, category: &CacheCategory) -> T {
    store
        .load::<T>(category)
        .map(|record| record.payload)
        .unwrap_or_default()
}

fn cached_fresh<T>(record: CacheRecord<T>) -> (Arc<T>, CategoryStatus) {
    let status = CategoryStatus::new(CategoryState::CachedFresh, Some(record.written_at_millis));
    (Arc::new(record.payload), status)
}
