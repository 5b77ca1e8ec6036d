use crate::detail::RemoteDetailRecord;
use crate::error::RemoteError;
use crate::parse::{parse_project_detail, parse_simple_index, DETAIL_ACCEPT, SIMPLE_INDEX_ACCEPT};
use crate::transport::{redact_url, HttpResponse, RequestKind, Transport};
use pyref_cache::{CacheCategory, CacheLookup, CacheRecord, Clock, FreshnessPolicy, RecordStore};
use pyref_index::RemoteIndexSnapshot;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Where the remote index lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEndpoints {
    pub enabled: bool,
    pub index_url: Url,
    pub detail_base_url: Url,
}

impl RemoteEndpoints {
    pub fn new(index_url: Url, detail_base_url: Url) -> Self {
        Self {
            enabled: true,
            index_url,
            detail_base_url,
        }
    }

    /// `<detail_base>/<name>/json`, with `name` percent-encoded as a single path segment.
    pub fn detail_url(&self, name: &str) -> Option<Url> {
        let mut url = self.detail_base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(name)
            .push("json");
        Some(url)
    }
}

/// Outcome of a successful (possibly degraded) index fetch.
#[derive(Clone, Debug)]
pub enum IndexFetch {
    /// A new listing was downloaded. `saved` holds its `written_at_millis`, or why it could
    /// not be persisted.
    Fetched {
        snapshot: Arc<RemoteIndexSnapshot>,
        saved: Result<u64, String>,
    },
    /// The download failed; the previous snapshot is still being served.
    Offline {
        snapshot: Arc<RemoteIndexSnapshot>,
        error: RemoteError,
    },
}

impl IndexFetch {
    pub fn snapshot(&self) -> &Arc<RemoteIndexSnapshot> {
        match self {
            Self::Fetched { snapshot, .. } | Self::Offline { snapshot, .. } => snapshot,
        }
    }

    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            Self::Fetched { .. } => None,
            Self::Offline { error, .. } => Some(error),
        }
    }
}

/// Downloads the remote project list and per-project metadata, caching both.
pub struct RemoteIndexFetcher {
    transport: Arc<dyn Transport>,
    store: RecordStore,
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
    endpoints: RemoteEndpoints,
}

impl RemoteIndexFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: RecordStore,
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
        endpoints: RemoteEndpoints,
    ) -> Self {
        Self {
            transport,
            store,
            policy,
            clock,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &RemoteEndpoints {
        &self.endpoints
    }

    /// Download the full project list and persist it.
    ///
    /// On failure, `previous` (if any) is handed back as [`IndexFetch::Offline`]; without a
    /// previous snapshot the error is returned.
    pub fn fetch_index(
        &self,
        previous: Option<&Arc<RemoteIndexSnapshot>>,
    ) -> Result<IndexFetch, RemoteError> {
        let start = Instant::now();
        match self.download_index() {
            Ok(snapshot) => {
                let now = self.clock.now_millis();
                let saved = self
                    .store
                    .save(&CacheCategory::RemoteIndex, &snapshot, now)
                    .map_err(|err| {
                        tracing::warn!(
                            target: "pyref.remote",
                            error = %err,
                            "failed to persist remote index; keeping it in memory only"
                        );
                        format!("not saved to cache: {err}")
                    });
                tracing::info!(
                    target: "pyref.remote",
                    projects = snapshot.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "remote index fetched"
                );
                Ok(IndexFetch::Fetched {
                    snapshot: Arc::new(snapshot),
                    saved,
                })
            }
            Err(error) => match previous {
                Some(previous) => {
                    tracing::warn!(
                        target: "pyref.remote",
                        error = %error,
                        cached_projects = previous.len(),
                        "remote index fetch failed; serving cached listing"
                    );
                    Ok(IndexFetch::Offline {
                        snapshot: Arc::clone(previous),
                        error,
                    })
                }
                None => Err(error),
            },
        }
    }

    fn download_index(&self) -> Result<RemoteIndexSnapshot, RemoteError> {
        if !self.endpoints.enabled {
            return Err(RemoteError::Disabled);
        }

        let url = &self.endpoints.index_url;
        let response = self
            .transport
            .get(url, SIMPLE_INDEX_ACCEPT, RequestKind::Index)?;
        ensure_success(url, &response)?;

        let snapshot = parse_simple_index(&response.body, response.content_type.as_deref())
            .map_err(|message| invalid_response(url, message))?;
        if snapshot.is_empty() {
            // Never replace a good cache with an empty listing from a broken mirror.
            return Err(invalid_response(url, "listing contains no projects".into()));
        }
        Ok(snapshot)
    }

    /// Metadata for `name`: from cache while fresh, otherwise fetched once and cached.
    ///
    /// Any failure yields `None` and leaves the cache untouched, so the next call retries.
    pub fn fetch_detail(&self, name: &str) -> Option<RemoteDetailRecord> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let category = CacheCategory::remote_detail(name);
        let now = self.clock.now_millis();
        if let CacheLookup::Fresh(record) =
            self.store
                .lookup::<RemoteDetailRecord>(&category, &self.policy, now)
        {
            tracing::debug!(target: "pyref.remote", package = name, "remote detail cache hit");
            return Some(record.payload);
        }

        let detail = match self.download_detail(name) {
            Ok(detail) => detail,
            Err(err) => {
                tracing::warn!(
                    target: "pyref.remote",
                    package = name,
                    error = %err,
                    "failed to fetch remote detail"
                );
                return None;
            }
        };

        if let Err(err) = self.store.save(&category, &detail, now) {
            tracing::warn!(
                target: "pyref.remote",
                package = name,
                error = %err,
                "failed to persist remote detail"
            );
        }
        Some(detail)
    }

    fn download_detail(&self, name: &str) -> Result<RemoteDetailRecord, RemoteError> {
        if !self.endpoints.enabled {
            return Err(RemoteError::Disabled);
        }

        let url = self.endpoints.detail_url(name).ok_or_else(|| RemoteError::InvalidResponse {
            url: redact_url(&self.endpoints.detail_base_url),
            message: "detail base URL cannot have path segments".into(),
        })?;
        let response = self.transport.get(&url, DETAIL_ACCEPT, RequestKind::Detail)?;
        ensure_success(&url, &response)?;

        parse_project_detail(name, &response.body).map_err(|message| invalid_response(&url, message))
    }

    /// Any cached detail for `name`, regardless of age.
    pub fn cached_detail(&self, name: &str) -> Option<CacheRecord<RemoteDetailRecord>> {
        self.store
            .load::<RemoteDetailRecord>(&CacheCategory::remote_detail(name.trim()))
    }
}

fn ensure_success(url: &Url, response: &HttpResponse) -> Result<(), RemoteError> {
    if (200..300).contains(&response.status) {
        Ok(())
    } else {
        Err(invalid_response(
            url,
            format!("unexpected status {}", response.status),
        ))
    }
}

fn invalid_response(url: &Url, message: String) -> RemoteError {
    RemoteError::InvalidResponse {
        url: redact_url(url),
        message,
    }
}
