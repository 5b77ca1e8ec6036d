use crate::category::CategoryKind;
use crate::util::now_millis;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-category time-to-live table.
///
/// A record written at `written_at` is valid at `now` iff `now - written_at < ttl`. A record
/// whose age equals the TTL is already stale. Timestamps in the future (clock moved
/// backwards) count as age zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub builtins: Duration,
    pub installed_index: Duration,
    pub remote_index: Duration,
    pub remote_detail: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        // Built-ins only change with the interpreter; the remote catalog changes constantly.
        Self {
            builtins: DAY * 30,
            installed_index: DAY * 7,
            remote_index: DAY,
            remote_detail: DAY * 7,
        }
    }
}

impl FreshnessPolicy {
    pub fn ttl(&self, kind: CategoryKind) -> Duration {
        match kind {
            CategoryKind::Builtins => self.builtins,
            CategoryKind::InstalledIndex => self.installed_index,
            CategoryKind::RemoteIndex => self.remote_index,
            CategoryKind::RemoteDetail => self.remote_detail,
        }
    }

    pub fn with_ttl(mut self, kind: CategoryKind, ttl: Duration) -> Self {
        match kind {
            CategoryKind::Builtins => self.builtins = ttl,
            CategoryKind::InstalledIndex => self.installed_index = ttl,
            CategoryKind::RemoteIndex => self.remote_index = ttl,
            CategoryKind::RemoteDetail => self.remote_detail = ttl,
        }
        self
    }

    pub fn is_valid(&self, kind: CategoryKind, written_at_millis: u64, now_millis: u64) -> bool {
        let age = now_millis.saturating_sub(written_at_millis);
        u128::from(age) < self.ttl(kind).as_millis()
    }
}

/// Source of "now" for freshness decisions and record timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        now_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: u64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            });
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
