use crate::collab::{ListingError, ModuleInspector, PackageLister};
use crate::model::{InstalledIndexSnapshot, PackageEntry};
use crate::policy::IndexPolicy;
use std::collections::BTreeSet;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("installed package listing unavailable: {0}")]
    PackageListingUnavailable(#[source] ListingError),
}

/// Result of one synchronization pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub snapshot: InstalledIndexSnapshot,
    /// Newly installed packages that were inspected in this pass.
    pub inspected: Vec<String>,
    /// Packages present before and after, reused without inspection.
    pub carried_over: Vec<String>,
    /// Packages that disappeared since the previous snapshot (or became excluded).
    pub dropped: Vec<String>,
    /// Whether `snapshot` differs from the previous one.
    pub changed: bool,
}

/// Incremental maintenance of the installed-package index.
///
/// Only packages that appeared since the previous snapshot are inspected; packages present in
/// both are carried over untouched and vanished ones are dropped. The cost of a pass is
/// proportional to the symmetric difference, not to the number of installed packages.
pub struct Synchronizer<'a> {
    lister: &'a dyn PackageLister,
    inspector: &'a dyn ModuleInspector,
    policy: &'a IndexPolicy,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        lister: &'a dyn PackageLister,
        inspector: &'a dyn ModuleInspector,
        policy: &'a IndexPolicy,
    ) -> Self {
        Self {
            lister,
            inspector,
            policy,
        }
    }

    /// List installed packages and sync against `previous`.
    ///
    /// A listing failure aborts the pass; the caller keeps `previous`.
    pub fn refresh(&self, previous: &InstalledIndexSnapshot) -> Result<SyncOutcome, SyncError> {
        let installed = self
            .lister
            .list_installed()
            .map_err(SyncError::PackageListingUnavailable)?;
        Ok(self.sync(installed.into_iter().map(|package| package.name), previous))
    }

    /// Diff `current_names` against `previous` and inspect only the additions.
    pub fn sync<I, S>(&self, current_names: I, previous: &InstalledIndexSnapshot) -> SyncOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = Instant::now();
        let current: BTreeSet<String> = current_names
            .into_iter()
            .map(Into::into)
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty() && !self.policy.is_excluded(name))
            .collect();

        let mut snapshot = InstalledIndexSnapshot::new();
        let mut inspected = Vec::new();
        let mut carried_over = Vec::new();

        for name in &current {
            if let Some(entry) = previous.get(name) {
                snapshot.insert(entry.clone());
                carried_over.push(name.clone());
                continue;
            }

            snapshot.insert(self.inspect(name));
            inspected.push(name.clone());
        }

        let dropped: Vec<String> = previous
            .names()
            .filter(|name| !current.contains(*name))
            .map(str::to_owned)
            .collect();

        let changed = &snapshot != previous;
        tracing::info!(
            target: "pyref.index",
            packages = snapshot.len(),
            inspected = inspected.len(),
            carried_over = carried_over.len(),
            dropped = dropped.len(),
            changed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "installed index synchronized"
        );

        SyncOutcome {
            snapshot,
            inspected,
            carried_over,
            dropped,
            changed,
        }
    }

    fn inspect(&self, name: &str) -> PackageEntry {
        match self.inspector.inspect(name) {
            Ok(reflection) => {
                let entry = PackageEntry::from_reflection(name, reflection, self.policy);
                tracing::debug!(
                    target: "pyref.index",
                    package = name,
                    members = entry.member_count(),
                    "inspected package"
                );
                entry
            }
            Err(failure) => {
                tracing::debug!(
                    target: "pyref.index",
                    package = name,
                    error = %failure,
                    "package is not importable; indexing placeholder"
                );
                PackageEntry::unimportable(name, &failure)
            }
        }
    }
}
