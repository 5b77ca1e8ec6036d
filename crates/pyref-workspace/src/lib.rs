//! The PyRef index as one explicit context object.
//!
//! [`Workspace`] owns the three published snapshots (built-ins, installed packages, remote
//! index), the persisted store behind them, and the collaborators used to recompute them.
//! Startup loads whatever is on disk, [`Workspace::refresh`] brings each category up to date,
//! and [`Workspace::query`] serves reads from memory only.

mod collaborators;
mod report;
mod workspace;

pub use collaborators::Collaborators;
pub use report::{CacheStatus, CategoryState, CategoryStatus, RefreshReport, SyncStats};
pub use workspace::{index_policy, RefreshMode, Workspace, WorkspaceError};
