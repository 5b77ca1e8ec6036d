//! Installed-package index synchronization and the unified query surface.
//!
//! - [`Synchronizer`] keeps an [`InstalledIndexSnapshot`] in step with the package manager,
//!   inspecting only packages that appeared since the previous pass.
//! - [`QuerySurface`] answers lookups and substring searches over the built-in, installed and
//!   remote snapshots without touching disk or network.

mod collab;
mod model;
mod policy;
mod query;
mod symbol;
mod sync;

pub use collab::{
    BuiltinsSource, ImportFailure, InstalledPackage, ListingError, ModuleInspector,
    ModuleReflection, PackageLister, ReflectedMember,
};
pub use model::{
    BuiltinsSnapshot, InstalledIndexSnapshot, MemberKind, PackageEntry, RemoteIndexSnapshot,
    NO_MODULE_DOC,
};
pub use policy::{IndexPolicy, DEFAULT_EXCLUDED_PACKAGES, DEFAULT_NOISE_MODULES};
pub use query::{QueryError, QuerySurface, SearchOptions, SymbolEntry};
pub use symbol::{ParseSymbolError, QualifiedSymbol, SymbolCategory};
pub use sync::{SyncError, SyncOutcome, Synchronizer};
