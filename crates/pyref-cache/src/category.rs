use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four cache partitions. Each has its own record file(s) and TTL.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "package", rename_all = "snake_case")]
pub enum CacheCategory {
    /// Names exposed by the interpreter's `builtins` module.
    Builtins,
    /// Per-package member index of locally installed packages.
    InstalledIndex,
    /// Full list of package names known to the remote index.
    RemoteIndex,
    /// Lazily fetched metadata for a single remote package.
    RemoteDetail(String),
}

/// Payload-independent discriminant of a [`CacheCategory`], used to key the TTL table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Builtins,
    InstalledIndex,
    RemoteIndex,
    RemoteDetail,
}

impl CacheCategory {
    pub fn remote_detail(package: impl Into<String>) -> Self {
        Self::RemoteDetail(package.into())
    }

    pub fn kind(&self) -> CategoryKind {
        match self {
            Self::Builtins => CategoryKind::Builtins,
            Self::InstalledIndex => CategoryKind::InstalledIndex,
            Self::RemoteIndex => CategoryKind::RemoteIndex,
            Self::RemoteDetail(_) => CategoryKind::RemoteDetail,
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteDetail(package) => write!(f, "remote_detail({package})"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 4] = [
        CategoryKind::Builtins,
        CategoryKind::InstalledIndex,
        CategoryKind::RemoteIndex,
        CategoryKind::RemoteDetail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtins => "builtins",
            Self::InstalledIndex => "installed_index",
            Self::RemoteIndex => "remote_index",
            Self::RemoteDetail => "remote_detail",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
