//! Interfaces to the package manager and the interpreter's reflection facilities.
//!
//! The synchronizer only sees these traits. Production implementations shell out to Python;
//! tests plug in in-memory fakes.

use crate::model::MemberKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line of the installed-package listing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to query the package manager: {0}")]
    Unavailable(String),
    #[error("unexpected package manager output: {0}")]
    Malformed(String),
}

pub trait PackageLister: Send + Sync {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>, ListingError>;
}

pub trait BuiltinsSource: Send + Sync {
    fn list_builtins(&self) -> Result<Vec<String>, ListingError>;
}

/// A public attribute of an imported module as reported by reflection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedMember {
    pub name: String,
    pub kind: MemberKind,
    /// Module the object was defined in (`obj.__module__`), when it has one.
    #[serde(default)]
    pub module: Option<String>,
}

impl ReflectedMember {
    pub fn new(name: impl Into<String>, kind: MemberKind, module: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            module: module.map(str::to_owned),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReflection {
    pub doc: Option<String>,
    pub members: Vec<ReflectedMember>,
}

/// The package could not be imported or inspected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("could not import `{module}`: {reason}")]
pub struct ImportFailure {
    pub module: String,
    pub reason: String,
}

impl ImportFailure {
    pub fn new(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

pub trait ModuleInspector: Send + Sync {
    /// Import the top-level module for the installed distribution `name` and list its members.
    fn inspect(&self, name: &str) -> Result<ModuleReflection, ImportFailure>;
}
