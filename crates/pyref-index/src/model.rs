use crate::collab::{ImportFailure, ModuleReflection};
use crate::policy::IndexPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder doc for importable modules without a docstring.
pub const NO_MODULE_DOC: &str = "No module documentation available.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Function,
    Class,
    Module,
    /// Constants, instances, descriptors, ... Reported by reflection but never indexed.
    Other,
}

impl MemberKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Module => "module",
            Self::Other => "other",
        }
    }
}

/// Indexed members of one top-level installed package.
///
/// An unimportable package keeps its slot in the index with empty member sets and an
/// explanatory `doc`, so it is still listed and is not re-inspected on every sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub functions: BTreeSet<String>,
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub submodules: BTreeSet<String>,
    pub doc: String,
    pub importable: bool,
}

impl PackageEntry {
    /// Build an entry from a reflection result, applying the member filters of `policy`.
    pub fn from_reflection(
        name: impl Into<String>,
        reflection: ModuleReflection,
        policy: &IndexPolicy,
    ) -> Self {
        let mut entry = Self {
            name: name.into(),
            functions: BTreeSet::new(),
            classes: BTreeSet::new(),
            submodules: BTreeSet::new(),
            doc: reflection
                .doc
                .filter(|doc| !doc.trim().is_empty())
                .unwrap_or_else(|| NO_MODULE_DOC.to_owned()),
            importable: true,
        };

        for member in reflection.members {
            if !policy.keeps_member(&entry.name, &member) {
                continue;
            }
            let set = match member.kind {
                MemberKind::Function => &mut entry.functions,
                MemberKind::Class => &mut entry.classes,
                MemberKind::Module => &mut entry.submodules,
                MemberKind::Other => continue,
            };
            set.insert(member.name);
        }

        entry
    }

    pub fn unimportable(name: impl Into<String>, failure: &ImportFailure) -> Self {
        let name = name.into();
        let doc = format!(
            "Could not import module '{name}'. It might be a namespace package or require a \
             specific import syntax. ({})",
            failure.reason
        );
        Self {
            name,
            functions: BTreeSet::new(),
            classes: BTreeSet::new(),
            submodules: BTreeSet::new(),
            doc,
            importable: false,
        }
    }

    pub fn member_kind(&self, member: &str) -> Option<MemberKind> {
        if self.functions.contains(member) {
            Some(MemberKind::Function)
        } else if self.classes.contains(member) {
            Some(MemberKind::Class)
        } else if self.submodules.contains(member) {
            Some(MemberKind::Module)
        } else {
            None
        }
    }

    /// All indexed members, functions first, then classes, then submodules.
    pub fn members(&self) -> impl Iterator<Item = (&str, MemberKind)> + '_ {
        let functions = self
            .functions
            .iter()
            .map(|name| (name.as_str(), MemberKind::Function));
        let classes = self
            .classes
            .iter()
            .map(|name| (name.as_str(), MemberKind::Class));
        let submodules = self
            .submodules
            .iter()
            .map(|name| (name.as_str(), MemberKind::Module));
        functions.chain(classes).chain(submodules)
    }

    pub fn member_count(&self) -> usize {
        self.functions.len() + self.classes.len() + self.submodules.len()
    }
}

/// Installed package name to its indexed entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledIndexSnapshot {
    packages: BTreeMap<String, PackageEntry>,
}

impl InstalledIndexSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn insert(&mut self, entry: PackageEntry) -> Option<PackageEntry> {
        self.packages.insert(entry.name.clone(), entry)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.packages.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageEntry> + '_ {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl FromIterator<PackageEntry> for InstalledIndexSnapshot {
    fn from_iter<I: IntoIterator<Item = PackageEntry>>(iter: I) -> Self {
        Self {
            packages: iter
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }
}

/// A sorted set of names. Shared shape of the built-ins list and the remote package list.
macro_rules! name_set_snapshot {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name {
            names: BTreeSet<String>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn contains(&self, name: &str) -> bool {
                self.names.contains(name)
            }

            pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
                self.names.iter().map(String::as_str)
            }

            pub fn len(&self) -> usize {
                self.names.len()
            }

            pub fn is_empty(&self) -> bool {
                self.names.is_empty()
            }
        }

        impl<S: Into<String>> FromIterator<S> for $name {
            fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
                Self {
                    names: iter
                        .into_iter()
                        .map(Into::into)
                        .filter(|name: &String| !name.is_empty())
                        .collect(),
                }
            }
        }
    };
}

name_set_snapshot!(
    /// Names exposed by the interpreter's `builtins` module.
    BuiltinsSnapshot
);

name_set_snapshot!(
    /// Every project name listed by the remote index.
    RemoteIndexSnapshot
);
