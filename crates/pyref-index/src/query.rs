use crate::model::{
    BuiltinsSnapshot, InstalledIndexSnapshot, MemberKind, PackageEntry, RemoteIndexSnapshot,
};
use crate::symbol::{QualifiedSymbol, SymbolCategory};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("search query is empty")]
    EmptyQuery,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
}

/// What a [`QualifiedSymbol`] resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolEntry<'a> {
    Builtin {
        name: &'a str,
    },
    Package(&'a PackageEntry),
    Member {
        package: &'a PackageEntry,
        name: &'a str,
        kind: MemberKind,
    },
    RemotePackage {
        name: &'a str,
    },
}

#[derive(Clone, Debug)]
struct SearchKey {
    symbol: QualifiedSymbol,
    folded: String,
}

/// Read-only lookup and substring search over the three published snapshots.
///
/// Holds its own `Arc`s, so a surface stays consistent while the owner swaps in newer
/// snapshots.
#[derive(Clone, Debug)]
pub struct QuerySurface {
    builtins: Arc<BuiltinsSnapshot>,
    installed: Arc<InstalledIndexSnapshot>,
    remote: Arc<RemoteIndexSnapshot>,
    keys: Vec<SearchKey>,
}

impl QuerySurface {
    pub fn new(
        builtins: Arc<BuiltinsSnapshot>,
        installed: Arc<InstalledIndexSnapshot>,
        remote: Arc<RemoteIndexSnapshot>,
    ) -> Self {
        let mut keys = Vec::with_capacity(builtins.len() + installed.len() + remote.len());
        let mut push = |symbol: QualifiedSymbol| {
            let folded = symbol.name.to_lowercase();
            keys.push(SearchKey { symbol, folded });
        };

        for name in builtins.iter() {
            push(QualifiedSymbol::builtin(name));
        }
        for symbol in installed_symbols(&installed) {
            push(symbol);
        }
        for name in remote.iter() {
            push(QualifiedSymbol::remote(name));
        }

        Self {
            builtins,
            installed,
            remote,
            keys,
        }
    }

    pub fn builtins(&self) -> &BuiltinsSnapshot {
        &self.builtins
    }

    pub fn installed(&self) -> &InstalledIndexSnapshot {
        &self.installed
    }

    pub fn remote(&self) -> &RemoteIndexSnapshot {
        &self.remote
    }

    /// Number of searchable symbols.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn lookup<'a>(&'a self, symbol: &'a QualifiedSymbol) -> Option<SymbolEntry<'a>> {
        let name = symbol.name.as_str();
        match symbol.category {
            SymbolCategory::Builtin => self
                .builtins
                .contains(name)
                .then_some(SymbolEntry::Builtin { name }),
            SymbolCategory::Remote => self
                .remote
                .contains(name)
                .then_some(SymbolEntry::RemotePackage { name }),
            SymbolCategory::Installed => self.lookup_installed(name),
        }
    }

    fn lookup_installed<'a>(&'a self, name: &'a str) -> Option<SymbolEntry<'a>> {
        if let Some(package) = self.installed.get(name) {
            return Some(SymbolEntry::Package(package));
        }

        // Distribution names may contain dots themselves; prefer the longest package prefix.
        name.rmatch_indices('.').find_map(|(idx, _)| {
            let package = self.installed.get(&name[..idx])?;
            let member = &name[idx + 1..];
            let kind = package.member_kind(member)?;
            Some(SymbolEntry::Member {
                package,
                name: member,
                kind,
            })
        })
    }

    /// Case-insensitive substring search over every qualified name.
    pub fn search(&self, query: &str) -> Result<Vec<QualifiedSymbol>, QueryError> {
        self.search_with(query, SearchOptions::default())
    }

    /// Substring search. Results are sorted by display key and contain no duplicates.
    pub fn search_with(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<QualifiedSymbol>, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let hits: BTreeSet<QualifiedSymbol> = if options.case_sensitive {
            self.keys
                .iter()
                .filter(|key| key.symbol.name.contains(query))
                .map(|key| key.symbol.clone())
                .collect()
        } else {
            let folded = query.to_lowercase();
            self.keys
                .iter()
                .filter(|key| key.folded.contains(&folded))
                .map(|key| key.symbol.clone())
                .collect()
        };

        Ok(hits.into_iter().collect())
    }

    /// Every symbol in one category, sorted.
    pub fn list(&self, category: SymbolCategory) -> Vec<QualifiedSymbol> {
        let symbols: BTreeSet<QualifiedSymbol> = match category {
            SymbolCategory::Builtin => self.builtins.iter().map(QualifiedSymbol::builtin).collect(),
            SymbolCategory::Installed => installed_symbols(&self.installed).collect(),
            SymbolCategory::Remote => self.remote.iter().map(QualifiedSymbol::remote).collect(),
        };
        symbols.into_iter().collect()
    }
}

fn installed_symbols(
    installed: &InstalledIndexSnapshot,
) -> impl Iterator<Item = QualifiedSymbol> + '_ {
    installed.iter().flat_map(|package| {
        std::iter::once(QualifiedSymbol::installed(package.name.as_str())).chain(
            package.members().map(move |(member, _)| {
                QualifiedSymbol::installed(format!("{}.{member}", package.name))
            }),
        )
    })
}
