use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which index a symbol comes from.
///
/// Variant order matches the lexicographic order of [`SymbolCategory::as_str`], so the derived
/// `Ord` on [`QualifiedSymbol`] sorts exactly like its display key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolCategory {
    Builtin,
    Installed,
    Remote,
}

impl SymbolCategory {
    pub const ALL: [SymbolCategory; 3] = [Self::Builtin, Self::Installed, Self::Remote];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Installed => "installed",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for SymbolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseSymbolError {
    #[error("expected `<category>:<name>`, got `{0}`")]
    MissingSeparator(String),
    #[error("unknown symbol category `{0}` (expected builtin, installed or remote)")]
    UnknownCategory(String),
    #[error("symbol name is empty")]
    EmptyName,
}

impl FromStr for SymbolCategory {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "builtin" | "builtins" => Ok(Self::Builtin),
            "installed" => Ok(Self::Installed),
            "remote" => Ok(Self::Remote),
            _ => Err(ParseSymbolError::UnknownCategory(s.to_owned())),
        }
    }
}

/// The addressable unit across all indexes: `category:qualifiedName`.
///
/// Installed members are qualified as `package.member`. The same bare name may exist in more
/// than one category.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedSymbol {
    pub category: SymbolCategory,
    pub name: String,
}

impl QualifiedSymbol {
    pub fn new(category: SymbolCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(SymbolCategory::Builtin, name)
    }

    pub fn installed(name: impl Into<String>) -> Self {
        Self::new(SymbolCategory::Installed, name)
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self::new(SymbolCategory::Remote, name)
    }

    pub fn display_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QualifiedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

impl FromStr for QualifiedSymbol {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, name) = s
            .split_once(':')
            .ok_or_else(|| ParseSymbolError::MissingSeparator(s.to_owned()))?;
        let category = category.parse()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseSymbolError::EmptyName);
        }
        Ok(Self::new(category, name))
    }
}
