use crate::collab::ReflectedMember;
use std::collections::BTreeSet;

/// Build and environment tooling that is installed everywhere and rarely looked up.
pub const DEFAULT_EXCLUDED_PACKAGES: &[&str] = &[
    "pip",
    "setuptools",
    "wheel",
    "distlib",
    "filelock",
    "platformdirs",
    "virtualenv",
    "colorama",
    "tqdm",
    "certifi",
    "charset-normalizer",
    "idna",
    "requests",
    "urllib3",
];

/// Standard-library and tooling modules whose objects are commonly re-exported by third-party
/// packages. Members declared in them are not indexed under the re-exporting package.
pub const DEFAULT_NOISE_MODULES: &[&str] = &[
    "tkinter", "sys", "os", "builtins", "json", "requests", "subprocess", "inspect", "site",
    "time", "html", "collections", "io", "abc", "typing", "enum", "types", "weakref",
    "functools", "operator", "math", "itertools", "re", "copy", "decimal", "datetime",
    "hashlib", "random", "socket", "threading", "queue", "logging", "warnings", "xml", "http",
    "ssl", "urllib", "uuid", "zipfile", "tarfile", "shutil", "tempfile", "pathlib", "glob",
    "fnmatch", "platform", "getpass", "mimetypes", "locale", "codecs", "contextlib", "asyncio",
    "selectors", "collections.abc", "struct", "array", "binascii", "zlib", "gzip", "bz2",
    "lzma", "pickle", "sqlite3", "csv", "xml.etree", "json.tool", "venv", "dis", "pprint",
    "traceback", "code", "cmd", "pdb", "profile", "pstats", "test", "unittest", "doctest",
    "test.support", "lib2to3", "distutils", "setuptools", "packaging", "pip", "wheel",
];

/// Which installed packages are indexed and which of their members are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexPolicy {
    /// Lowercased distribution names.
    excluded_packages: BTreeSet<String>,
    noise_modules: BTreeSet<String>,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            excluded_packages: DEFAULT_EXCLUDED_PACKAGES
                .iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            noise_modules: DEFAULT_NOISE_MODULES
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }
}

impl IndexPolicy {
    /// A policy that indexes every package and keeps every public member.
    pub fn permissive() -> Self {
        Self {
            excluded_packages: BTreeSet::new(),
            noise_modules: BTreeSet::new(),
        }
    }

    /// Replace the exclusion list.
    pub fn with_excluded_packages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_packages = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    /// Add to the exclusion list.
    pub fn exclude_packages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_packages.extend(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .filter(|name| !name.is_empty()),
        );
        self
    }

    /// Replace the noise-module list.
    pub fn with_noise_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.noise_modules = modules
            .into_iter()
            .map(|module| module.as_ref().trim().to_owned())
            .filter(|module| !module.is_empty())
            .collect();
        self
    }

    pub fn is_excluded(&self, package: &str) -> bool {
        self.excluded_packages.contains(&package.to_lowercase())
    }

    /// Whether `module` (or its top-level package) is on the noise list.
    pub fn is_noise_module(&self, module: &str) -> bool {
        if self.noise_modules.contains(module) {
            return true;
        }
        let top_level = module.split('.').next().unwrap_or(module);
        self.noise_modules.contains(top_level)
    }

    /// Public members of `package`, minus objects re-exported from a noise module. Members
    /// declared in the package itself (or one of its submodules) are always kept, even when
    /// the package's own name is on the noise list.
    pub fn keeps_member(&self, package: &str, member: &ReflectedMember) -> bool {
        if member.name.is_empty() || member.name.starts_with('_') {
            return false;
        }
        match member.module.as_deref() {
            Some(module) if !module.is_empty() => {
                declared_in_package(package, module) || !self.is_noise_module(module)
            }
            _ => true,
        }
    }

    pub fn excluded_packages(&self) -> impl Iterator<Item = &str> + '_ {
        self.excluded_packages.iter().map(String::as_str)
    }

    pub fn noise_modules(&self) -> impl Iterator<Item = &str> + '_ {
        self.noise_modules.iter().map(String::as_str)
    }
}

/// `module` is `package` or one of its submodules. Distribution names are compared in their
/// import form (`-` as `_`, case-insensitive).
fn declared_in_package(package: &str, module: &str) -> bool {
    let import_name = package.trim().replace('-', "_");
    if import_name.is_empty() {
        return false;
    }
    let top_level = module.split('.').next().unwrap_or(module);
    top_level.eq_ignore_ascii_case(&import_name)
}
