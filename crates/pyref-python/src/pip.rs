use crate::interpreter::PythonInterpreter;
use pyref_index::{InstalledPackage, ListingError, PackageLister};

/// Lists installed distributions with `python -m pip freeze`.
#[derive(Clone, Debug, Default)]
pub struct PipPackageLister {
    interpreter: PythonInterpreter,
}

impl PipPackageLister {
    pub fn new(interpreter: PythonInterpreter) -> Self {
        Self { interpreter }
    }
}

impl PackageLister for PipPackageLister {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>, ListingError> {
        let invocation = self.interpreter.invocation().args(["-m", "pip", "freeze"]);
        let completed = self
            .interpreter
            .run(&invocation, self.interpreter.listing_timeout())
            .map_err(|err| ListingError::Unavailable(err.to_string()))?;

        if completed.output.truncated {
            return Err(ListingError::Malformed("pip freeze output was truncated".into()));
        }

        let packages = parse_pip_freeze(&completed.output.stdout);
        tracing::debug!(
            target: "pyref.python",
            packages = packages.len(),
            "listed installed packages"
        );
        Ok(packages)
    }
}

/// Parse `pip freeze` output. Only pinned `name==version` lines are kept; editable installs,
/// direct URL references, and comments are skipped.
pub fn parse_pip_freeze(stdout: &str) -> Vec<InstalledPackage> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| {
            let (name, version) = line.split_once("==")?;
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return None;
            }
            // Environment markers are not emitted by freeze, but requirement files are
            // sometimes piped through the same code path.
            let version = version.split(';').next().unwrap_or_default().trim();
            Some(InstalledPackage::new(name, version))
        })
        .collect()
}
