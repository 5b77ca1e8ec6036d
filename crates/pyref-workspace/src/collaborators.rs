use pyref_cache::{Clock, SystemClock};
use pyref_config::PyrefConfig;
use pyref_index::{BuiltinsSource, ModuleInspector, PackageLister};
use pyref_python::{PipPackageLister, PythonBuiltins, PythonInterpreter, PythonModuleInspector};
use pyref_remote::{Transport, UreqTransport};
use std::sync::Arc;

/// Everything the workspace calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub lister: Arc<dyn PackageLister>,
    pub inspector: Arc<dyn ModuleInspector>,
    pub builtins: Arc<dyn BuiltinsSource>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// The real thing: the configured Python interpreter, `ureq`, and the system clock.
    pub fn from_config(config: &PyrefConfig) -> Self {
        let python = PythonInterpreter::from_config(&config.python);
        Self {
            lister: Arc::new(PipPackageLister::new(python.clone())),
            inspector: Arc::new(PythonModuleInspector::new(python.clone())),
            builtins: Arc::new(PythonBuiltins::new(python)),
            transport: Arc::new(UreqTransport::new(
                config.remote.index_timeout(),
                config.remote.detail_timeout(),
            )),
            clock: Arc::new(SystemClock),
        }
    }
}
