use pyref_cache::{ManualClock, RECORD_SCHEMA_VERSION};
use pyref_config::PyrefConfig;
use pyref_index::{
    BuiltinsSource, ImportFailure, InstalledPackage, ListingError, MemberKind, ModuleInspector,
    ModuleReflection, PackageLister, ReflectedMember,
};
use pyref_remote::{HttpResponse, RequestKind, Transport, TransportError};
use pyref_workspace::{Collaborators, Workspace};
use std::sync::{Arc, Mutex};
use url::Url;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Installed packages; `None` simulates a broken package manager.
#[derive(Default)]
pub struct FakeLister {
    installed: Mutex<Option<Vec<String>>>,
}

impl FakeLister {
    pub fn set(&self, names: &[&str]) {
        *lock(&self.installed) = Some(names.iter().map(|name| name.to_string()).collect());
    }

    pub fn break_listing(&self) {
        *lock(&self.installed) = None;
    }
}

impl PackageLister for FakeLister {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>, ListingError> {
        match &*lock(&self.installed) {
            Some(names) => Ok(names
                .iter()
                .map(|name| InstalledPackage::new(name.as_str(), "1.0"))
                .collect()),
            None => Err(ListingError::Unavailable("pip: command not found".into())),
        }
    }
}

/// Every package exposes `<name>_fn` and `<Name>Class`; `broken*` packages fail to import.
#[derive(Default)]
pub struct FakeInspector {
    calls: Mutex<Vec<String>>,
}

impl FakeInspector {
    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.calls))
    }
}

impl ModuleInspector for FakeInspector {
    fn inspect(&self, name: &str) -> Result<ModuleReflection, ImportFailure> {
        lock(&self.calls).push(name.to_string());
        if name.starts_with("broken") {
            return Err(ImportFailure::new(name, "ImportError: missing shared library"));
        }
        Ok(ModuleReflection {
            doc: Some(format!("The {name} package.")),
            members: vec![
                ReflectedMember::new(format!("{name}_fn"), MemberKind::Function, Some(name)),
                ReflectedMember::new(format!("{name}Class"), MemberKind::Class, Some(name)),
            ],
        })
    }
}

#[derive(Default)]
pub struct FakeBuiltins {
    broken: Mutex<bool>,
    calls: Mutex<usize>,
}

impl FakeBuiltins {
    pub fn break_listing(&self) {
        *lock(&self.broken) = true;
    }

    pub fn calls(&self) -> usize {
        *lock(&self.calls)
    }
}

impl BuiltinsSource for FakeBuiltins {
    fn list_builtins(&self) -> Result<Vec<String>, ListingError> {
        *lock(&self.calls) += 1;
        if *lock(&self.broken) {
            return Err(ListingError::Unavailable("interpreter missing".into()));
        }
        Ok(["None", "abs", "len", "print"]
            .into_iter()
            .map(String::from)
            .collect())
    }
}

/// Serves a JSON simple index and per-project details; `offline` makes every request fail.
pub struct FakeRemote {
    projects: Mutex<Vec<String>>,
    offline: Mutex<bool>,
    requests: Mutex<Vec<(String, RequestKind)>>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            projects: Mutex::new(vec!["jsonschema".into(), "numpy".into()]),
            offline: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRemote {
    pub fn set_offline(&self, offline: bool) {
        *lock(&self.offline) = offline;
    }

    pub fn set_projects(&self, projects: &[&str]) {
        *lock(&self.projects) = projects.iter().map(|name| name.to_string()).collect();
    }

    pub fn requests(&self) -> Vec<(String, RequestKind)> {
        lock(&self.requests).clone()
    }
}

impl Transport for FakeRemote {
    fn get(&self, url: &Url, _accept: &str, kind: RequestKind) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push((url.path().to_string(), kind));
        if *lock(&self.offline) {
            return Err(TransportError::Network {
                url: url.to_string(),
                message: "connection refused".into(),
            });
        }
        let body = match kind {
            RequestKind::Index => {
                let projects: Vec<_> = lock(&self.projects)
                    .iter()
                    .map(|name| serde_json::json!({ "name": name }))
                    .collect();
                serde_json::json!({ "meta": { "api-version": "1.0" }, "projects": projects })
            }
            RequestKind::Detail => {
                let name = url
                    .path_segments()
                    .and_then(|segments| segments.rev().nth(1))
                    .unwrap_or_default()
                    .to_string();
                serde_json::json!({ "info": { "name": name, "version": "1.0.0", "summary": "remote" } })
            }
        };
        Ok(HttpResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: serde_json::to_vec(&body).unwrap(),
        })
    }
}

pub const START_MILLIS: u64 = 1_700_000_000_000;

pub struct Env {
    pub dir: tempfile::TempDir,
    pub config: PyrefConfig,
    pub clock: Arc<ManualClock>,
    pub lister: Arc<FakeLister>,
    pub inspector: Arc<FakeInspector>,
    pub builtins: Arc<FakeBuiltins>,
    pub remote: Arc<FakeRemote>,
}

impl Env {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PyrefConfig::default();
        config.cache.root = Some(dir.path().join("cache"));

        let lister = Arc::new(FakeLister::default());
        lister.set(&["json", "requests", "numpy"]);

        Self {
            dir,
            config,
            clock: Arc::new(ManualClock::new(START_MILLIS)),
            lister,
            inspector: Arc::new(FakeInspector::default()),
            builtins: Arc::new(FakeBuiltins::default()),
            remote: Arc::new(FakeRemote::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            lister: self.lister.clone(),
            inspector: self.inspector.clone(),
            builtins: self.builtins.clone(),
            transport: self.remote.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn open(&self) -> Workspace {
        Workspace::open(&self.config, self.collaborators()).unwrap()
    }

    pub fn record_path(&self, file: &str) -> std::path::PathBuf {
        self.dir.path().join("cache").join(file)
    }
}

/// Hand-written record envelope, as another process would have left it on disk.
pub fn envelope(category: serde_json::Value, written_at: u64, payload: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "schema_version": RECORD_SCHEMA_VERSION,
        "category": category,
        "written_at_millis": written_at,
        "payload": payload,
    }))
    .unwrap()
}
