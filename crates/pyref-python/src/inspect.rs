use crate::interpreter::{last_line, PythonInterpreter};
use pyref_index::{ImportFailure, ModuleInspector, ModuleReflection, ReflectedMember};
use serde::Deserialize;

/// Reflection helper run as `python -c REFLECT_SCRIPT <distribution>`.
///
/// Prints one JSON line: `{"ok": true, "doc": ..., "members": [...]}` or
/// `{"ok": false, "error": ...}`. Output written by the imported package goes to stderr.
pub const REFLECT_SCRIPT: &str = r#"
import importlib, inspect, json, sys

out = sys.stdout
sys.stdout = sys.stderr

def load(name):
    errors = []
    for candidate in dict.fromkeys((name, name.replace("-", "_"))):
        try:
            return importlib.import_module(candidate), None
        except BaseException as exc:
            errors.append("%s: %s: %s" % (candidate, type(exc).__name__, exc))
    return None, "; ".join(errors)

def describe(name, obj):
    if inspect.isfunction(obj):
        kind = "function"
    elif inspect.isclass(obj):
        kind = "class"
    elif inspect.ismodule(obj):
        kind = "module"
    else:
        kind = "other"
    origin = getattr(obj, "__name__" if kind == "module" else "__module__", None)
    if not isinstance(origin, str):
        origin = None
    return {"name": name, "kind": kind, "module": origin}

module, error = load(sys.argv[1])
if module is None:
    result = {"ok": False, "error": error}
else:
    members = []
    for name in dir(module):
        try:
            members.append(describe(name, getattr(module, name)))
        except BaseException:
            continue
    try:
        doc = inspect.getdoc(module)
    except BaseException:
        doc = None
    result = {"ok": True, "doc": doc, "members": members}

out.write(json.dumps(result) + "\n")
out.flush()
"#;

/// Imports each package in a fresh interpreter and reports its public surface.
#[derive(Clone, Debug, Default)]
pub struct PythonModuleInspector {
    interpreter: PythonInterpreter,
}

impl PythonModuleInspector {
    pub fn new(interpreter: PythonInterpreter) -> Self {
        Self { interpreter }
    }
}

impl ModuleInspector for PythonModuleInspector {
    fn inspect(&self, name: &str) -> Result<ModuleReflection, ImportFailure> {
        let invocation = self
            .interpreter
            .invocation()
            .args(["-c", REFLECT_SCRIPT, name]);
        let completed = self
            .interpreter
            .run(&invocation, self.interpreter.inspect_timeout())
            .map_err(|err| ImportFailure::new(name, err.to_string()))?;

        let reflection = parse_reflection_output(name, &completed.output.stdout)?;
        tracing::debug!(
            target: "pyref.python",
            package = name,
            members = reflection.members.len(),
            elapsed_ms = completed.elapsed.as_millis() as u64,
            "inspected package"
        );
        Ok(reflection)
    }
}

#[derive(Debug, Deserialize)]
struct ReflectOutput {
    ok: bool,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    members: Vec<ReflectedMember>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode the helper's stdout for package `name`.
pub fn parse_reflection_output(name: &str, stdout: &str) -> Result<ModuleReflection, ImportFailure> {
    let line = last_line(stdout)
        .ok_or_else(|| ImportFailure::new(name, "reflection helper printed nothing"))?;
    let output: ReflectOutput = serde_json::from_str(line)
        .map_err(|err| ImportFailure::new(name, format!("invalid reflection output: {err}")))?;

    if !output.ok {
        let reason = output.error.unwrap_or_else(|| "import failed".into());
        return Err(ImportFailure::new(name, reason));
    }

    Ok(ModuleReflection {
        doc: output.doc.filter(|doc| !doc.trim().is_empty()),
        members: output.members,
    })
}
