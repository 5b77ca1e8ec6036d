//! Package listing and module reflection backed by a real Python interpreter.
//!
//! Each call spawns a short-lived interpreter through `pyref-process`, so a package that hangs
//! or crashes during import only costs one bounded child process.

mod builtins;
mod inspect;
mod interpreter;
mod pip;

pub use builtins::{parse_builtins_output, PythonBuiltins};
pub use inspect::{parse_reflection_output, PythonModuleInspector, REFLECT_SCRIPT};
pub use interpreter::PythonInterpreter;
pub use pip::{parse_pip_freeze, PipPackageLister};
