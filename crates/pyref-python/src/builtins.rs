use crate::interpreter::{last_line, PythonInterpreter};
use pyref_index::{BuiltinsSource, ListingError};

const BUILTINS_SCRIPT: &str = "import builtins, json; print(json.dumps(sorted(dir(builtins))))";

/// `dir(builtins)` of the configured interpreter.
#[derive(Clone, Debug, Default)]
pub struct PythonBuiltins {
    interpreter: PythonInterpreter,
}

impl PythonBuiltins {
    pub fn new(interpreter: PythonInterpreter) -> Self {
        Self { interpreter }
    }
}

impl BuiltinsSource for PythonBuiltins {
    fn list_builtins(&self) -> Result<Vec<String>, ListingError> {
        let invocation = self.interpreter.invocation().args(["-c", BUILTINS_SCRIPT]);
        let completed = self
            .interpreter
            .run(&invocation, self.interpreter.listing_timeout())
            .map_err(|err| ListingError::Unavailable(err.to_string()))?;
        parse_builtins_output(&completed.output.stdout)
    }
}

pub fn parse_builtins_output(stdout: &str) -> Result<Vec<String>, ListingError> {
    let line = last_line(stdout)
        .ok_or_else(|| ListingError::Malformed("interpreter printed nothing".into()))?;
    serde_json::from_str(line)
        .map_err(|err| ListingError::Malformed(format!("invalid builtins listing: {err}")))
}
