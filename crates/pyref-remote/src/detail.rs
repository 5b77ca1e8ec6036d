use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for one remote project, as cached under `remote_details/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDetailRecord {
    /// The name the detail was requested under (the cache key).
    pub package_name: String,
    /// The project's own spelling of its name, when the index reports one.
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub project_urls: BTreeMap<String, String>,
}
