use crate::detail::RemoteDetailRecord;
use pyref_index::RemoteIndexSnapshot;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// `Accept` header for the simple index: JSON (PEP 691) preferred, HTML (PEP 503) as fallback.
pub const SIMPLE_INDEX_ACCEPT: &str = "application/vnd.pypi.simple.v1+json, text/html;q=0.1";

pub const DETAIL_ACCEPT: &str = "application/json";

#[derive(Debug, Deserialize)]
struct SimpleIndexJson {
    projects: Vec<SimpleProject>,
}

#[derive(Debug, Deserialize)]
struct SimpleProject {
    name: String,
}

/// Parse a simple-repository project listing in either of its two wire formats.
pub fn parse_simple_index(
    body: &[u8],
    content_type: Option<&str>,
) -> Result<RemoteIndexSnapshot, String> {
    let looks_like_json = content_type.is_some_and(|ct| ct.contains("json"))
        || body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{');

    if looks_like_json {
        let index: SimpleIndexJson = serde_json::from_slice(body)
            .map_err(|err| format!("invalid simple index JSON: {err}"))?;
        return Ok(index
            .projects
            .into_iter()
            .map(|project| project.name.trim().to_owned())
            .collect());
    }

    let html = String::from_utf8_lossy(body);
    Ok(html_project_names(&html).collect())
}

fn html_project_names(html: &str) -> impl Iterator<Item = String> + '_ {
    static HREF_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = HREF_RE.get_or_init(|| {
        regex::Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#)
            .expect("anchor regex should compile")
    });

    re.captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .filter_map(|href| project_from_href(href.as_str()))
}

/// `/simple/<name>/` (absolute, as served by PyPI) or `<name>/` (relative, as served by most
/// mirrors).
fn project_from_href(href: &str) -> Option<String> {
    let rest = match href.strip_prefix("/simple/") {
        Some(rest) => rest,
        None if !href.starts_with('/') && !href.contains("://") => href,
        None => return None,
    };
    let name = rest.strip_suffix('/')?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name.to_owned())
}

#[derive(Debug, Deserialize)]
struct ProjectJson {
    info: ProjectInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    home_page: Option<String>,
    #[serde(default)]
    project_urls: Option<BTreeMap<String, Option<String>>>,
}

/// Parse the per-project JSON document (`<base>/<name>/json`).
pub fn parse_project_detail(requested: &str, body: &[u8]) -> Result<RemoteDetailRecord, String> {
    let project: ProjectJson =
        serde_json::from_slice(body).map_err(|err| format!("invalid project JSON: {err}"))?;
    let info = project.info;

    let project_urls = info
        .project_urls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(label, url)| non_empty(url).map(|url| (label, url)))
        .collect();

    Ok(RemoteDetailRecord {
        package_name: requested.to_owned(),
        canonical_name: non_empty(info.name),
        version: non_empty(info.version),
        summary: non_empty(info.summary),
        homepage: non_empty(info.home_page),
        project_urls,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
