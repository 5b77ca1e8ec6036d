use std::path::PathBuf;

/// Errors produced by cache-root management and record persistence.
///
/// Read-side problems (missing, truncated, or undecodable records) are never surfaced as
/// errors: the store reports them as cache misses. Only writes and layout setup fail loudly.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {message}")]
    Json { message: String },

    #[error("cache record {path} is larger than the {limit} byte limit")]
    RecordTooLarge { path: PathBuf, limit: usize },

    #[error("path {path} is not under cache root {cache_root}")]
    PathNotUnderCacheRoot { path: PathBuf, cache_root: PathBuf },
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        // Payloads carry docstrings and project URLs scraped from third-party packages; keep
        // them out of error strings that end up in logs.
        Self::Json {
            message: redact_quoted(&err.to_string()),
        }
    }
}

/// Replace every double-quoted substring with `"<redacted>"`.
///
/// Escaped quotes (`\"`) inside a quoted run do not terminate it. An unterminated quote
/// redacts the remainder of the message.
pub(crate) fn redact_quoted(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars();
    while let Some(ch) = chars.next() {
        out.push(ch);
        if ch != '"' {
            continue;
        }

        let mut escaped = false;
        let mut closed = false;
        for inner in chars.by_ref() {
            if escaped {
                escaped = false;
                continue;
            }
            match inner {
                '\\' => escaped = true,
                '"' => {
                    closed = true;
                    break;
                }
                _ => {}
            }
        }

        out.push_str("<redacted>");
        if closed {
            out.push('"');
        } else {
            break;
        }
    }
    out
}
