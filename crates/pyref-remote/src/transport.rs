use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Upper bound on any response body. The full simple index is the largest payload by far.
pub const MAX_RESPONSE_BYTES: u64 = 128 * 1024 * 1024;

const URL_REDACTION: &str = "<redacted>";

/// Which endpoint a request targets; selects the timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Index,
    Detail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("server returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("transport error for {url}: {message}")]
    Network { url: String, message: String },
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Blocking GET. Implementations must bound the time a call can take.
pub trait Transport: Send + Sync {
    fn get(&self, url: &Url, accept: &str, kind: RequestKind)
        -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] over a shared `ureq` agent.
#[derive(Clone, Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
    index_timeout: Duration,
    detail_timeout: Duration,
    max_bytes: u64,
}

impl UreqTransport {
    pub fn new(index_timeout: Duration, detail_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(index_timeout.min(detail_timeout))
            .user_agent(concat!("pyref/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            index_timeout,
            detail_timeout,
            max_bytes: MAX_RESPONSE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn timeout(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Index => self.index_timeout,
            RequestKind::Detail => self.detail_timeout,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(5))
    }
}

impl Transport for UreqTransport {
    fn get(
        &self,
        url: &Url,
        accept: &str,
        kind: RequestKind,
    ) -> Result<HttpResponse, TransportError> {
        let safe_url = redact_url(url);
        let response = self
            .agent
            .get(url.as_str())
            .timeout(self.timeout(kind))
            .set("Accept", accept)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, _response) => TransportError::Status {
                    status,
                    url: safe_url.clone(),
                },
                ureq::Error::Transport(transport) => TransportError::Network {
                    url: safe_url.clone(),
                    message: match transport.message() {
                        Some(message) => format!("{}: {message}", transport.kind()),
                        None => transport.kind().to_string(),
                    },
                },
            })?;

        let status = response.status();
        let content_type = response.header("Content-Type").map(str::to_owned);

        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|err| TransportError::Body {
                url: safe_url.clone(),
                message: err.to_string(),
            })?;
        if body.len() as u64 > self.max_bytes {
            return Err(TransportError::TooLarge {
                url: safe_url,
                limit: self.max_bytes,
            });
        }

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Render `url` for logs and errors: credentials are dropped and query values redacted.
pub fn redact_url(url: &Url) -> String {
    let mut safe = url.clone();
    if !safe.username().is_empty() || safe.password().is_some() {
        let _ = safe.set_username(URL_REDACTION);
        let _ = safe.set_password(None);
    }
    if safe.query().is_some() {
        let keys: Vec<String> = safe.query_pairs().map(|(key, _)| key.into_owned()).collect();
        let mut pairs = safe.query_pairs_mut();
        pairs.clear();
        for key in &keys {
            pairs.append_pair(key, URL_REDACTION);
        }
        drop(pairs);
    }
    if safe.fragment().is_some() {
        safe.set_fragment(Some(URL_REDACTION));
    }
    safe.to_string()
}
