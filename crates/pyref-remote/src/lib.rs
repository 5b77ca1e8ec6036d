//! Remote package index access.
//!
//! The full project listing is fetched in one request and cached as
//! [`pyref_cache::CacheCategory::RemoteIndex`]. Per-project metadata is fetched lazily, one
//! project at a time, and cached under `remote_details/`. Network failures degrade to cached
//! data instead of failing the caller.

mod detail;
mod error;
mod fetcher;
mod parse;
mod transport;

pub use detail::RemoteDetailRecord;
pub use error::RemoteError;
pub use fetcher::{IndexFetch, RemoteEndpoints, RemoteIndexFetcher};
pub use parse::{parse_project_detail, parse_simple_index, DETAIL_ACCEPT, SIMPLE_INDEX_ACCEPT};
pub use transport::{
    redact_url, HttpResponse, RequestKind, Transport, TransportError, UreqTransport,
    MAX_RESPONSE_BYTES,
};
