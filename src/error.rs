use thiserror::Error;

/// Everything the catalog layer can surface to a caller.
///
/// Per-item schema problems are recovered inside the adapters and per-provider failures are
/// recovered by the aggregation; only the variants reaching an API handler are user visible.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Timeout, abort, or connection failure.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered with a non-2xx status.
    #[error("upstream HTTP {status}")]
    Http { status: u16 },

    /// Upstream body was not the JSON (or text) we expected.
    #[error("parse error: {0}")]
    Parse(String),

    /// An adapter could not find the identity fields of a record.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("no playable source for episode")]
    NoPlayableSource,

    /// The selected source offers no track in this language.
    #[error("no subtitle track for language {0}")]
    UnknownSubtitle(String),

    #[error("all transports exhausted for {0}")]
    AllTransportsExhausted(String),

    #[error("all providers failed")]
    AllProvidersFailed,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown feed: {0}")]
    UnknownFeed(String),

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("invalid content id: {0}")]
    InvalidId(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Whether a retry (or another transport) might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Network(_) | CatalogError::Http { .. } | CatalogError::Parse(_)
        )
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return CatalogError::Http {
                status: status.as_u16(),
            };
        }
        if e.is_decode() {
            return CatalogError::Parse(e.to_string());
        }
        CatalogError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
