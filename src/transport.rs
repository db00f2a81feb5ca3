use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::debug_log::{DebugLog, LogKind};
use crate::error::{CatalogError, Result};

// ── Request description ───────────────────────────────────────────────────────

/// One outbound GET, with a short label used in logs.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub label: String,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            label: url.clone(),
            url,
            headers: vec![("accept".to_string(), "application/json".to_string())],
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Replace the default JSON `accept` header.
    pub fn accept(mut self, value: impl Into<String>) -> Self {
        self.headers.retain(|(name, _)| !name.eq_ignore_ascii_case("accept"));
        self.headers.push(("accept".to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// URL plus a digest of the request options.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.headers {
            hasher.update(name.to_ascii_lowercase().as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        format!("{}#{:x}", self.url, hasher.finalize())
    }
}

// ── Transport strategies ──────────────────────────────────────────────────────

/// A way of reaching the target URL: directly, or through a pass-through relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStrategy {
    Direct,
    Relay { name: String, template: String },
}

impl TransportStrategy {
    pub fn relay(position: usize, template: impl Into<String>) -> Self {
        TransportStrategy::Relay {
            name: format!("relay {}", position + 1),
            template: template.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TransportStrategy::Direct => "direct",
            TransportStrategy::Relay { name, .. } => name,
        }
    }

    /// Rewrite `url` into the URL this strategy actually requests.
    pub fn target(&self, url: &str) -> String {
        match self {
            TransportStrategy::Direct => url.to_string(),
            TransportStrategy::Relay { template, .. } => {
                template.replace("{url}", &urlencoding::encode(url))
            }
        }
    }
}

/// Direct first, then every configured relay in declared order.
pub fn strategy_chain(relays: &[String]) -> Vec<TransportStrategy> {
    std::iter::once(TransportStrategy::Direct)
        .chain(
            relays
                .iter()
                .enumerate()
                .map(|(i, template)| TransportStrategy::relay(i, template.clone())),
        )
        .collect()
}

// ── Response cache ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Arc<Value>,
    pub timestamp: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

/// A cached fetch result. `stale` is set when the payload is an expired entry served because
/// the refresh failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub payload: Value,
    pub stale: bool,
}

impl Fetched {
    fn fresh(payload: Value) -> Self {
        Self { payload, stale: false }
    }
}

// ── Transport client ──────────────────────────────────────────────────────────

/// Shared outbound client: timeout, cache with stale-on-failure, relay fallback chain, and the
/// bounded debug log. Construct once with [`TransportClient::init`] and share behind an `Arc`.
pub struct TransportClient {
    client: Client,
    timeout: Duration,
    ttl: Duration,
    strategies: Vec<TransportStrategy>,
    /// Entries are never expired by the cache itself; freshness is judged from the timestamp.
    cache: Cache<String, CacheEntry>,
    log: DebugLog,
}

impl TransportClient {
    pub fn init(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.request_timeout,
            ttl: config.cache_ttl,
            strategies: strategy_chain(&config.relays),
            cache: Cache::builder().max_capacity(config.cache_capacity).build(),
            log: DebugLog::new(config.debug_log_capacity),
        })
    }

    /// Drop every cached payload and every debug-log entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.log.clear();
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    pub fn strategies(&self) -> &[TransportStrategy] {
        &self.strategies
    }

    /// Serve a fresh cached payload, otherwise fetch through the strategy chain and store the
    /// result. When the refresh fails and a stale entry exists, the stale payload is returned
    /// with [`Fetched::stale`] set.
    pub async fn fetch_cached(&self, request: &FetchRequest) -> Result<Fetched> {
        let key = request.cache_key();
        let cached = self.cache.get(&key).await;

        if let Some(entry) = &cached {
            if entry.is_fresh(self.ttl) {
                debug!(label = %request.label, "cache hit");
                return Ok(Fetched::fresh((*entry.payload).clone()));
            }
        }

        match self.fetch_resilient(request).await {
            Ok(payload) => {
                let entry = CacheEntry {
                    key: key.clone(),
                    payload: Arc::new(payload.clone()),
                    timestamp: Instant::now(),
                };
                self.cache.insert(key, entry).await;
                Ok(Fetched::fresh(payload))
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!(label = %request.label, error = %e, "serving stale cache entry");
                    self.log.push(
                        LogKind::Warn,
                        format!("← {} serving stale cache ({e})", request.label),
                        None,
                    );
                    Ok(Fetched {
                        payload: (*stale.payload).clone(),
                        stale: true,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Try each transport strategy in order; the first JSON success wins.
    pub async fn fetch_resilient(&self, request: &FetchRequest) -> Result<Value> {
        self.run_chain(request, |body| {
            serde_json::from_str::<Value>(&body).map_err(|e| CatalogError::Parse(e.to_string()))
        })
        .await
    }

    /// Same chain as [`fetch_resilient`](Self::fetch_resilient) for non-JSON bodies.
    pub async fn fetch_text(&self, request: &FetchRequest) -> Result<String> {
        self.run_chain(request, Ok).await
    }

    async fn run_chain<T, F>(&self, request: &FetchRequest, decode: F) -> Result<T>
    where
        T: Describe,
        F: Fn(String) -> Result<T>,
    {
        for strategy in &self.strategies {
            let target = strategy.target(&request.url);
            let outcome = match self.attempt(&target, request).await {
                Ok(body) => decode(body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => {
                    let summary = value.describe();
                    debug!(label = %request.label, via = strategy.name(), "fetch ok");
                    self.log.push(
                        LogKind::Ok,
                        format!("← {} [{}] OK ({})", request.label, strategy.name(), summary.0),
                        Some(&summary.1),
                    );
                    return Ok(value);
                }
                Err(e) => {
                    let kind = match strategy {
                        TransportStrategy::Direct => LogKind::Warn,
                        TransportStrategy::Relay { .. } => LogKind::Error,
                    };
                    warn!(label = %request.label, via = strategy.name(), error = %e, "fetch failed");
                    self.log.push(
                        kind,
                        format!("← {} [{}] FAIL: {e}", request.label, strategy.name()),
                        None,
                    );
                }
            }
        }

        error!(label = %request.label, "all transports exhausted");
        Err(CatalogError::AllTransportsExhausted(request.label.clone()))
    }

    async fn attempt(&self, target: &str, request: &FetchRequest) -> Result<String> {
        let mut builder = self.client.get(target).timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Network(format!("timed out after {:?}", self.timeout))
            } else {
                CatalogError::Network(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            return Err(CatalogError::Http {
                status: resp.status().as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| CatalogError::Network(format!("body read failed: {e}")))
    }
}

/// Short summary plus payload excerpt for the debug log.
trait Describe {
    fn describe(&self) -> (String, String);
}

impl Describe for Value {
    fn describe(&self) -> (String, String) {
        let count = match self {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        };
        (format!("{count} items"), self.to_string())
    }
}

impl Describe for String {
    fn describe(&self) -> (String, String) {
        (format!("{} bytes", self.len()), self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with(relays: Vec<String>, ttl: Duration) -> Config {
        Config {
            relays,
            cache_ttl: ttl,
            request_timeout: Duration::from_secs(2),
            ..Config::default()
        }
    }

    #[test]
    fn relay_target_encodes_the_url() {
        let strategy = TransportStrategy::relay(0, "https://relay.example/?{url}");
        assert_eq!(
            strategy.target("https://api.example/list?page=1"),
            "https://relay.example/?https%3A%2F%2Fapi.example%2Flist%3Fpage%3D1"
        );
        assert_eq!(strategy.name(), "relay 1");
    }

    #[test]
    fn chain_starts_direct_and_keeps_relay_order() {
        let chain = strategy_chain(&["a/{url}".to_string(), "b/{url}".to_string()]);
        let names: Vec<&str> = chain.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["direct", "relay 1", "relay 2"]);
    }

    #[test]
    fn cache_key_depends_on_headers() {
        let a = FetchRequest::get("https://x/y");
        let b = FetchRequest::get("https://x/y").header("siteName", "demo");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), FetchRequest::get("https://x/y").cache_key());
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_a_second_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "bookId": 1 }])))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            TransportClient::init(&config_with(vec![], Duration::from_secs(60))).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri()));

        let first = client.fetch_cached(&request).await.unwrap();
        let second = client.fetch_cached(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_entry_is_served_when_refresh_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "v": 1 })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = TransportClient::init(&config_with(vec![], Duration::ZERO)).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri()));

        let first = client.fetch_cached(&request).await.unwrap();
        assert_eq!(first.payload, json!({ "v": 1 }));
        assert!(!first.stale);

        let second = client.fetch_cached(&request).await.unwrap();
        assert_eq!(second.payload, json!({ "v": 1 }));
        assert!(second.stale);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failure_without_stale_entry_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = TransportClient::init(&config_with(vec![], Duration::ZERO)).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri()));
        let err = client.fetch_cached(&request).await.unwrap_err();
        assert!(matches!(err, CatalogError::AllTransportsExhausted(_)));
    }

    #[tokio::test]
    async fn forbidden_direct_request_walks_relays_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-a"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-b"))
            .and(query_param("url", format!("{}/list", server.uri())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .expect(1)
            .mount(&server)
            .await;

        let relays = vec![
            format!("{}/relay-a?url={{url}}", server.uri()),
            format!("{}/relay-b?url={{url}}", server.uri()),
        ];
        let client = TransportClient::init(&config_with(relays, Duration::ZERO)).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri())).labelled("list");

        let value = client.fetch_resilient(&request).await.unwrap();
        assert_eq!(value, json!([1, 2, 3]));

        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/list", "/relay-a", "/relay-b"]);

        let kinds: Vec<LogKind> = client.debug_log().entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![LogKind::Warn, LogKind::Error, LogKind::Ok]);
    }

    #[tokio::test]
    async fn exhausted_chain_logs_every_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let relays = vec![format!("{}/relay?url={{url}}", server.uri())];
        let client = TransportClient::init(&config_with(relays, Duration::ZERO)).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri()));

        let err = client.fetch_resilient(&request).await.unwrap_err();
        assert!(matches!(err, CatalogError::AllTransportsExhausted(_)));
        assert_eq!(client.debug_log().len(), 2);
    }

    #[tokio::test]
    async fn non_json_body_falls_through_to_next_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let relays = vec![format!("{}/relay?url={{url}}", server.uri())];
        let client = TransportClient::init(&config_with(relays, Duration::ZERO)).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri()));
        assert_eq!(
            client.fetch_resilient(&request).await.unwrap(),
            json!({ "ok": true })
        );
    }

    #[tokio::test]
    async fn slow_response_is_cancelled_by_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = Config {
            relays: vec![],
            request_timeout: Duration::from_millis(200),
            ..Config::default()
        };
        let client = TransportClient::init(&config).unwrap();
        let request = FetchRequest::get(format!("{}/slow", server.uri()));

        let started = Instant::now();
        let err = client.fetch_resilient(&request).await.unwrap_err();
        assert!(matches!(err, CatalogError::AllTransportsExhausted(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn clear_drops_cache_and_log() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let client =
            TransportClient::init(&config_with(vec![], Duration::from_secs(60))).unwrap();
        let request = FetchRequest::get(format!("{}/list", server.uri()));
        client.fetch_cached(&request).await.unwrap();
        client.clear();
        assert!(client.debug_log().is_empty());
        client.fetch_cached(&request).await.unwrap();
    }
}
