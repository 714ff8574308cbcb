//! Backend access: a raw JSON transport and the typed client built on it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::ApiVersion;
use crate::metrics::{self, RequestTimer};
use crate::models::{
    Counter, CounterQuery, ExpandedCounter, RawSeries, Scope, TagkvIndex, TreeRecord,
};
use crate::{DatasourceError, Result};

/// Remote fetch capability: one JSON round-trip, envelope already unwrapped.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        (**self).fetch(method, path, body).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    dat: Value,
    #[serde(default)]
    err: String,
}

/// [`Transport`] over HTTP against the backend's base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let _timer = RequestTimer::new();
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(backend_failure)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(backend_failure)?;

        if !status.is_success() {
            metrics::record_backend_failure();
            let envelope: Envelope = serde_json::from_slice(&bytes).unwrap_or_default();
            let message = if envelope.err.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                envelope.err
            };
            return Err(DatasourceError::Backend(message));
        }

        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        if !envelope.err.is_empty() {
            warn!("backend reported for {}: {}", path, envelope.err);
        }
        Ok(envelope.dat)
    }
}

fn backend_failure(e: reqwest::Error) -> DatasourceError {
    metrics::record_backend_failure();
    DatasourceError::from(e)
}

#[derive(Deserialize)]
struct Ident {
    ident: String,
}

#[derive(Deserialize)]
struct Listed<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

#[derive(Deserialize)]
struct MetricNames {
    #[serde(default)]
    metrics: Vec<String>,
}

/// Typed backend operations for one API generation.
pub struct Client<T> {
    transport: T,
    version: ApiVersion,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, version: ApiVersion) -> Self {
        Self { transport, version }
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<R> {
        let value = self.transport.fetch(method, path, body).await?;
        decode(value)
    }

    pub async fn fetch_tree(&self) -> Result<Vec<TreeRecord>> {
        let path = match self.version {
            ApiVersion::V2 => "/v1/portal/tree",
            ApiVersion::V3 => "/api/rdb/tree",
        };
        self.call(Method::GET, path, None).await
    }

    /// Endpoint idents mounted under node `nid`.
    pub async fn fetch_endpoints(&self, nid: i64) -> Result<Vec<String>> {
        let idents: Vec<Ident> = match self.version {
            ApiVersion::V2 => {
                let path = format!("/v1/portal/endpoints/bynodeids?ids={}", nid);
                self.call(Method::GET, &path, None).await?
            }
            ApiVersion::V3 => {
                let path = format!("/api/rdb/node/{}/resources?limit=5000", nid);
                self.call::<Listed<Ident>>(Method::GET, &path, None).await?.list
            }
        };
        Ok(idents.into_iter().map(|i| i.ident).collect())
    }

    pub async fn fetch_metrics(&self, scope: &Scope) -> Result<Vec<String>> {
        let path = match scope {
            Scope::Endpoints(_) => "/api/index/metrics",
            Scope::Nids(_) => "/api/mon/index/metrics",
        };
        let names: MetricNames = self
            .call(Method::POST, path, Some(serde_json::to_value(scope)?))
            .await?;
        Ok(names.metrics)
    }

    /// Tag universes for `metrics` within `scope`; only the first metric's entry is returned.
    pub async fn fetch_tagkv(&self, scope: &Scope, metrics: &[String]) -> Result<TagkvIndex> {
        let (path, key, values) = match scope {
            Scope::Endpoints(values) => ("/api/index/tagkv", "endpoints", values),
            Scope::Nids(values) => ("/api/mon/index/tagkv", "nids", values),
        };
        let mut body = Map::new();
        body.insert(key.to_string(), json!(values));
        body.insert("metrics".to_string(), json!(metrics));
        let mut indexes: Vec<TagkvIndex> = self
            .call(Method::POST, path, Some(Value::Object(body)))
            .await?;
        if indexes.is_empty() {
            return Ok(TagkvIndex { tagkv: Vec::new() });
        }
        Ok(indexes.swap_remove(0))
    }

    pub async fn fetch_counters(&self, queries: &[CounterQuery]) -> Result<Vec<Counter>> {
        let body = Some(serde_json::to_value(queries)?);
        let path = "/api/index/counter/fullmatch";
        match self.version {
            ApiVersion::V2 => self.call(Method::POST, path, body).await,
            ApiVersion::V3 => Ok(self.call::<Listed<Counter>>(Method::POST, path, body).await?.list),
        }
    }

    /// Raw value sets for one expanded counter, without the empty ones.
    pub async fn fetch_series(&self, counter: &ExpandedCounter) -> Result<Vec<RawSeries>> {
        let body = Some(serde_json::to_value(counter)?);
        let items: Vec<RawSeries> = self.call(Method::POST, "/api/transfer/data/ui", body).await?;
        Ok(items.into_iter().filter(|item| !item.values.is_empty()).collect())
    }
}

/// A `null` payload decodes as the type's empty value where it has one.
fn decode<R: DeserializeOwned>(value: Value) -> Result<R> {
    match value {
        Value::Null => serde_json::from_value(json!([]))
            .or_else(|_| serde_json::from_value(json!({})))
            .map_err(DatasourceError::from),
        value => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers by path and remembers what was asked.
    #[derive(Default)]
    struct Canned {
        responses: HashMap<String, Value>,
        calls: Mutex<Vec<(Method, String, Option<Value>)>>,
    }

    impl Canned {
        fn with(mut self, path: &str, value: Value) -> Self {
            self.responses.insert(path.to_string(), value);
            self
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn fetch(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
            self.calls.lock().unwrap().push((method, path.to_string(), body));
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| DatasourceError::Backend(format!("no route {}", path)))
        }
    }

    async fn serve_backend() -> HttpTransport {
        use axum::{http::StatusCode, routing::get, Json, Router};

        let app = Router::new()
            .route(
                "/partial",
                get(|| async { Json(json!({ "dat": ["web01"], "err": "index lagging" })) }),
            )
            .route(
                "/denied",
                get(|| async {
                    (
                        StatusCode::FORBIDDEN,
                        Json(json!({ "dat": null, "err": "permission denied" })),
                    )
                }),
            )
            .route("/unavailable", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route("/garbage", get(|| async { "<html>login</html>" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        HttpTransport::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_http_envelope_handling() {
        let transport = serve_backend().await;
        let failures_before = metrics::BACKEND_FAILURES.get();

        let dat = transport.fetch(Method::GET, "/partial", None).await.unwrap();
        assert_eq!(dat, json!(["web01"]));

        match transport.fetch(Method::GET, "/denied", None).await {
            Err(DatasourceError::Backend(message)) => assert_eq!(message, "permission denied"),
            other => panic!("expected backend error, got {:?}", other),
        }

        match transport.fetch(Method::GET, "/unavailable", None).await {
            Err(DatasourceError::Backend(message)) => assert_eq!(message, "Service Unavailable"),
            other => panic!("expected backend error, got {:?}", other),
        }

        assert!(matches!(
            transport.fetch(Method::GET, "/garbage", None).await,
            Err(DatasourceError::Serialization(_))
        ));

        assert!(metrics::BACKEND_FAILURES.get() >= failures_before + 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_counts_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let failures_before = metrics::BACKEND_FAILURES.get();

        assert!(matches!(
            transport.fetch(Method::GET, "/v1/portal/tree", None).await,
            Err(DatasourceError::Transport(_))
        ));
        assert!(metrics::BACKEND_FAILURES.get() > failures_before);
    }

    #[tokio::test]
    async fn test_endpoints_per_version() {
        let v2 = Client::new(
            Canned::default().with(
                "/v1/portal/endpoints/bynodeids?ids=4",
                json!([{ "ident": "web01" }, { "ident": "db01" }]),
            ),
            ApiVersion::V2,
        );
        assert_eq!(v2.fetch_endpoints(4).await.unwrap(), vec!["web01", "db01"]);

        let v3 = Client::new(
            Canned::default().with(
                "/api/rdb/node/4/resources?limit=5000",
                json!({ "list": [{ "ident": "web01", "id": 3 }], "total": 1 }),
            ),
            ApiVersion::V3,
        );
        assert_eq!(v3.fetch_endpoints(4).await.unwrap(), vec!["web01"]);
    }

    #[tokio::test]
    async fn test_metrics_scope_body() {
        let client = Client::new(
            Canned::default().with("/api/mon/index/metrics", json!({ "metrics": ["proc.num"] })),
            ApiVersion::V3,
        );
        let metrics = client
            .fetch_metrics(&Scope::Nids(vec!["12".to_string()]))
            .await
            .unwrap();
        assert_eq!(metrics, vec!["proc.num"]);

        let calls = client.transport.calls.lock().unwrap();
        assert_eq!(calls[0].2, Some(json!({ "nids": ["12"] })));
    }

    #[tokio::test]
    async fn test_tagkv_takes_first_entry() {
        let client = Client::new(
            Canned::default().with(
                "/api/index/tagkv",
                json!([{ "metric": "disk.used", "tagkv": [{ "tagk": "disk", "tagv": ["sda", "sdb"] }] }]),
            ),
            ApiVersion::V2,
        );
        let index = client
            .fetch_tagkv(&Scope::Endpoints(vec!["web01".to_string()]), &["disk.used".to_string()])
            .await
            .unwrap();
        assert_eq!(index.tagkv[0].tag_key, "disk");
        assert_eq!(index.tagkv[0].tag_values, vec!["sda", "sdb"]);
    }

    #[tokio::test]
    async fn test_counters_unwrap_list_on_v3() {
        let counters = json!([{ "endpoint": "web01", "counter": "cpu.idle" }]);
        let v2 = Client::new(
            Canned::default().with("/api/index/counter/fullmatch", counters.clone()),
            ApiVersion::V2,
        );
        let v3 = Client::new(
            Canned::default().with("/api/index/counter/fullmatch", json!({ "list": counters })),
            ApiVersion::V3,
        );
        assert_eq!(v2.fetch_counters(&[]).await.unwrap().len(), 1);
        assert_eq!(v3.fetch_counters(&[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_null_payload_is_empty() {
        let client = Client::new(
            Canned::default().with("/api/index/counter/fullmatch", Value::Null),
            ApiVersion::V2,
        );
        assert!(client.fetch_counters(&[]).await.unwrap().is_empty());
    }
}
