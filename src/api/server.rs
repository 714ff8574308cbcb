use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    client::Transport,
    config::Config,
    datasource::Datasource,
    metrics,
    models::{HealthCheck, QueryResponse, QuerySpec, Scope, TagkvIndex, TimeRange, TreeNode},
    template::VariableMap,
    DatasourceError, Result,
};

pub struct AppState<T> {
    pub datasource: Arc<Datasource<T>>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            datasource: self.datasource.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub range: TimeRange,
    pub targets: Vec<QuerySpec>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagkvRequest {
    #[serde(flatten)]
    pub scope: Scope,
    pub metrics: Vec<String>,
}

pub fn router<T: Transport + 'static>(datasource: Arc<Datasource<T>>) -> Router {
    Router::new()
        .route("/api/query", post(query::<T>))
        .route("/api/tree", get(tree::<T>))
        .route("/api/nodes/:nid/endpoints", get(endpoints::<T>))
        .route("/api/index/metrics", post(metric_names::<T>))
        .route("/api/index/tagkv", post(tagkv::<T>))
        .route("/api/health", get(health::<T>))
        .route("/metrics", get(prometheus_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState { datasource })
}

async fn query<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    info!(
        "Running {} targets over {}..{}",
        request.targets.len(),
        request.range.from,
        request.range.to
    );

    let variables = VariableMap::new(request.variables);
    let response = state
        .datasource
        .query(&request.targets, request.range, &variables)
        .await;
    Json(response)
}

async fn tree<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Result<Json<Vec<TreeNode>>> {
    Ok(Json(state.datasource.tree().await?))
}

async fn endpoints<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Path(nid): Path<i64>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.datasource.endpoints(nid).await?))
}

async fn metric_names<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Json(scope): Json<Scope>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.datasource.metric_names(&scope).await?))
}

async fn tagkv<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<TagkvRequest>,
) -> Result<Json<TagkvIndex>> {
    Ok(Json(
        state
            .datasource
            .tagkv(&request.scope, &request.metrics)
            .await?,
    ))
}

async fn health<T: Transport + 'static>(State(state): State<AppState<T>>) -> Json<HealthCheck> {
    Json(state.datasource.test_datasource().await)
}

async fn prometheus_metrics() -> Result<impl IntoResponse> {
    let body = metrics::render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

pub async fn start_server(config: Config) -> Result<()> {
    let datasource = Arc::new(Datasource::from_config(&config)?);
    let app = router(datasource);

    let addr = format!("0.0.0.0:{}", config.port);
    info!(
        "Starting datasource adapter on {} for backend {} ({:?})",
        addr, config.backend_url, config.version
    );

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        DatasourceError::Internal(format!("Failed to bind to address: {}", e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DatasourceError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
