use chrono::Utc;
use tracing::{debug, info, warn};

use crate::client::{Client, HttpTransport, Transport};
use crate::config::Config;
use crate::counter::{expand_counters, ExpandOptions};
use crate::metrics;
use crate::models::{
    HealthCheck, HealthStatus, QueryResponse, QuerySpec, Scope, Series, TagkvIndex, TimeRange,
    TreeNode,
};
use crate::resolver::QueryResolver;
use crate::series::assemble_series;
use crate::template::TemplateSrv;
use crate::tree::{normalize_tree, RootInsertion};
use crate::Result;

/// The adapter as seen by the query-execution host.
pub struct Datasource<T> {
    client: Client<T>,
    root_insertion: RootInsertion,
}

impl Datasource<HttpTransport> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config.backend_url.clone(), config.timeout)?;
        Ok(Self::new(
            Client::new(transport, config.version),
            config.root_insertion,
        ))
    }
}

impl<T: Transport> Datasource<T> {
    pub fn new(client: Client<T>, root_insertion: RootInsertion) -> Self {
        Self {
            client,
            root_insertion,
        }
    }

    /// Runs every target in order and concatenates their series.
    ///
    /// A failing target contributes nothing and its error is reported
    /// alongside the series of the other targets.
    pub async fn query(
        &self,
        targets: &[QuerySpec],
        range: TimeRange,
        template: &dyn TemplateSrv,
    ) -> QueryResponse {
        metrics::record_query(targets.len());
        let mut response = QueryResponse::default();

        for (index, target) in targets.iter().enumerate() {
            match self.query_target(target, range, template).await {
                Ok(series) => {
                    debug!(index, series = series.len(), "target resolved");
                    response.data.extend(series);
                }
                Err(e) => {
                    warn!(index, "target failed: {}", e);
                    response.errors.push(e.to_string());
                }
            }
        }

        metrics::record_series(response.data.len());
        response
    }

    async fn query_target(
        &self,
        target: &QuerySpec,
        range: TimeRange,
        template: &dyn TemplateSrv,
    ) -> Result<Vec<Series>> {
        let resolver = QueryResolver::new(&self.client, template);
        let counter_query = match resolver.resolve(target).await? {
            Some(counter_query) => counter_query,
            None => return Ok(Vec::new()),
        };

        let counters = self.client.fetch_counters(&[counter_query]).await?;
        let options = ExpandOptions {
            range,
            aggregation: target.aggregation,
            group_by_keys: target.group_by_keys.clone(),
            comparison_offsets_ms: target.comparison_offsets_ms.clone(),
        };

        let mut raw = Vec::new();
        for counter in expand_counters(&counters, &options) {
            raw.extend(self.client.fetch_series(&counter).await?);
        }

        Ok(assemble_series(
            &raw,
            &target.metric,
            &target.comparison_offsets_ms,
        ))
    }

    /// The navigable node hierarchy.
    pub async fn tree(&self) -> Result<Vec<TreeNode>> {
        let records = self.client.fetch_tree().await?;
        let tree = normalize_tree(&records, self.root_insertion);
        debug!(records = records.len(), roots = tree.len(), "tree normalized");
        Ok(tree)
    }

    pub async fn endpoints(&self, nid: i64) -> Result<Vec<String>> {
        self.client.fetch_endpoints(nid).await
    }

    pub async fn metric_names(&self, scope: &Scope) -> Result<Vec<String>> {
        self.client.fetch_metrics(scope).await
    }

    pub async fn tagkv(&self, scope: &Scope, metrics: &[String]) -> Result<TagkvIndex> {
        self.client.fetch_tagkv(scope, metrics).await
    }

    /// Connectivity check against the tree endpoint.
    pub async fn test_datasource(&self) -> HealthCheck {
        let (status, message) = match self.client.fetch_tree().await {
            Ok(_) => (HealthStatus::Success, "Success".to_string()),
            Err(e) => (HealthStatus::Failure, e.to_string()),
        };
        info!(?status, "datasource health check");

        HealthCheck {
            status,
            message,
            timestamp: Utc::now().timestamp(),
        }
    }
}
