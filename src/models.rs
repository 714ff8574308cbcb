use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a query addresses resolved endpoints or a node set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Category {
    #[default]
    HostBased,
    HostFree,
}

impl TryFrom<u8> for Category {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Category::HostBased),
            1 => Ok(Category::HostFree),
            other => Err(format!("unknown query category {}", other)),
        }
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> u8 {
        match category {
            Category::HostBased => 0,
            Category::HostFree => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Avg,
    Max,
    Min,
}

/// The full value universe of one tag key for a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagKv {
    #[serde(rename = "tagk")]
    pub tag_key: String,
    #[serde(rename = "tagv", default)]
    pub tag_values: Vec<String>,
}

/// A user's selection for one tag key: literal values or a single dynamic selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedTagKv {
    #[serde(rename = "tagk")]
    pub tag_key: String,
    #[serde(rename = "tagv", default)]
    pub selection: Vec<String>,
}

/// Closed time range in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

/// One logical query as authored in the dashboard editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub category: Category,
    pub node_ids: Vec<i64>,
    pub endpoint_selection: Vec<String>,
    pub metric: String,
    pub tag_selections: Vec<SelectedTagKv>,
    /// Tag universes for `metric`, keyed by tag key; fetched on demand when empty.
    pub tagkv: Vec<TagKv>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    pub group_by_keys: Vec<String>,
    pub comparison_offsets_ms: Vec<i64>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            ref_id: None,
            category: Category::HostBased,
            node_ids: Vec::new(),
            endpoint_selection: vec!["=all".to_string()],
            metric: String::new(),
            tag_selections: Vec::new(),
            tagkv: Vec::new(),
            aggregation: None,
            group_by_keys: Vec::new(),
            comparison_offsets_ms: Vec::new(),
        }
    }
}

/// Flat tree record as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub id: i64,
    pub pid: i64,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_char: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub record: TreeRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

impl From<TreeRecord> for TreeNode {
    fn from(record: TreeRecord) -> Self {
        TreeNode {
            record,
            children: None,
        }
    }
}

/// The addressed dimension of a backend index request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Endpoints(Vec<String>),
    Nids(Vec<String>),
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        match self {
            Scope::Endpoints(values) | Scope::Nids(values) => values.is_empty(),
        }
    }
}

/// Body of a counter full-match request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterQuery {
    #[serde(flatten)]
    pub scope: Scope,
    pub metric: String,
    pub tagkv: Vec<SelectedTagKv>,
}

/// A backend-addressable counter returned by the full-match index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<String>,
    pub counter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dstype: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A counter ready to be sent to the series endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedCounter {
    #[serde(flatten)]
    pub counter: Counter,
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggr_func: Option<Aggregation>,
    #[serde(default)]
    pub group_key: Vec<String>,
    pub consol_func: String,
    pub comparisons: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: Option<f64>,
}

/// One raw value set returned by the series endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub counter: String,
    /// Offset in seconds; zero for the base series.
    #[serde(default)]
    pub comparison: i64,
    #[serde(default)]
    pub values: Vec<Sample>,
}

/// Named, time-aligned series handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub timestamps: Vec<i64>,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagkvIndex {
    #[serde(default)]
    pub tagkv: Vec<TagKv>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<Series>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub message: String,
    pub timestamp: i64,
}
