use crate::models::{Aggregation, Counter, ExpandedCounter, TimeRange};

/// Consolidation function requested for every counter.
pub const CONSOL_FUNC: &str = "AVERAGE";

/// Per-query settings applied to each matched counter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandOptions {
    pub range: TimeRange,
    pub aggregation: Option<Aggregation>,
    pub group_by_keys: Vec<String>,
    pub comparison_offsets_ms: Vec<i64>,
}

/// Milliseconds to whole seconds, dropping the sub-second part.
pub fn ms_to_secs(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

/// Offsets to request from the backend, in seconds; the base series (`0`) always leads.
pub fn comparisons(offsets_ms: &[i64]) -> Vec<i64> {
    std::iter::once(0)
        .chain(offsets_ms.iter().copied().map(ms_to_secs))
        .collect()
}

/// Builds one series request per matched counter.
pub fn expand_counters(counters: &[Counter], options: &ExpandOptions) -> Vec<ExpandedCounter> {
    let start = ms_to_secs(options.range.from);
    let end = ms_to_secs(options.range.to);
    let comparisons = comparisons(&options.comparison_offsets_ms);

    counters
        .iter()
        .map(|counter| ExpandedCounter {
            counter: counter.clone(),
            start,
            end,
            aggr_func: options.aggregation,
            group_key: options.group_by_keys.clone(),
            consol_func: CONSOL_FUNC.to_string(),
            comparisons: comparisons.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn counter(endpoint: &str, name: &str) -> Counter {
        Counter {
            endpoint: Some(endpoint.to_string()),
            nid: None,
            counter: name.to_string(),
            step: Some(10),
            dstype: Some("GAUGE".to_string()),
            extra: Map::new(),
        }
    }

    fn options(offsets: Vec<i64>) -> ExpandOptions {
        ExpandOptions {
            range: TimeRange {
                from: 1_600_000_000_999,
                to: 1_600_003_600_001,
            },
            aggregation: Some(Aggregation::Avg),
            group_by_keys: vec!["disk".to_string()],
            comparison_offsets_ms: offsets,
        }
    }

    #[test]
    fn test_comparisons_always_start_with_base() {
        assert_eq!(comparisons(&[]), vec![0]);
        assert_eq!(comparisons(&[3_600_000, 86_400_000]), vec![0, 3600, 86400]);
    }

    #[test]
    fn test_timestamps_truncated_to_seconds() {
        assert_eq!(ms_to_secs(1_600_000_000_999), 1_600_000_000);
        assert_eq!(ms_to_secs(999), 0);
        assert_eq!(ms_to_secs(0), 0);
    }

    #[test]
    fn test_expand_counters() {
        let counters = vec![counter("web01", "cpu.idle"), counter("web02", "cpu.idle")];
        let expanded = expand_counters(&counters, &options(vec![3_600_000]));

        assert_eq!(expanded.len(), 2);
        for (item, source) in expanded.iter().zip(&counters) {
            assert_eq!(&item.counter, source);
            assert_eq!(item.start, 1_600_000_000);
            assert_eq!(item.end, 1_600_003_600);
            assert_eq!(item.consol_func, "AVERAGE");
            assert_eq!(item.comparisons, vec![0, 3600]);
        }
    }

    #[test]
    fn test_expanded_counter_wire_format() {
        let expanded = expand_counters(&[counter("web01", "cpu.idle")], &options(vec![]));
        let value = serde_json::to_value(&expanded[0]).unwrap();
        assert_eq!(
            value,
            json!({
                "endpoint": "web01",
                "counter": "cpu.idle",
                "step": 10,
                "dstype": "GAUGE",
                "start": 1_600_000_000,
                "end": 1_600_003_600,
                "aggrFunc": "avg",
                "groupKey": ["disk"],
                "consolFunc": "AVERAGE",
                "comparisons": [0]
            })
        );
    }
}
