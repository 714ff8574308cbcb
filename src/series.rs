use crate::models::{RawSeries, Series};

/// Comparison offsets (ms) offered by the editor, with their display labels.
pub const COMPARISON_LABELS: &[(i64, &str)] = &[
    (3_600_000, "1 hour"),
    (7_200_000, "2 hours"),
    (21_600_000, "6 hours"),
    (43_200_000, "12 hours"),
    (86_400_000, "1 day"),
    (172_800_000, "2 days"),
    (604_800_000, "7 days"),
];

/// Label for a comparison offset given in seconds, if it is one of the known offsets.
pub fn comparison_label(offset_secs: i64) -> Option<&'static str> {
    let offset_ms = offset_secs.checked_mul(1000)?;
    COMPARISON_LABELS
        .iter()
        .find(|(ms, _)| *ms == offset_ms)
        .map(|(_, label)| *label)
}

/// Display name: source plus counter, with an "ago" suffix for shifted duplicates.
pub fn series_name(item: &RawSeries, metric: &str, with_comparisons: bool) -> String {
    let source = item.endpoint.as_deref().filter(|e| !e.is_empty()).unwrap_or(metric);
    let mut name = format!("{} {}", source, item.counter);

    if with_comparisons && item.comparison != 0 {
        if let Some(label) = comparison_label(item.comparison) {
            name.push_str(&format!(" ({} ago)", label));
        }
    }
    name
}

/// Turns raw backend value sets into host series, dropping the empty ones.
pub fn assemble_series(items: &[RawSeries], metric: &str, comparison_offsets_ms: &[i64]) -> Vec<Series> {
    let with_comparisons = !comparison_offsets_ms.is_empty();

    items
        .iter()
        .filter(|item| !item.values.is_empty())
        .map(|item| Series {
            name: series_name(item, metric, with_comparisons),
            timestamps: item.values.iter().map(|s| s.timestamp.saturating_mul(1000)).collect(),
            values: item.values.iter().map(|s| s.value).collect(),
        })
        .collect()
}
