//! Nearest-rank percentile computation and per-worker summary merging

use std::collections::HashMap;

use crate::source::Sample;

/// Usage for one probe cycle, keyed by entity display name.
pub type EntityUsage = HashMap<String, Sample>;

/// Ordered probe results accumulated by one worker over a run.
pub type SampleSeries = Vec<EntityUsage>;

/// Usage at each requested percentile rank, keyed by rank then display name.
pub type PercentileSummary = HashMap<u8, EntityUsage>;

struct MetricSeries {
    cpu: Vec<f64>,
    mem_usage: Vec<u64>,
    mem_working_set: Vec<u64>,
}

impl MetricSeries {
    fn with_capacity(capacity: usize) -> Self {
        MetricSeries {
            cpu: Vec::with_capacity(capacity),
            mem_usage: Vec::with_capacity(capacity),
            mem_working_set: Vec::with_capacity(capacity),
        }
    }
}

/// Index of the nearest-rank element for `percentile` in a sorted array of
/// `n` observations: `max(0, ceil(n * p / 100) - 1)`.
fn rank_index(n: usize, percentile: u8) -> usize {
    debug_assert!(n > 0);
    let rank = (n as f64 * f64::from(percentile) / 100.0).ceil() as usize;
    rank.saturating_sub(1).min(n - 1)
}

/// Computes per-entity usage at each requested percentile rank from one
/// worker's time series.
///
/// Only real observations enter the per-entity arrays: an entity absent from
/// a cycle contributes nothing for that cycle, so arrays may differ in
/// length between entities but never contain placeholder values.
pub fn compute_percentiles(series: &SampleSeries, percentiles: &[u8]) -> PercentileSummary {
    if series.is_empty() {
        return PercentileSummary::new();
    }

    let mut by_entity: HashMap<&str, MetricSeries> = HashMap::new();
    for cycle in series {
        for (name, sample) in cycle {
            let metrics = by_entity
                .entry(name)
                .or_insert_with(|| MetricSeries::with_capacity(series.len()));
            metrics.cpu.push(sample.cpu_cores);
            metrics.mem_usage.push(sample.mem_usage_bytes);
            metrics.mem_working_set.push(sample.mem_working_set_bytes);
        }
    }
    for metrics in by_entity.values_mut() {
        metrics.cpu.sort_by(f64::total_cmp);
        metrics.mem_usage.sort_unstable();
        metrics.mem_working_set.sort_unstable();
    }

    let mut summary = PercentileSummary::with_capacity(percentiles.len());
    for &percentile in percentiles {
        let mut at_rank = EntityUsage::with_capacity(by_entity.len());
        for (name, metrics) in &by_entity {
            let idx = rank_index(metrics.cpu.len(), percentile);
            at_rank.insert(
                (*name).to_string(),
                Sample {
                    cpu_cores: metrics.cpu[idx],
                    mem_usage_bytes: metrics.mem_usage[idx],
                    mem_working_set_bytes: metrics.mem_working_set[idx],
                },
            );
        }
        summary.insert(percentile, at_rank);
    }
    summary
}

/// Folds `right` into `left`, rank by rank. Entity ids are partitioned by
/// host, so the per-rank union is lossless; on a colliding display name the
/// record from `right` wins.
pub fn merge_summaries(mut left: PercentileSummary, right: PercentileSummary) -> PercentileSummary {
    for (percentile, entities) in right {
        left.entry(percentile).or_default().extend(entities);
    }
    left
}
