//! Summary model, constraint evaluation, and report rendering

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use prettytable::{format, row, Table};
use serde::{Deserialize, Serialize};

use crate::stats::{EntityUsage, PercentileSummary};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Upper bounds for one component, checked at the 99th percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstraint {
    pub cpu_limit_cores: f64,
    pub mem_limit_bytes: u64,
}

/// Usage of one entity at one percentile rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,
    pub cpu_cores: f64,
    pub mem_usage_bytes: u64,
    pub mem_working_set_bytes: u64,
}

/// Final fleet-wide summary: percentile rank to entity records, ordered
/// lexicographically by display name within each rank. Serializes with the
/// rank as a text key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageSummary(pub BTreeMap<u8, Vec<EntitySummary>>);

impl UsageSummary {
    /// Builds the ordered summary from merged per-worker percentile data.
    /// Every requested rank carries the same entity set, so the name order
    /// is taken from the first rank.
    pub fn from_merged(merged: &PercentileSummary, percentiles: &[u8]) -> Self {
        let mut names: Vec<&String> = percentiles
            .first()
            .and_then(|rank| merged.get(rank))
            .map(|entities| entities.keys().collect())
            .unwrap_or_default();
        names.sort();

        let mut ranks = BTreeMap::new();
        for &percentile in percentiles {
            let Some(at_rank) = merged.get(&percentile) else {
                continue;
            };
            let entries = names
                .iter()
                .filter_map(|name| {
                    at_rank.get(*name).map(|usage| EntitySummary {
                        name: (*name).clone(),
                        cpu_cores: usage.cpu_cores,
                        mem_usage_bytes: usage.mem_usage_bytes,
                        mem_working_set_bytes: usage.mem_working_set_bytes,
                    })
                })
                .collect();
            ranks.insert(percentile, entries);
        }
        UsageSummary(ranks)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders one table block per percentile with columns
    /// entity / cpu(cores) / memory(MB); memory is the working set.
    pub fn to_text_table(&self) -> String {
        let mut out = String::new();
        for (percentile, entities) in &self.0 {
            out.push_str(&format!("{percentile} percentile:\n"));
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_CLEAN);
            table.set_titles(row!["entity", "cpu(cores)", "memory(MB)"]);
            for entity in entities {
                table.add_row(row![
                    entity.name,
                    format!("{:.3}", entity.cpu_cores),
                    format!("{:.2}", entity.mem_working_set_bytes as f64 / BYTES_PER_MB),
                ]);
            }
            out.push_str(&table.to_string());
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The metric a violation was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Cpu,
    MemoryWorkingSet,
}

/// One budget breach at the 99th percentile. `observed` and `limit` are in
/// cores for CPU and bytes for memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub entity: String,
    pub metric: MetricKind,
    pub observed: f64,
    pub limit: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.metric {
            MetricKind::Cpu => write!(
                f,
                "entity {} is using {}/{} CPU",
                self.entity, self.observed, self.limit
            ),
            MetricKind::MemoryWorkingSet => write!(
                f,
                "entity {} is using {}/{} MB of memory",
                self.entity,
                self.observed / BYTES_PER_MB,
                self.limit / BYTES_PER_MB
            ),
        }
    }
}

/// Everything a stopped run reports: the ordered summary plus any
/// constraint violations observed at the 99th percentile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub summary: UsageSummary,
    pub violations: Vec<Violation>,
}

impl UsageReport {
    /// Human-readable breach descriptions, in entity order; empty means
    /// every budget held.
    pub fn violation_messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Checks 99th-percentile usage against per-component budgets. CPU and
/// working-set memory are checked independently, so one entity can produce
/// two violations. Constraints are keyed by the component part of the
/// display name; a name without a `/` separator matches nothing.
pub fn evaluate_constraints(
    at_p99: &EntityUsage,
    constraints: &HashMap<String, ResourceConstraint>,
) -> Vec<Violation> {
    let mut names: Vec<&String> = at_p99.keys().collect();
    names.sort();

    let mut violations = Vec::new();
    for name in names {
        let Some((_owner, component)) = name.split_once('/') else {
            continue;
        };
        let Some(constraint) = constraints.get(component) else {
            continue;
        };
        let usage = &at_p99[name];
        if usage.cpu_cores > constraint.cpu_limit_cores {
            violations.push(Violation {
                entity: name.clone(),
                metric: MetricKind::Cpu,
                observed: usage.cpu_cores,
                limit: constraint.cpu_limit_cores,
            });
        }
        if usage.mem_working_set_bytes > constraint.mem_limit_bytes {
            violations.push(Violation {
                entity: name.clone(),
                metric: MetricKind::MemoryWorkingSet,
                observed: usage.mem_working_set_bytes as f64,
                limit: constraint.mem_limit_bytes as f64,
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Sample;

    fn usage(name: &str, cpu: f64, working_set: u64) -> EntityUsage {
        let mut map = EntityUsage::new();
        map.insert(
            name.to_string(),
            Sample {
                cpu_cores: cpu,
                mem_usage_bytes: working_set * 2,
                mem_working_set_bytes: working_set,
            },
        );
        map
    }

    fn constraint(component: &str, cpu: f64, mem: u64) -> HashMap<String, ResourceConstraint> {
        let mut map = HashMap::new();
        map.insert(
            component.to_string(),
            ResourceConstraint {
                cpu_limit_cores: cpu,
                mem_limit_bytes: mem,
            },
        );
        map
    }

    #[test]
    fn test_cpu_and_memory_checked_independently() {
        let at_p99 = usage("kube/apiserver", 0.9, 300);
        let violations = evaluate_constraints(&at_p99, &constraint("apiserver", 0.3, 100));

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].metric, MetricKind::Cpu);
        assert_eq!(violations[0].observed, 0.9);
        assert_eq!(violations[0].limit, 0.3);
        assert_eq!(violations[1].metric, MetricKind::MemoryWorkingSet);
        assert_eq!(violations[1].observed, 300.0);
    }

    #[test]
    fn test_usage_within_budget_passes() {
        let at_p99 = usage("kube/apiserver", 0.2, 50);
        let violations = evaluate_constraints(&at_p99, &constraint("apiserver", 0.3, 100));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_unconstrained_entity_ignored() {
        let at_p99 = usage("kube/scheduler", 5.0, 5000);
        let violations = evaluate_constraints(&at_p99, &constraint("apiserver", 0.3, 100));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_name_without_separator_matches_nothing() {
        let at_p99 = usage("standalone", 5.0, 5000);
        let violations = evaluate_constraints(&at_p99, &constraint("standalone", 0.3, 100));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_violation_messages() {
        let cpu = Violation {
            entity: "kube/apiserver".to_string(),
            metric: MetricKind::Cpu,
            observed: 0.9,
            limit: 0.3,
        };
        assert_eq!(cpu.to_string(), "entity kube/apiserver is using 0.9/0.3 CPU");

        let mem = Violation {
            entity: "kube/apiserver".to_string(),
            metric: MetricKind::MemoryWorkingSet,
            observed: 3.0 * BYTES_PER_MB,
            limit: 1.0 * BYTES_PER_MB,
        };
        assert_eq!(
            mem.to_string(),
            "entity kube/apiserver is using 3/1 MB of memory"
        );

        let report = UsageReport {
            summary: UsageSummary::default(),
            violations: vec![cpu, mem],
        };
        assert_eq!(report.violation_messages().len(), 2);
    }

    #[test]
    fn test_summary_ordering_and_rendering() {
        let mut merged = PercentileSummary::new();
        let mut at_rank = usage("b/second", 0.5, 2 * 1024 * 1024);
        at_rank.extend(usage("a/first", 0.25, 1024 * 1024));
        merged.insert(90, at_rank);

        let summary = UsageSummary::from_merged(&merged, &[90]);
        let entities = &summary.0[&90];
        assert_eq!(entities[0].name, "a/first");
        assert_eq!(entities[1].name, "b/second");

        let text = summary.to_text_table();
        assert!(text.contains("90 percentile:"));
        assert!(text.contains("cpu(cores)"));
        assert!(text.contains("0.250"));
        assert!(text.contains("2.00"));
    }

    #[test]
    fn test_summary_json_uses_text_keys() {
        let mut merged = PercentileSummary::new();
        merged.insert(99, usage("a/first", 0.1, 1024));
        let summary = UsageSummary::from_merged(&merged, &[99]);

        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entities = value.get("99").unwrap().as_array().unwrap();
        assert_eq!(entities[0]["name"], "a/first");
        assert_eq!(entities[0]["mem_working_set_bytes"], 1024);
    }

    #[test]
    fn test_empty_merge_produces_empty_summary() {
        let summary = UsageSummary::from_merged(&PercentileSummary::new(), &[50, 99]);
        assert!(summary.is_empty());
    }
}
