//! Gatherer coordinator: owns the workers, the shared entity-identity map,
//! and the cancellation signal

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::GatherConfig;
use crate::error::DiscoveryError;
use crate::report::{evaluate_constraints, ResourceConstraint, UsageReport, UsageSummary};
use crate::source::{Discovery, EntityId, MetricsSource};
use crate::stats::{compute_percentiles, merge_summaries, PercentileSummary, SampleSeries};
use crate::worker::SampleWorker;

/// Rank constraints are evaluated at, when requested.
const CONSTRAINT_PERCENTILE: u8 = 99;

/// Coordinates one sampling run: builds one worker per discovered host,
/// starts them staggered, and on stop drains every series into a single
/// percentile summary with constraint violations.
pub struct UsageGatherer {
    cancel: CancellationToken,
    period: Duration,
    workers: Mutex<Vec<SampleWorker>>,
    handles: Mutex<Vec<JoinHandle<SampleSeries>>>,
}

impl UsageGatherer {
    /// Discovers the fleet, builds the shared entity-identity map, and
    /// creates one worker per host. Discovery failures are fatal: nothing
    /// has been started yet.
    pub async fn new(
        source: Arc<dyn MetricsSource>,
        discovery: &dyn Discovery,
        config: &GatherConfig,
    ) -> Result<Self, DiscoveryError> {
        let hosts = discovery.list_hosts().await?;

        let mut names: HashMap<EntityId, String> = HashMap::new();
        for host in &hosts {
            for (id, display_name) in discovery.list_entities(&host.name).await? {
                names.insert(id, display_name);
            }
        }
        info!(hosts = hosts.len(), entities = names.len(), "fleet discovered");

        let names = Arc::new(names);
        let cancel = CancellationToken::new();
        let period = config.period();
        let probe_timeout = config.probe_timeout();
        let workers = hosts
            .into_iter()
            .map(|host| {
                SampleWorker::new(
                    host,
                    Arc::clone(&names),
                    Arc::clone(&source),
                    cancel.clone(),
                    period,
                    probe_timeout,
                )
            })
            .collect();

        Ok(Self {
            cancel,
            period,
            workers: Mutex::new(workers),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Launches every worker concurrently, with initial delays spaced evenly
    /// across one sampling period, then parks until a stop is requested from
    /// elsewhere. The running state is exactly the set of live workers.
    pub async fn start(&self) {
        let workers: Vec<SampleWorker> = {
            let mut pending = self.workers.lock().unwrap();
            pending.drain(..).collect()
        };

        if !workers.is_empty() {
            let count = workers.len() as u32;
            let stagger = self.period / count;
            let handles: Vec<JoinHandle<SampleSeries>> = workers
                .into_iter()
                .enumerate()
                .map(|(i, worker)| tokio::spawn(worker.gather(stagger * i as u32)))
                .collect();
            info!(workers = count, period = ?self.period, "sampling workers started");
            self.handles.lock().unwrap().extend(handles);
        }

        self.cancel.cancelled().await;
    }

    /// Broadcasts cancellation to every worker at once, waits for each one
    /// to exit its loop, then computes per-worker percentiles, merges them
    /// fleet-wide, orders entities by display name, and evaluates
    /// constraints at the 99th percentile.
    pub async fn stop_and_summarize(
        &self,
        percentiles: &[u8],
        constraints: &HashMap<String, ResourceConstraint>,
    ) -> UsageReport {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<SampleSeries>> = {
            let mut running = self.handles.lock().unwrap();
            running.drain(..).collect()
        };
        info!(workers = handles.len(), "stop requested, draining workers");

        let mut series: Vec<SampleSeries> = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(worker_series) => series.push(worker_series),
                Err(err) if err.is_panic() => {
                    error!("worker panicked, dropping its samples: {err}");
                }
                Err(err) => {
                    error!("worker task failed: {err}");
                }
            }
        }

        if percentiles.is_empty() {
            warn!("empty percentile list requested, returning an empty summary");
            return UsageReport::default();
        }

        let mut merged = PercentileSummary::new();
        for worker_series in &series {
            merged = merge_summaries(merged, compute_percentiles(worker_series, percentiles));
        }

        let summary = UsageSummary::from_merged(&merged, percentiles);
        let violations = merged
            .get(&CONSTRAINT_PERCENTILE)
            .map(|at_p99| evaluate_constraints(at_p99, constraints))
            .unwrap_or_default();

        UsageReport {
            summary,
            violations,
        }
    }
}
