//! Per-host sampling worker

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::source::{EntityId, MetricsSource, MonitoredHost};
use crate::stats::{EntityUsage, SampleSeries};

/// Owns one monitored host and its private time series. The series grows
/// only on this task and is handed back when the worker exits.
pub(crate) struct SampleWorker {
    host: MonitoredHost,
    names: Arc<HashMap<EntityId, String>>,
    source: Arc<dyn MetricsSource>,
    cancel: CancellationToken,
    period: Duration,
    probe_timeout: Duration,
    series: SampleSeries,
}

impl SampleWorker {
    pub(crate) fn new(
        host: MonitoredHost,
        names: Arc<HashMap<EntityId, String>>,
        source: Arc<dyn MetricsSource>,
        cancel: CancellationToken,
        period: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            host,
            names,
            source,
            cancel,
            period,
            probe_timeout,
            series: SampleSeries::new(),
        }
    }

    /// Probes the metrics source once. A failed or timed-out probe skips
    /// this cycle: nothing is appended and the loop continues at the next
    /// scheduled tick.
    async fn probe_once(&mut self) {
        let probe = self.source.probe(&self.host.name, &self.host.entity_ids);
        let usage = match timeout(self.probe_timeout, probe).await {
            Ok(Ok(usage)) => usage,
            Ok(Err(err)) => {
                warn!(host = %self.host.name, error = %err, "probe failed, skipping cycle");
                return;
            }
            Err(_) => {
                warn!(
                    host = %self.host.name,
                    timeout = ?self.probe_timeout,
                    "probe timed out, skipping cycle"
                );
                return;
            }
        };

        let mut cycle = EntityUsage::with_capacity(usage.len());
        for (id, sample) in usage {
            match self.names.get(&id) {
                Some(name) => {
                    cycle.insert(name.clone(), sample);
                }
                None => {
                    debug!(host = %self.host.name, entity = %id, "dropping sample for unknown entity");
                }
            }
        }
        self.series.push(cycle);
    }

    /// One guarded cycle: a panic out of the metrics source is logged and
    /// treated like any other failed probe, so the loop keeps running.
    async fn guarded_probe(&mut self) {
        let outcome = AssertUnwindSafe(self.probe_once()).catch_unwind().await;
        if let Err(panic) = outcome {
            error!(
                host = %self.host.name,
                "probe panicked, skipping cycle: {}",
                panic_message(panic.as_ref())
            );
        }
    }

    /// Waits out the staggered initial delay, then probes once per period
    /// until cancellation. Cancellation interrupts a pending wait
    /// immediately; the worker's series is returned to the coordinator.
    pub(crate) async fn gather(mut self, initial_delay: Duration) -> SampleSeries {
        tokio::select! {
            _ = sleep(initial_delay) => {}
            _ = self.cancel.cancelled() => return self.series,
        }
        self.guarded_probe().await;
        loop {
            tokio::select! {
                _ = sleep(self.period) => self.guarded_probe().await,
                _ = self.cancel.cancelled() => return self.series,
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}
