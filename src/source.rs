//! Data model and the external collaborator seams

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, ProbeError};

/// Stable identifier for a measured entity (e.g. a container id).
pub type EntityId = String;

/// One point-in-time usage reading for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub cpu_cores: f64,
    pub mem_usage_bytes: u64,
    pub mem_working_set_bytes: u64,
}

/// A machine that hosts entities and exposes usage snapshots. Immutable
/// after discovery; entity ids are never shared between two hosts.
#[derive(Debug, Clone)]
pub struct MonitoredHost {
    pub name: String,
    pub entity_ids: Vec<EntityId>,
}

/// Point-in-time usage snapshots keyed by entity id.
pub type UsageById = HashMap<EntityId, Sample>;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Returns one usage snapshot per entity currently observable on `host`.
    /// An entity missing from the result simply contributes no reading for
    /// this cycle.
    async fn probe(&self, host: &str, entity_ids: &[EntityId]) -> Result<UsageById, ProbeError>;
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Lists the monitored hosts and the entity ids each one carries.
    async fn list_hosts(&self) -> Result<Vec<MonitoredHost>, DiscoveryError>;

    /// Lists `(entity id, display name)` pairs for one host. Display names
    /// follow the `<owner>/<component>` convention.
    async fn list_entities(&self, host: &str)
        -> Result<Vec<(EntityId, String)>, DiscoveryError>;
}
