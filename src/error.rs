//! Error taxonomy: fatal discovery failures, transient probe failures

use thiserror::Error;

/// Boxed source error supplied by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Raised while discovering the fleet during gatherer construction.
/// Fatal: construction aborts and no worker is started.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list monitored hosts")]
    ListHosts(#[source] BoxError),
    #[error("failed to list entities on host {host}")]
    ListEntities {
        host: String,
        #[source]
        source: BoxError,
    },
}

/// Raised by a single probe against the metrics source. Transient: the
/// affected sampling cycle is skipped and the worker keeps running.
#[derive(Debug, Error)]
#[error("probe of host {host} failed")]
pub struct ProbeError {
    pub host: String,
    #[source]
    pub source: BoxError,
}

impl ProbeError {
    pub fn new(host: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            host: host.into(),
            source: source.into(),
        }
    }
}
