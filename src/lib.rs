//! Fleet-wide resource usage gathering: one sampling worker per monitored
//! host, nearest-rank percentile aggregation over the run, and budget
//! checking at the 99th percentile.

pub mod config;
pub mod error;
pub mod gather;
pub mod report;
pub mod source;
pub mod stats;
mod worker;
