//! Statistics for relay sessions

pub mod metrics;

pub use metrics::{ProducerStats, RelayCounters, RelayStats};
