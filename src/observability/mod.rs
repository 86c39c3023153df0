// Observability: metrics. Logging setup lives in `crate::logging`, per-run
// diagnostics in `crate::diagnostics`.

pub mod metrics;

pub use metrics::{init, push, render, MetricName};
