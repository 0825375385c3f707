//! Metrics emission. Partitions report through the [`MetricsSink`] trait;
//! [`RecorderSink`] forwards to the [`metrics`] facade and [`init_metrics`]
//! installs a Prometheus exporter behind it.

use crate::{Error, Result};
use metrics::{Label, counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::LazyLock;

/// Drift between the planned and actual activation of a partition.
pub const NEXT_BATCH_DELAY: &str = "next_batch_delay_seconds";
const NEXT_BATCH_DELAY_DESC: &str =
    "Calculated delay of when next batch was called in seconds";

/// Label key carrying the step identity.
pub const STEP_ID_LABEL: &str = "step_id";

/// Label key carrying the partition identity.
pub const PARTITION_LABEL: &str = "partition";

static DESCRIBE: LazyLock<()> = LazyLock::new(|| {
    metrics::describe_gauge!(
        NEXT_BATCH_DELAY,
        metrics::Unit::Seconds,
        NEXT_BATCH_DELAY_DESC
    );
});

/// The kind of metric an observation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Set the current value.
    Gauge,
    /// Set the absolute value of a monotonic counter. Values must be finite
    /// and non-negative; the fractional part is dropped.
    Counter,
    /// Record one sample.
    Histogram,
}

/// Accepts labeled numeric observations.
///
/// Sinks are shared by every partition in the process, so implementations
/// must tolerate concurrent calls. Each partition writes under its own label
/// set and never reads back, so a plain "set" is all that is required.
pub trait MetricsSink: Send + Sync {
    /// Record `value` for metric `name` under `labels`.
    fn observe(
        &self,
        name: &str,
        kind: MetricKind,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<()>;
}

/// A [`MetricsSink`] backed by the globally installed [`metrics`] recorder.
///
/// Without a recorder installed (see [`init_metrics`]) observations are
/// silently dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderSink;

impl RecorderSink {
    /// Create a sink, describing the crate's metrics to the recorder.
    pub fn new() -> Self {
        LazyLock::force(&DESCRIBE);
        Self
    }
}

impl MetricsSink for RecorderSink {
    fn observe(
        &self,
        name: &str,
        kind: MetricKind,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<()> {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(key, value)| Label::new(key.to_string(), value.to_string()))
            .collect();
        let name = name.to_owned();

        match kind {
            MetricKind::Gauge => gauge!(name, labels).set(value),
            MetricKind::Counter => {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::MetricsEmission(format!(
                        "counter {name} cannot be set to {value}"
                    )));
                }
                counter!(name, labels).absolute(value as u64)
            }
            MetricKind::Histogram => histogram!(name, labels).record(value),
        }
        Ok(())
    }
}

/// Initialize a prometheus metrics exporter on the given port, or 9000 if
/// `None`. Returns the port.
///
/// Library code only ever talks to a [`MetricsSink`]; installing an exporter
/// is the binary's decision. This program records:
/// - `next_batch_delay_seconds` (gauge): how late (positive) or early
///   (negative) each partition's latest activation was, labeled by
///   `step_id` and `partition`.
///
/// Visit `http://localhost:9000/` while the demo runs to see the raw data in
/// the Prometheus exposition format.
///
/// # Panics
///
/// If the exporter cannot be installed, e.g. because the port is taken or a
/// recorder is already set.
pub fn init_metrics(port: Option<u16>) -> u16 {
    LazyLock::force(&DESCRIBE);
    let port = port.unwrap_or(9000);
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .expect("failed to install prometheus exporter");
    port
}
