//! Partitions of a periodic source. This module contains the [`Partition`]
//! capability trait and its [`PeriodicPartition`] implementation.

use crate::{
    Drift, WakeClock,
    metrics::{MetricKind, MetricsSink, NEXT_BATCH_DELAY, PARTITION_LABEL, STEP_ID_LABEL},
};
use std::{sync::Arc, time::Instant};
use tracing::{instrument, trace, warn};

/// Anything a scheduler can drive: it reports when it next wants to run,
/// and produces a batch when run.
pub trait Partition {
    /// The item type produced by each activation.
    type Item;

    /// The instant this partition next wants to be activated.
    fn next_activation(&self) -> Instant;

    /// Activate the partition at `now`, producing the next batch.
    fn produce(&mut self, now: Instant) -> Vec<Self::Item>;
}

/// Everything known about one activation, handed to the payload function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Sequence number of this activation, starting at 1.
    pub seq: u64,
    /// When the activation was planned.
    pub scheduled: Instant,
    /// When the activation actually happened.
    pub actual: Instant,
    /// `actual - scheduled`.
    pub drift: Drift,
}

/// The default payload: the sequence number itself.
pub fn sequence(tick: Tick) -> u64 {
    tick.seq
}

/// A partition that emits its sequence number on every activation.
pub type CountingPartition = PeriodicPartition<fn(Tick) -> u64>;

/// One worker's instance of a periodic source.
///
/// Every call to [`produce`] advances the partition's [`WakeClock`] by one
/// period, sets the `next_batch_delay_seconds` gauge to the observed drift,
/// and emits exactly one item built by the payload function.
///
/// [`produce`]: Partition::produce
pub struct PeriodicPartition<F = fn(Tick) -> u64> {
    clock: WakeClock,
    seq: u64,

    step_id: String,
    partition: String,

    sink: Arc<dyn MetricsSink>,
    payload: F,
}

impl<F> std::fmt::Debug for PeriodicPartition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicPartition")
            .field("clock", &self.clock)
            .field("seq", &self.seq)
            .field("step_id", &self.step_id)
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

impl<F> PeriodicPartition<F> {
    /// Create a partition driven by `clock`, identified by `step_id` and
    /// `partition` in its metric labels.
    pub fn new(
        clock: WakeClock,
        step_id: impl Into<String>,
        partition: impl Into<String>,
        sink: Arc<dyn MetricsSink>,
        payload: F,
    ) -> Self {
        Self {
            clock,
            seq: 0,
            step_id: step_id.into(),
            partition: partition.into(),
            sink,
            payload,
        }
    }

    /// The step identity label.
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// The partition identity label.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Number of batches produced so far.
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// The partition's clock.
    pub const fn clock(&self) -> &WakeClock {
        &self.clock
    }

    /// Report drift to the sink. Observability failures never stop the
    /// data flow, so errors are logged and dropped.
    fn report(&self, drift: Drift) {
        let labels = [
            (STEP_ID_LABEL, self.step_id.as_str()),
            (PARTITION_LABEL, self.partition.as_str()),
        ];
        let value = drift.as_secs_f64();
        if let Err(error) = self.sink.observe(NEXT_BATCH_DELAY, MetricKind::Gauge, &labels, value) {
            warn!(%error, "failed to record batch delay");
        }
    }
}

impl<F, T> Partition for PeriodicPartition<F>
where
    F: FnMut(Tick) -> T,
{
    type Item = T;

    fn next_activation(&self) -> Instant {
        self.clock.current_target()
    }

    #[instrument(
        skip_all,
        name = "Producing batch",
        fields(step_id = %self.step_id, partition = %self.partition, seq = tracing::field::Empty)
    )]
    fn produce(&mut self, now: Instant) -> Vec<T> {
        self.seq = self
            .seq
            .checked_add(1)
            .expect("partition sequence counter overflowed");
        tracing::Span::current().record("seq", self.seq);

        let scheduled = self.clock.current_target();
        let drift = self.clock.advance(now);
        trace!(drift_secs = drift.as_secs_f64(), "advanced wake clock");

        if drift.is_late() && drift.magnitude() > self.clock.period() {
            warn!(
                drift_secs = drift.as_secs_f64(),
                period_secs = self.clock.period().as_secs_f64(),
                "partition is falling behind schedule"
            );
        }
        self.report(drift);

        let tick = Tick {
            seq: self.seq,
            scheduled,
            actual: now,
            drift,
        };
        vec![(self.payload)(tick)]
    }
}
