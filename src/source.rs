//! Per-worker partition factories. This module contains the
//! [`PartitionedSource`] trait and the [`PeriodicSource`] factory.

use crate::{
    Error, Result, WakeClock,
    metrics::MetricsSink,
    partition::{Partition, PeriodicPartition, Tick, sequence},
};
use std::{
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

/// Builds the partitions a worker owns.
pub trait PartitionedSource {
    /// The partition type handed to the scheduler.
    type Partition: Partition;

    /// Build fresh partitions for worker `worker_index` of `worker_count`.
    fn build(
        &self,
        step_id: &str,
        worker_index: usize,
        worker_count: usize,
    ) -> Result<Vec<Self::Partition>>;
}

/// The partitions of `0..total` owned by `worker_index`, assigned by index
/// modulo `worker_count`.
///
/// Every partition has exactly one owner. Workers beyond `total` own none.
pub fn assigned_partitions(
    total: usize,
    worker_index: usize,
    worker_count: usize,
) -> Result<Vec<usize>> {
    check_worker(worker_index, worker_count)?;
    Ok((0..total)
        .filter(|partition| partition % worker_count == worker_index)
        .collect())
}

fn check_worker(worker_index: usize, worker_count: usize) -> Result<()> {
    if worker_count == 0 {
        return Err(Error::InvalidConfiguration(
            "worker count must be at least 1".to_owned(),
        ));
    }
    if worker_index >= worker_count {
        return Err(Error::InvalidConfiguration(format!(
            "worker index {worker_index} out of range for {worker_count} workers"
        )));
    }
    Ok(())
}

/// A clock-driven source, partitioned across workers.
///
/// By default each worker owns a single partition named after its worker
/// index. With [`with_partitions`] a fixed number of partitions is spread
/// over the workers by index modulo worker count.
///
/// [`with_partitions`]: PeriodicSource::with_partitions
pub struct PeriodicSource<F = fn(Tick) -> u64> {
    period: Duration,
    partitions: Option<NonZeroUsize>,
    sink: Arc<dyn MetricsSink>,
    payload: F,
}

impl<F> std::fmt::Debug for PeriodicSource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicSource")
            .field("period", &self.period)
            .field("partitions", &self.partitions)
            .finish_non_exhaustive()
    }
}

impl PeriodicSource {
    /// Create a source that emits a sequence number every `period`,
    /// reporting drift to `sink`.
    pub fn new(period: Duration, sink: Arc<dyn MetricsSink>) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::InvalidConfiguration(
                "source period must be strictly positive".to_owned(),
            ));
        }
        Ok(Self {
            period,
            partitions: None,
            sink,
            payload: sequence,
        })
    }
}

impl<F> PeriodicSource<F> {
    /// Spread `count` partitions over the workers instead of one per
    /// worker.
    pub fn with_partitions(mut self, count: usize) -> Result<Self> {
        let count = NonZeroUsize::new(count).ok_or_else(|| {
            Error::InvalidConfiguration("partition count must be at least 1".to_owned())
        })?;
        self.partitions = Some(count);
        Ok(self)
    }

    /// Replace the payload. Each partition receives its own clone of
    /// `payload`.
    pub fn with_payload<G, T>(self, payload: G) -> PeriodicSource<G>
    where
        G: FnMut(Tick) -> T + Clone,
    {
        PeriodicSource {
            period: self.period,
            partitions: self.partitions,
            sink: self.sink,
            payload,
        }
    }

    /// The activation period of every partition.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Like [`PartitionedSource::build`], with every clock starting at
    /// `start` instead of now.
    pub fn build_at(
        &self,
        step_id: &str,
        worker_index: usize,
        worker_count: usize,
        start: Instant,
    ) -> Result<Vec<PeriodicPartition<F>>>
    where
        F: Clone,
    {
        let owned = match self.partitions {
            Some(total) => assigned_partitions(total.get(), worker_index, worker_count)?,
            None => {
                check_worker(worker_index, worker_count)?;
                vec![worker_index]
            }
        };
        debug!(step_id, worker_index, worker_count, ?owned, "building partitions");

        owned
            .into_iter()
            .map(|partition| -> Result<PeriodicPartition<F>> {
                let clock = WakeClock::new(self.period, start)?;
                Ok(PeriodicPartition::new(
                    clock,
                    step_id,
                    partition.to_string(),
                    self.sink.clone(),
                    self.payload.clone(),
                ))
            })
            .collect()
    }
}

impl<F, T> PartitionedSource for PeriodicSource<F>
where
    F: FnMut(Tick) -> T + Clone,
{
    type Partition = PeriodicPartition<F>;

    fn build(
        &self,
        step_id: &str,
        worker_index: usize,
        worker_count: usize,
    ) -> Result<Vec<Self::Partition>> {
        self.build_at(step_id, worker_index, worker_count, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_utils::MemorySink;

    const SECOND: Duration = Duration::from_secs(1);

    fn source() -> PeriodicSource {
        PeriodicSource::new(SECOND, Arc::new(MemorySink::default())).unwrap()
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = PeriodicSource::new(Duration::ZERO, Arc::new(MemorySink::default())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn worker_bounds_are_checked() {
        let source = source();
        for (index, count) in [(0, 0), (2, 2), (5, 3)] {
            let err = source.build("periodic", index, count).unwrap_err();
            assert!(matches!(err, Error::InvalidConfiguration(_)), "{index}/{count}");
        }

        let source = source.with_partitions(4).unwrap();
        assert!(source.build("periodic", 1, 1).is_err());
    }

    #[test]
    fn zero_partitions_is_rejected() {
        assert!(matches!(
            source().with_partitions(0).unwrap_err(),
            Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn one_partition_per_worker_by_default() {
        let source = source();
        let start = Instant::now();
        for index in 0..3 {
            let partitions = source.build_at("periodic", index, 3, start).unwrap();
            assert_eq!(partitions.len(), 1);
            assert_eq!(partitions[0].partition(), index.to_string());
            assert_eq!(partitions[0].step_id(), "periodic");
            assert_eq!(partitions[0].next_activation(), start);
        }
    }

    #[test]
    fn modulo_assignment_covers_every_partition_once() {
        let mut seen: Vec<usize> = (0..3)
            .flat_map(|index| assigned_partitions(8, index, 3).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());

        assert_eq!(assigned_partitions(8, 1, 3).unwrap(), vec![1, 4, 7]);
        assert!(assigned_partitions(2, 3, 4).unwrap().is_empty());
    }

    #[test]
    fn workers_share_no_state() {
        let source = source();
        let start = Instant::now();
        let mut first = source.build_at("periodic", 0, 2, start).unwrap().remove(0);
        let second = source.build_at("periodic", 1, 2, start).unwrap().remove(0);

        first.produce(start + Duration::from_millis(10));
        first.produce(start + Duration::from_millis(1010));

        assert_eq!(first.seq(), 2);
        assert_eq!(first.next_activation(), start + 2 * SECOND);
        assert_eq!(second.seq(), 0);
        assert_eq!(second.next_activation(), start);
    }

    #[test]
    fn payload_is_cloned_into_each_partition() {
        let source = source()
            .with_partitions(2)
            .unwrap()
            .with_payload(|tick: Tick| format!("tick-{}", tick.seq));
        let start = Instant::now();
        let mut partitions = source.build_at("labels", 0, 1, start).unwrap();
        assert_eq!(partitions.len(), 2);

        assert_eq!(partitions[0].produce(start), vec!["tick-1".to_owned()]);
        assert_eq!(partitions[0].produce(start), vec!["tick-2".to_owned()]);
        assert_eq!(partitions[1].produce(start), vec!["tick-1".to_owned()]);
    }

    #[test]
    fn build_starts_clocks_now() {
        let before = Instant::now();
        let partitions = source().build("periodic", 0, 1).unwrap();
        assert!(partitions[0].next_activation() >= before);
        assert!(partitions[0].next_activation() <= Instant::now());
    }
}
