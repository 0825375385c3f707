//! Tokio scheduler for partitions. This module contains the
//! [`PartitionDriver`] struct and [`run_source`].

use crate::{Batch, Error, Partition, PartitionedSource, Result};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{Instant, sleep_until},
};
use tracing::{debug, info_span, trace};

/// Drives one partition: sleeps until it is due, activates it, and sends
/// the batch to a channel.
pub struct PartitionDriver<P: Partition> {
    partition: P,
    step_id: String,
    worker_index: usize,

    outbound: mpsc::Sender<Batch<P::Item>>,
}

impl<P> PartitionDriver<P>
where
    P: Partition + Send + 'static,
    P::Item: Send + 'static,
{
    /// Create a driver for `partition`, owned by worker `worker_index`.
    pub fn new(
        partition: P,
        step_id: impl Into<String>,
        worker_index: usize,
        outbound: mpsc::Sender<Batch<P::Item>>,
    ) -> Self {
        Self {
            partition,
            step_id: step_id.into(),
            worker_index,
            outbound,
        }
    }

    /// The core loop. Runs until the outbound receiver is dropped.
    pub async fn run(mut self) {
        loop {
            let due = self.partition.next_activation();
            sleep_until(Instant::from_std(due)).await;

            // One span per activation, carried by the batch so consumers
            // can process it in context.
            let span = info_span!(
                "Activation",
                step_id = %self.step_id,
                worker = self.worker_index
            );
            let now = Instant::now().into_std();
            let items = span.in_scope(|| self.partition.produce(now));

            let batch = Batch::new(items, self.worker_index, span);
            if self.outbound.send(batch).await.is_err() {
                trace!(
                    step_id = %self.step_id,
                    worker = self.worker_index,
                    "Batch receiver dropped, exiting"
                );
                break;
            }
        }
    }

    /// Spawn the driver in a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Build the partitions of every worker in `0..worker_count` and drive each
/// of them in its own task, sending batches to `outbound`.
///
/// The returned handle resolves once all drivers have exited, which happens
/// when the receiving end of `outbound` is dropped. A panicking driver is a
/// broken scheduling invariant, and its panic is resumed on the returned
/// handle. Aborting the handle stops every driver.
pub fn run_source<S>(
    source: &S,
    step_id: &str,
    worker_count: usize,
    outbound: mpsc::Sender<Batch<<S::Partition as Partition>::Item>>,
) -> Result<JoinHandle<()>>
where
    S: PartitionedSource,
    S::Partition: Send + 'static,
    <S::Partition as Partition>::Item: Send + 'static,
{
    if worker_count == 0 {
        return Err(Error::InvalidConfiguration(
            "worker count must be at least 1".to_owned(),
        ));
    }

    let mut built = Vec::new();
    for worker_index in 0..worker_count {
        for partition in source.build(step_id, worker_index, worker_count)? {
            built.push((worker_index, partition));
        }
    }

    let mut drivers = JoinSet::new();
    for (worker_index, partition) in built {
        let driver = PartitionDriver::new(partition, step_id, worker_index, outbound.clone());
        drivers.spawn(driver.run());
    }
    debug!(step_id, worker_count, partitions = drivers.len(), "started partition drivers");

    Ok(tokio::spawn(async move {
        while let Some(res) = drivers.join_next().await {
            match res {
                Ok(()) => debug!("Partition driver exited"),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => debug!(%err, "Partition driver cancelled"),
            }
        }
    }))
}
