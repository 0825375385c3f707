//! A periodic, clock-driven input source for streaming dataflows.
//!
//! The source is split into partitions which are spread across workers. Each
//! [`PeriodicPartition`] owns a [`WakeClock`] and, every time the scheduler
//! activates it, emits one item and reports how late (or early) the
//! activation was. The pieces, leaves first:
//!
//! - [`WakeClock`] tracks the next planned activation and computes the
//!   [`Drift`] of the actual one. It is fixed-phase: each activation moves
//!   the target forward by exactly one period, so a partition that falls
//!   behind is never accelerated to catch up.
//! - [`PeriodicPartition`] implements the [`Partition`] scheduler contract.
//!   It reports drift to an injected [`MetricsSink`] as the
//!   `next_batch_delay_seconds` gauge, labeled by `step_id` and `partition`.
//! - [`PeriodicSource`] implements [`PartitionedSource`], building the
//!   partitions owned by one worker out of `worker_count`.
//!
//! The scheduler itself is not part of the core, but [`run_source`] and
//! [`PartitionDriver`] drive partitions on tokio, sending each activation's
//! [`Batch`] over an [`mpsc`] channel together with its tracing span.
//!
//! ```no_run
//! use periodic_source::{PeriodicSource, RecorderSink, run_source};
//! use std::{sync::Arc, time::Duration};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> periodic_source::Result<()> {
//! let source = PeriodicSource::new(Duration::from_secs(1), Arc::new(RecorderSink::new()))?;
//! let (tx, mut rx) = mpsc::channel(16);
//! let _jh = run_source(&source, "periodic", 2, tx)?;
//!
//! while let Some(batch) = rx.recv().await {
//!     batch.in_scope(|items| println!("{items:?}"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`init_tracing`] and [`init_metrics`] install a tracing subscriber and a
//! Prometheus exporter. These belong to the binary, not to library code, and
//! are used by the `periodic` demo.
//!
//! [`mpsc`]: tokio::sync::mpsc

mod batch;
pub use batch::Batch;

mod clock;
pub use clock::{Drift, WakeClock};

mod config;
pub use config::SourceConfig;

mod driver;
pub use driver::{PartitionDriver, run_source};

mod error;
pub use error::{Error, Result};

pub mod metrics;
pub use metrics::{MetricKind, MetricsSink, RecorderSink, init_metrics};

mod partition;
pub use partition::{CountingPartition, Partition, PeriodicPartition, Tick, sequence};

mod source;
pub use source::{PartitionedSource, PeriodicSource, assigned_partitions};

mod trace;
pub use trace::init_tracing;
