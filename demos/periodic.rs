//! Emit a counter every period on each configured worker and print the
//! items to stdout.
//!
//! Configure through `PERIODIC_*` environment variables (see
//! [`SourceConfig`]), then watch `next_batch_delay_seconds` on
//! `http://localhost:9000/` while it runs.

use periodic_source::{RecorderSink, SourceConfig, init_metrics, init_tracing, run_source};
use std::sync::Arc;
use tokio::{select, sync::mpsc};
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config = SourceConfig::from_env()?;

    // Set up the tracing.
    let provider = init_tracing();
    // Set up a prometheus metrics exporter, on port 9000 unless configured
    let port = init_metrics(config.metrics_port);
    info!(port, step_id = %config.step_id, workers = config.workers, "starting periodic source");

    let source = config.source(Arc::new(RecorderSink::new()))?;

    let (tx, mut rx) = mpsc::channel(16);
    let jh = run_source(&source, &config.step_id, config.workers, tx)?;
    tokio::pin!(jh);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            _ = &mut jh => {
                info!("Source drivers exited");
                break;
            }
            Some(batch) = rx.recv() => {
                batch.in_scope(|items| {
                    for item in items {
                        println!("{item}");
                    }
                });
            },
        }
    }

    // Give the provider a chance to flush remaining spans to the collector.
    provider.shutdown().map_err(Into::into)
}
