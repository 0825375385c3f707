use periodic_source::{
    Error, MetricKind, MetricsSink, Partition, PartitionedSource, PeriodicSource, Result, Tick,
    run_source,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::sync::mpsc;

/// Keeps the latest value per partition label, like a gauge backend.
#[derive(Default)]
struct LatestGauge {
    latest: Mutex<HashMap<String, f64>>,
}

impl MetricsSink for LatestGauge {
    fn observe(
        &self,
        name: &str,
        kind: MetricKind,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<()> {
        assert_eq!(name, "next_batch_delay_seconds");
        assert_eq!(kind, MetricKind::Gauge);
        let partition = labels
            .iter()
            .find(|(key, _)| *key == "partition")
            .map(|(_, value)| value.to_string())
            .ok_or_else(|| Error::MetricsEmission("missing partition label".to_owned()))?;
        self.latest.lock().unwrap().insert(partition, value);
        Ok(())
    }
}

#[test]
fn late_partition_keeps_its_phase() {
    let sink = Arc::new(LatestGauge::default());
    let source = PeriodicSource::new(Duration::from_millis(100), sink.clone()).unwrap();
    let t0 = Instant::now();
    let mut partition = source.build_at("phase", 0, 1, t0).unwrap().remove(0);

    // Half a second late, five activations in a row at the same instant.
    let now = t0 + Duration::from_millis(500);
    for _ in 0..5 {
        partition.produce(now);
    }
    assert_eq!(partition.next_activation(), t0 + Duration::from_millis(500));

    // The last of those was planned for t0 + 400ms, so it ran 100ms late.
    let latest = sink.latest.lock().unwrap()["0"];
    assert!((latest - 0.1).abs() < 1e-9);
}

#[test]
fn every_worker_builds_independently() {
    let source = PeriodicSource::new(Duration::from_secs(1), Arc::new(LatestGauge::default()))
        .unwrap()
        .with_partitions(5)
        .unwrap();

    let owned: Vec<Vec<String>> = (0..2)
        .map(|index| {
            source
                .build("independent", index, 2)
                .unwrap()
                .iter()
                .map(|p| p.partition().to_owned())
                .collect()
        })
        .collect();
    assert_eq!(owned, vec![vec!["0", "2", "4"], vec!["1", "3"]]);
}

#[tokio::test(start_paused = true)]
async fn drives_labeled_payloads_end_to_end() {
    let sink = Arc::new(LatestGauge::default());
    let source = PeriodicSource::new(Duration::from_millis(250), sink.clone())
        .unwrap()
        .with_payload(|tick: Tick| (tick.seq, tick.drift.as_secs_f64()));

    let (tx, mut rx) = mpsc::channel(8);
    let jh = run_source(&source, "end_to_end", 3, tx).unwrap();

    let mut seqs: HashMap<usize, Vec<u64>> = HashMap::new();
    while seqs.values().map(Vec::len).sum::<usize>() < 9 {
        let batch = rx.recv().await.unwrap();
        let worker = batch.worker_index();
        for (seq, _drift) in batch.into_items() {
            seqs.entry(worker).or_default().push(seq);
        }
    }

    for worker in 0..3 {
        let seen = &seqs[&worker];
        assert!(seen.windows(2).all(|w| w[1] == w[0] + 1), "{seen:?}");
        assert_eq!(seen[0], 1);
    }
    assert_eq!(sink.latest.lock().unwrap().len(), 3);

    drop(rx);
    jh.await.unwrap();
}
