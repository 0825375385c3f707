//! Runtime configuration, read from the environment.

use crate::{Error, MetricsSink, PeriodicSource, Result};
use std::{env, str::FromStr, sync::Arc, time::Duration};

const ENV_STEP_ID: &str = "PERIODIC_STEP_ID";
const ENV_PERIOD_MS: &str = "PERIODIC_PERIOD_MS";
const ENV_PARTITIONS: &str = "PERIODIC_PARTITIONS";
const ENV_WORKERS: &str = "PERIODIC_WORKERS";
const ENV_METRICS_PORT: &str = "PERIODIC_METRICS_PORT";

const DEFAULT_STEP_ID: &str = "periodic";
const DEFAULT_PERIOD_MS: u64 = 1000;
const DEFAULT_WORKERS: usize = 1;

/// Parameters of a periodic source deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Step identity, used as the `step_id` metric label.
    pub step_id: String,
    /// Time between activations of each partition.
    pub period: Duration,
    /// Total partition count. `None` means one partition per worker.
    pub partitions: Option<usize>,
    /// Number of workers to run.
    pub workers: usize,
    /// Prometheus exporter port. `None` uses the exporter default.
    pub metrics_port: Option<u16>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            step_id: DEFAULT_STEP_ID.to_owned(),
            period: Duration::from_millis(DEFAULT_PERIOD_MS),
            partitions: None,
            workers: DEFAULT_WORKERS,
            metrics_port: None,
        }
    }
}

impl SourceConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load the configuration through `lookup`, falling back to defaults for
    /// unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            step_id: lookup(ENV_STEP_ID).unwrap_or(defaults.step_id),
            period: parse::<u64>(&lookup, ENV_PERIOD_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.period),
            partitions: parse(&lookup, ENV_PARTITIONS)?,
            workers: parse(&lookup, ENV_WORKERS)?.unwrap_or(defaults.workers),
            metrics_port: parse(&lookup, ENV_METRICS_PORT)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the values for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(Error::InvalidConfiguration(
                "period must be strictly positive".to_owned(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfiguration(
                "worker count must be at least 1".to_owned(),
            ));
        }
        if self.partitions == Some(0) {
            return Err(Error::InvalidConfiguration(
                "partition count must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Build the counting source these settings describe.
    pub fn source(&self, sink: Arc<dyn MetricsSink>) -> Result<PeriodicSource> {
        let source = PeriodicSource::new(self.period, sink)?;
        match self.partitions {
            Some(count) => source.with_partitions(count),
            None => Ok(source),
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse().map_err(|e| {
                Error::InvalidConfiguration(format!("{key}={raw:?} is not valid: {e}"))
            })
        })
        .transpose()
}
