//! Per-cycle collection runtime
//!
//! An [`Agent`] owns one configuration snapshot. It gathers every input on
//! each interval tick and hands the result straight to every output until its
//! shutdown token is cancelled.

use crate::config::Config;
use crate::metrics::{Accumulator, AgentStats, Metric};
use crate::plugins::PluginKind;
use crate::{PulseError, Result};
use futures::future::join_all;
use std::io::Write;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Agent {
    config: Config,
    stats: AgentStats,
}

impl Agent {
    pub fn new(config: Config, stats: AgentStats) -> Self {
        Self { config, stats }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connect every configured output, stopping at the first failure.
    pub async fn connect(&mut self) -> Result<()> {
        for output in &mut self.config.outputs {
            debug!("Attempting connection to output: {}", output.name);
            output
                .plugin
                .connect()
                .await
                .map_err(|e| PulseError::OutputConnect {
                    name: output.name.clone(),
                    message: e.to_string(),
                })?;
            debug!("Successfully connected to output: {}", output.name);
        }
        Ok(())
    }

    /// Gather every input once, concurrently. Failing inputs are logged and
    /// counted; their metrics are discarded.
    pub async fn gather(&mut self) -> Vec<Metric> {
        let tags = &self.config.tags;
        let stats = &self.stats;

        let results = join_all(self.config.inputs.iter_mut().map(|input| async move {
            let mut acc =
                Accumulator::new(tags.clone()).with_counter(stats.metrics_gathered.clone());
            match input.plugin.gather(&mut acc).await {
                Ok(()) => acc.into_metrics(),
                Err(e) => {
                    stats.gather_errors.incr(1);
                    let err = PulseError::Plugin {
                        kind: PluginKind::Input,
                        name: input.name.clone(),
                        message: e.to_string(),
                    };
                    error!("{}", err);
                    Vec::new()
                }
            }
        }))
        .await;

        results.into_iter().flatten().collect()
    }

    /// Write a batch to every output. Each output's failure drops the batch
    /// for that output only.
    pub async fn write(&mut self, metrics: &[Metric]) {
        if metrics.is_empty() {
            return;
        }
        let count = metrics.len() as i64;

        for output in &mut self.config.outputs {
            match output.plugin.write(metrics).await {
                Ok(()) => self.stats.metrics_written.incr(count),
                Err(e) => {
                    self.stats.metrics_dropped.incr(count);
                    error!("Error writing to output [{}]: {}", output.name, e);
                }
            }
        }
    }

    /// Collect and write on every interval tick until `shutdown` fires, then
    /// close the outputs.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.config.agent.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Agent Config: Interval:{}, Quiet:{}, Hostname:{:?}",
            humantime::format_duration(self.config.agent.interval),
            self.config.agent.quiet,
            self.config.tags.get("host").map(String::as_str).unwrap_or("")
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutting down agent");
                    break;
                }
                _ = ticker.tick() => {
                    let metrics = self.gather().await;
                    debug!("Gathered {} metrics", metrics.len());
                    self.write(&metrics).await;
                }
            }
        }

        self.close().await;
        Ok(())
    }

    /// Gather once and print the metrics, for `--test`.
    pub async fn test<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let metrics = self.gather().await;
        for metric in &metrics {
            writeln!(out, "> {}", metric)?;
        }
        out.flush()?;
        Ok(())
    }

    pub async fn close(&mut self) {
        for output in &mut self.config.outputs {
            if let Err(e) = output.plugin.close().await {
                warn!("Error closing output [{}]: {}", output.name, e);
            }
        }
    }
}
