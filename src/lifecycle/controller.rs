//! The reload loop
//!
//! Each cycle loads the configuration, validates it, connects a fresh
//! [`Agent`], and runs it until the cycle's shutdown token fires. The cycle
//! repeats only if the signal router left "reload" in the slot.

use crate::agent::Agent;
use crate::config::{Config, PluginFilter};
use crate::lifecycle::{Intent, IntentSource, ReloadSlot, SignalRouter};
use crate::logging::Logging;
use crate::metrics::AgentStats;
use crate::pidfile::Pidfile;
use crate::plugins::PluginRegistry;
use crate::{display_version, PulseError, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Command-line settings that stay fixed across reloads.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub test: bool,
    pub debug: bool,
    pub quiet: bool,
    pub pidfile: Option<PathBuf>,
    pub filter: PluginFilter,
}

pub struct Controller<S: IntentSource> {
    options: RunOptions,
    plugins: Arc<PluginRegistry>,
    stats: AgentStats,
    signals: S,
    reload: Arc<ReloadSlot>,
    stop: CancellationToken,
    logging: Option<Logging>,
}

impl<S: IntentSource> Controller<S> {
    /// `stats` are the agent counters registered once at process start; every
    /// cycle's agent reports into them.
    pub fn new(
        options: RunOptions,
        plugins: Arc<PluginRegistry>,
        stats: AgentStats,
        signals: S,
    ) -> Self {
        Self {
            options,
            plugins,
            stats,
            signals,
            reload: Arc::new(ReloadSlot::new(true)),
            stop: CancellationToken::new(),
            logging: None,
        }
    }

    pub fn with_logging(mut self, logging: Logging) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Token that stops the current run and ends the loop when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run cycles until one ends without a reload request. Returns the number
    /// of cycles that reached the running state.
    ///
    /// Any error is fatal for the process. The pidfile guard is dropped on
    /// every return path, errors included.
    pub async fn run(&self) -> Result<usize> {
        let mut pidfile: Option<Pidfile> = None;
        let mut cycles = 0;

        while self.reload.take().await {
            self.reload.put(false).await;

            let config = self.load()?;
            self.validate(&config)?;

            let mut agent = Agent::new(config, self.stats.clone());
            self.apply_logging(agent.config());

            if self.options.test {
                let mut out = Vec::new();
                agent.test(&mut out).await?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&out)?;
                stdout.flush()?;
                return Ok(cycles + 1);
            }

            agent.connect().await?;

            if pidfile.is_none() {
                if let Some(path) = &self.options.pidfile {
                    pidfile = Some(Pidfile::acquire(path));
                }
            }

            info!("Starting Pulse {}", display_version());
            info!("Loaded outputs: {}", agent.config().output_names().join(" "));
            info!("Loaded inputs: {}", agent.config().input_names().join(" "));
            info!("Tags enabled: {}", agent.config().list_tags());

            let router = SignalRouter::new(self.reload.clone(), self.stop.clone());
            let shutdown = router.shutdown_token();
            let routing = router.arm(self.signals.subscribe()?);

            let result = agent.run(shutdown.clone()).await;
            shutdown.cancel();
            log_routing(routing.await);
            result?;

            cycles += 1;
        }

        drop(pidfile);
        Ok(cycles)
    }

    fn load(&self) -> Result<Config> {
        let path = self.options.config.as_deref().ok_or(PulseError::NoConfig)?;
        Config::load(path, &self.plugins, &self.options.filter)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        if !self.options.test && config.outputs.is_empty() {
            return Err(PulseError::NoOutputs);
        }
        if !self.plugins.has_inputs() {
            return Err(PulseError::NoInputs);
        }
        if config.agent.interval.is_zero() {
            return Err(PulseError::NonPositiveInterval(config.agent.interval));
        }
        Ok(())
    }

    fn apply_logging(&self, config: &Config) {
        if let Some(logging) = &self.logging {
            logging.apply(
                config.agent.debug || self.options.debug,
                config.agent.quiet || self.options.quiet,
                config.agent.logfile(),
            );
        }
    }
}

fn log_routing(outcome: std::result::Result<Option<Intent>, JoinError>) {
    match outcome {
        Ok(Some(intent)) => debug!("Run ended by {:?}", intent),
        Ok(None) => {}
        Err(e) => warn!("Signal router failed: {}", e),
    }
}
