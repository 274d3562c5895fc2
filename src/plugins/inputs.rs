//! Inputs compiled into the binary

use crate::metrics::{Accumulator, StatRegistry};
use crate::plugins::{decode_options, Input, PluginOptions, PluginRegistry};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::SystemTime;

const INTERNAL_SAMPLE_CONFIG: &str = r#"
# Prefix prepended to every reported measurement name
# prefix: internal_
"#;

pub fn register(registry: &mut PluginRegistry, stats: &StatRegistry) -> Result<()> {
    let stats = stats.clone();
    registry.register_input("internal", move || Box::new(Internal::new(stats.clone())))
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InternalSettings {
    prefix: String,
}

impl Default for InternalSettings {
    fn default() -> Self {
        Self {
            prefix: "internal_".to_string(),
        }
    }
}

/// Reports the agent's own stats as regular metrics.
pub struct Internal {
    stats: StatRegistry,
    settings: InternalSettings,
}

impl Internal {
    pub fn new(stats: StatRegistry) -> Self {
        Self {
            stats,
            settings: InternalSettings::default(),
        }
    }
}

#[async_trait]
impl Input for Internal {
    fn description(&self) -> &str {
        "Collect statistics about itself"
    }

    fn sample_config(&self) -> &str {
        INTERNAL_SAMPLE_CONFIG
    }

    fn configure(&mut self, options: &PluginOptions) -> anyhow::Result<()> {
        self.settings = decode_options(options)?;
        Ok(())
    }

    async fn gather(&mut self, acc: &mut Accumulator) -> anyhow::Result<()> {
        let now = SystemTime::now();
        for snapshot in self.stats.snapshot() {
            acc.add_metric(snapshot.to_metric(&self.settings.prefix, now));
        }
        Ok(())
    }
}
