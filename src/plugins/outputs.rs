//! Outputs compiled into the binary

use crate::metrics::Metric;
use crate::plugins::{decode_options, Output, PluginOptions, PluginRegistry};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;

const STDOUT_SAMPLE_CONFIG: &str = r#"
# Data format to output, one of: influx, json
data_format: influx
"#;

pub fn register(registry: &mut PluginRegistry) -> Result<()> {
    registry.register_output("discard", || Box::new(Discard))?;
    registry.register_output("stdout", || Box::new(Stdout::default()))?;
    Ok(())
}

/// Accepts every metric and drops it.
pub struct Discard;

#[async_trait]
impl Output for Discard {
    fn description(&self) -> &str {
        "Send metrics to nowhere at all"
    }

    fn sample_config(&self) -> &str {
        ""
    }

    async fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn write(&mut self, _metrics: &[Metric]) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Influx,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StdoutSettings {
    data_format: DataFormat,
}

/// Prints metrics to standard output.
#[derive(Default)]
pub struct Stdout {
    settings: StdoutSettings,
}

impl Stdout {
    pub fn render(&self, metrics: &[Metric]) -> anyhow::Result<String> {
        let mut out = String::new();
        for metric in metrics {
            match self.settings.data_format {
                DataFormat::Influx => out.push_str(&metric.to_string()),
                DataFormat::Json => out.push_str(&serde_json::to_string(metric)?),
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[async_trait]
impl Output for Stdout {
    fn description(&self) -> &str {
        "Send metrics to stdout"
    }

    fn sample_config(&self) -> &str {
        STDOUT_SAMPLE_CONFIG
    }

    fn configure(&mut self, options: &PluginOptions) -> anyhow::Result<()> {
        self.settings = decode_options(options)?;
        Ok(())
    }

    async fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn write(&mut self, metrics: &[Metric]) -> anyhow::Result<()> {
        let rendered = self.render(metrics)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
