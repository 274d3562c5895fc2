//! Configuration file loading
//!
//! The file is YAML. Plugin sections are lists of tables whose `name` picks
//! the registered plugin and whose remaining keys are handed to the plugin's
//! `configure` method.

use crate::plugins::{PluginKind, PluginOptions, PluginRegistry, RunningInput, RunningOutput};
use crate::{PulseError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub debug: bool,
    pub quiet: bool,
    pub logfile: Option<PathBuf>,
    pub hostname: String,
    pub omit_hostname: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            debug: false,
            quiet: false,
            logfile: None,
            hostname: String::new(),
            omit_hostname: false,
        }
    }
}

impl AgentSettings {
    /// Configured log file, with an empty path meaning stderr.
    pub fn logfile(&self) -> Option<&Path> {
        self.logfile
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct PluginSection {
    name: String,
    #[serde(flatten)]
    options: PluginOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    agent: AgentSettings,
    global_tags: BTreeMap<String, String>,
    inputs: Vec<PluginSection>,
    outputs: Vec<PluginSection>,
}

/// Restricts which plugins are loaded from the file and shown in samples.
#[derive(Debug, Clone, Default)]
pub struct PluginFilter {
    pub inputs: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
}

impl PluginFilter {
    /// Build from colon-separated lists, as given on the command line.
    pub fn from_args(inputs: Option<&str>, outputs: Option<&str>) -> Self {
        fn split(list: &str) -> Vec<String> {
            list.split(':')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        }

        Self {
            inputs: inputs.map(split),
            outputs: outputs.map(split),
        }
    }

    pub fn allows(&self, kind: PluginKind, name: &str) -> bool {
        let list = match kind {
            PluginKind::Input => &self.inputs,
            PluginKind::Output => &self.outputs,
        };
        list.as_ref()
            .map_or(true, |names| names.iter().any(|n| n == name))
    }
}

/// A validated-by-construction configuration snapshot for one reload cycle.
pub struct Config {
    pub agent: AgentSettings,
    pub tags: BTreeMap<String, String>,
    pub inputs: Vec<RunningInput>,
    pub outputs: Vec<RunningOutput>,
}

impl Config {
    pub fn load(path: &Path, plugins: &PluginRegistry, filter: &PluginFilter) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| PulseError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source, path, plugins, filter)
    }

    pub fn parse(
        source: &str,
        path: &Path,
        plugins: &PluginRegistry,
        filter: &PluginFilter,
    ) -> Result<Self> {
        let file: ConfigFile =
            serde_yaml::from_str(source).map_err(|e| PulseError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut tags = file.global_tags;
        if !file.agent.omit_hostname {
            let host = if file.agent.hostname.is_empty() {
                hostname::get()
                    .map(|h| h.to_string_lossy().to_string())
                    .unwrap_or_else(|_| "unknown".to_string())
            } else {
                file.agent.hostname.clone()
            };
            tags.entry("host".to_string()).or_insert(host);
        }

        let mut inputs = Vec::new();
        for section in file.inputs {
            if !filter.allows(PluginKind::Input, &section.name) {
                debug!("Skipping filtered input: {}", section.name);
                continue;
            }
            let mut plugin = (plugins.lookup_input(&section.name)?)();
            plugin
                .configure(&section.options)
                .map_err(|e| PulseError::PluginConfig {
                    kind: PluginKind::Input,
                    name: section.name.clone(),
                    message: e.to_string(),
                })?;
            inputs.push(RunningInput {
                name: section.name,
                plugin,
            });
        }

        let mut outputs = Vec::new();
        for section in file.outputs {
            if !filter.allows(PluginKind::Output, &section.name) {
                debug!("Skipping filtered output: {}", section.name);
                continue;
            }
            let mut plugin = (plugins.lookup_output(&section.name)?)();
            plugin
                .configure(&section.options)
                .map_err(|e| PulseError::PluginConfig {
                    kind: PluginKind::Output,
                    name: section.name.clone(),
                    message: e.to_string(),
                })?;
            outputs.push(RunningOutput {
                name: section.name,
                plugin,
            });
        }

        Ok(Self {
            agent: file.agent,
            tags,
            inputs,
            outputs,
        })
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name.as_str()).collect()
    }

    /// Enabled tags as `k=v` pairs separated by spaces, sorted by key.
    pub fn list_tags(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const AGENT_SAMPLE: &str = r#"# Pulse configuration

# Global tags added to every metric, e.g. {dc: us-east-1}
global_tags: {}

agent:
  # Default data collection interval for all inputs
  interval: 10s
  # Log at debug level
  debug: false
  # Log only error level messages
  quiet: false
  # Log file name, empty means stderr
  logfile: ""
  # Override default hostname, if empty use the system hostname
  hostname: ""
  # If set to true, do not set the "host" tag
  omit_hostname: false
"#;

/// Full sample configuration for every registered plugin the filter allows.
pub fn sample_config(plugins: &PluginRegistry, filter: &PluginFilter) -> String {
    let mut out = String::from(AGENT_SAMPLE);

    for (kind, key) in [(PluginKind::Output, "outputs"), (PluginKind::Input, "inputs")] {
        let sections: Vec<String> = plugins
            .list(kind)
            .into_iter()
            .filter(|name| filter.allows(kind, name))
            .filter_map(|name| plugins.usage(kind, name).ok())
            .collect();

        out.push_str(&format!("\n# {} plugins\n", kind));
        if sections.is_empty() {
            out.push_str(&format!("{}: []\n", key));
        } else {
            out.push_str(&format!("{}:\n", key));
            out.push_str(&sections.concat());
        }
    }

    out
}
