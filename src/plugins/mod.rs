//! Plugin contracts and the registry plugins attach themselves to
//!
//! The registry is populated once at process start, before any configuration
//! is read, and is read-only afterwards. Input and output names live in
//! separate namespaces.

pub mod inputs;
pub mod outputs;

use crate::metrics::{Accumulator, Metric, StatRegistry};
use crate::{PulseError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Options table of one configured plugin instance.
pub type PluginOptions = serde_yaml::Mapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Input,
    Output,
}

impl PluginKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Input => "input",
            PluginKind::Output => "output",
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A metric source.
#[async_trait]
pub trait Input: Send + Sync {
    fn description(&self) -> &str;

    fn sample_config(&self) -> &str;

    fn configure(&mut self, options: &PluginOptions) -> anyhow::Result<()> {
        let _ = options;
        Ok(())
    }

    async fn gather(&mut self, acc: &mut Accumulator) -> anyhow::Result<()>;
}

/// A metric sink.
#[async_trait]
pub trait Output: Send + Sync {
    fn description(&self) -> &str;

    fn sample_config(&self) -> &str;

    fn configure(&mut self, options: &PluginOptions) -> anyhow::Result<()> {
        let _ = options;
        Ok(())
    }

    async fn connect(&mut self) -> anyhow::Result<()>;

    async fn write(&mut self, metrics: &[Metric]) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type InputFactory = Arc<dyn Fn() -> Box<dyn Input> + Send + Sync>;
pub type OutputFactory = Arc<dyn Fn() -> Box<dyn Output> + Send + Sync>;

/// Decode a plugin's options table into its own settings struct.
pub fn decode_options<T: DeserializeOwned>(options: &PluginOptions) -> anyhow::Result<T> {
    Ok(serde_yaml::from_value(serde_yaml::Value::Mapping(
        options.clone(),
    ))?)
}

/// Name → factory tables for inputs and outputs.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    inputs: BTreeMap<String, InputFactory>,
    outputs: BTreeMap<String, OutputFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_input<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Input> + Send + Sync + 'static,
    {
        if self.inputs.contains_key(name) {
            return Err(PulseError::DuplicatePlugin {
                kind: PluginKind::Input,
                name: name.to_string(),
            });
        }
        self.inputs.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn register_output<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Output> + Send + Sync + 'static,
    {
        if self.outputs.contains_key(name) {
            return Err(PulseError::DuplicatePlugin {
                kind: PluginKind::Output,
                name: name.to_string(),
            });
        }
        self.outputs.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    /// Registered names of `kind`, sorted.
    pub fn list(&self, kind: PluginKind) -> Vec<&str> {
        match kind {
            PluginKind::Input => self.inputs.keys().map(String::as_str).collect(),
            PluginKind::Output => self.outputs.keys().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, kind: PluginKind, name: &str) -> bool {
        match kind {
            PluginKind::Input => self.inputs.contains_key(name),
            PluginKind::Output => self.outputs.contains_key(name),
        }
    }

    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn lookup_input(&self, name: &str) -> Result<&InputFactory> {
        self.inputs.get(name).ok_or_else(|| PulseError::PluginNotFound {
            kind: PluginKind::Input,
            name: name.to_string(),
        })
    }

    pub fn lookup_output(&self, name: &str) -> Result<&OutputFactory> {
        self.outputs
            .get(name)
            .ok_or_else(|| PulseError::PluginNotFound {
                kind: PluginKind::Output,
                name: name.to_string(),
            })
    }

    /// Description and sample configuration of one plugin.
    pub fn usage(&self, kind: PluginKind, name: &str) -> Result<String> {
        let (description, sample) = match kind {
            PluginKind::Input => {
                let plugin = (self.lookup_input(name)?)();
                (
                    plugin.description().to_string(),
                    plugin.sample_config().to_string(),
                )
            }
            PluginKind::Output => {
                let plugin = (self.lookup_output(name)?)();
                (
                    plugin.description().to_string(),
                    plugin.sample_config().to_string(),
                )
            }
        };
        Ok(render_section(name, &description, &sample))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("inputs", &self.list(PluginKind::Input))
            .field("outputs", &self.list(PluginKind::Output))
            .finish()
    }
}

/// Render one plugin's sample as a YAML list entry with a description comment.
pub fn render_section(name: &str, description: &str, sample: &str) -> String {
    let mut out = format!("  # {}\n  - name: {}\n", description, name);
    for line in sample.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Register the plugins compiled into this binary.
pub fn register_builtin(registry: &mut PluginRegistry, stats: &StatRegistry) -> Result<()> {
    inputs::register(registry, stats)?;
    outputs::register(registry)?;
    Ok(())
}

/// A configured input instance.
pub struct RunningInput {
    pub name: String,
    pub plugin: Box<dyn Input>,
}

/// A configured output instance.
pub struct RunningOutput {
    pub name: String,
    pub plugin: Box<dyn Output>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NopInput;

    #[async_trait]
    impl Input for NopInput {
        fn description(&self) -> &str {
            "Does nothing"
        }

        fn sample_config(&self) -> &str {
            "# no options\n"
        }

        async fn gather(&mut self, _acc: &mut Accumulator) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NopOutput;

    #[async_trait]
    impl Output for NopOutput {
        fn description(&self) -> &str {
            "Drops everything"
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

    #[test]
    fn test_duplicate_name_rejected_per_kind() {
        let mut registry = PluginRegistry::new();
        registry
            .register_input("cpu", || Box::new(NopInput))
            .unwrap();

        let err = registry
            .register_input("cpu", || Box::new(NopInput))
            .unwrap_err();
        assert!(matches!(
            err,
            PulseError::DuplicatePlugin {
                kind: PluginKind::Input,
                ..
            }
        ));
        assert_eq!(registry.list(PluginKind::Input), vec!["cpu"]);
    }

    #[test]
    fn test_same_name_across_kinds() {
        let mut registry = PluginRegistry::new();
        registry
            .register_input("file", || Box::new(NopInput))
            .unwrap();
        registry
            .register_output("file", || Box::new(NopOutput))
            .unwrap();

        assert!(registry.contains(PluginKind::Input, "file"));
        assert!(registry.contains(PluginKind::Output, "file"));
    }

    #[test]
    fn test_lookup_not_found() {
        let registry = PluginRegistry::new();
        let err = registry.lookup_output("influxdb").err().unwrap();
        assert!(matches!(err, PulseError::PluginNotFound { .. }));
        assert!(err.to_string().contains("influxdb"));
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = PluginRegistry::new();
        registry.register_input("mem", || Box::new(NopInput)).unwrap();
        registry.register_input("cpu", || Box::new(NopInput)).unwrap();
        assert_eq!(registry.list(PluginKind::Input), vec!["cpu", "mem"]);
        assert!(registry.list(PluginKind::Output).is_empty());
    }

    #[test]
    fn test_usage_renders_description() {
        let mut registry = PluginRegistry::new();
        registry.register_input("nop", || Box::new(NopInput)).unwrap();

        let usage = registry.usage(PluginKind::Input, "nop").unwrap();
        assert!(usage.contains("# Does nothing"));
        assert!(usage.contains("- name: nop"));
        assert!(usage.contains("# no options"));
        assert!(registry.usage(PluginKind::Output, "nop").is_err());
    }

    #[test]
    fn test_decode_options() {
        #[derive(serde::Deserialize)]
        struct Settings {
            path: String,
        }

        let options: PluginOptions = serde_yaml::from_str("path: /tmp/out").unwrap();
        let settings: Settings = decode_options(&options).unwrap();
        assert_eq!(settings.path, "/tmp/out");
    }
}
