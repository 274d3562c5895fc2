use crate::cli::{Cli, Commands};
use crate::config::{sample_config, PluginFilter};
use crate::lifecycle::RunOptions;
use crate::plugins::{PluginKind, PluginRegistry};
use crate::{display_version, PulseError, Result};
use std::io::Write;

/// Handle the commands and flags that print something and exit.
///
/// Returns the options for the reload loop when none of them applies.
pub fn handle_command<W: Write>(
    cli: &Cli,
    plugins: &PluginRegistry,
    out: &mut W,
) -> Result<Option<RunOptions>> {
    let filter = PluginFilter::from_args(cli.input_filter.as_deref(), cli.output_filter.as_deref());

    match cli.command {
        Some(Commands::Version) => {
            print_version(out)?;
            return Ok(None);
        }
        Some(Commands::Config) => {
            write!(out, "{}", sample_config(plugins, &filter))?;
            return Ok(None);
        }
        None => {}
    }

    if cli.output_list {
        print_plugin_list(plugins, PluginKind::Output, out)?;
    } else if cli.input_list {
        print_plugin_list(plugins, PluginKind::Input, out)?;
    } else if cli.version {
        print_version(out)?;
    } else if let Some(name) = &cli.usage {
        print_usage(plugins, name, out)?;
    } else {
        return Ok(Some(RunOptions {
            config: cli.config.clone(),
            test: cli.test,
            debug: cli.debug,
            quiet: cli.quiet,
            pidfile: cli.pidfile.clone(),
            filter,
        }));
    }

    Ok(None)
}

fn print_version<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "Pulse {}", display_version())?;
    Ok(())
}

pub fn print_plugin_list<W: Write>(
    plugins: &PluginRegistry,
    kind: PluginKind,
    out: &mut W,
) -> Result<()> {
    let title = match kind {
        PluginKind::Input => "Available Input Plugins:",
        PluginKind::Output => "Available Output Plugins:",
    };
    writeln!(out, "{}", title)?;
    for name in plugins.list(kind) {
        writeln!(out, "  {}", name)?;
    }
    Ok(())
}

/// Print usage for `name` from whichever registries know it. Only an unknown
/// name in both is an error.
pub fn print_usage<W: Write>(plugins: &PluginRegistry, name: &str, out: &mut W) -> Result<()> {
    let input = plugins.usage(PluginKind::Input, name);
    let output = plugins.usage(PluginKind::Output, name);

    match (input, output) {
        (Err(input_err), Err(output_err)) => Err(PulseError::UsageNotFound(
            Box::new(input_err),
            Box::new(output_err),
        )),
        (input, output) => {
            for usage in [input, output].into_iter().flatten() {
                write!(out, "{}", usage)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::StatRegistry;
    use clap::Parser;

    fn plugins() -> PluginRegistry {
        let mut plugins = PluginRegistry::new();
        crate::plugins::register_builtin(&mut plugins, &StatRegistry::new()).unwrap();
        plugins
    }

    fn run(args: &[&str]) -> (Result<Option<RunOptions>>, String) {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        let result = handle_command(&cli, &plugins(), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_version_command_and_flag() {
        let expected = format!("Pulse v{}\n", crate::VERSION);

        let (result, out) = run(&["pulse", "version"]);
        assert!(result.unwrap().is_none());
        assert_eq!(out, expected);

        let (result, out) = run(&["pulse", "--version"]);
        assert!(result.unwrap().is_none());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_output_list() {
        let (result, out) = run(&["pulse", "--output-list"]);
        assert!(result.unwrap().is_none());
        assert_eq!(out, "Available Output Plugins:\n  discard\n  stdout\n");
    }

    #[test]
    fn test_usage_unknown_in_both() {
        let (result, out) = run(&["pulse", "--usage", "doesnotexist"]);
        let err = result.unwrap_err();
        assert!(matches!(err, PulseError::UsageNotFound(..)));
        assert!(err.to_string().contains("input: doesnotexist"));
        assert!(err.to_string().contains("output: doesnotexist"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_usage_found_as_output_only() {
        let (result, out) = run(&["pulse", "--usage", "stdout"]);
        assert!(result.unwrap().is_none());
        assert!(out.contains("# Send metrics to stdout"));
        assert!(out.contains("data_format: influx"));
    }

    struct Fake(&'static str);

    #[async_trait::async_trait]
    impl crate::plugins::Input for Fake {
        fn description(&self) -> &str {
            self.0
        }

        fn sample_config(&self) -> &str {
            "percpu: true\n"
        }

        async fn gather(&mut self, _acc: &mut crate::metrics::Accumulator) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn system_plugins() -> PluginRegistry {
        let mut plugins = PluginRegistry::new();
        plugins
            .register_input("mem", || Box::new(Fake("Read metrics about memory usage")))
            .unwrap();
        plugins
            .register_input("cpu", || Box::new(Fake("Read metrics about cpu usage")))
            .unwrap();
        plugins
    }

    #[test]
    fn test_input_list_without_config() {
        let cli = Cli::try_parse_from(["pulse", "--input-list", "--config", "/missing.yaml"])
            .unwrap();
        let mut out = Vec::new();
        let result = handle_command(&cli, &system_plugins(), &mut out).unwrap();

        assert!(result.is_none());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Available Input Plugins:\n  cpu\n  mem\n"
        );
    }

    #[test]
    fn test_usage_found_as_input_only() {
        let mut out = Vec::new();
        print_usage(&system_plugins(), "cpu", &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("# Read metrics about cpu usage"));
        assert!(out.contains("- name: cpu"));
        assert!(out.contains("percpu: true"));
    }

    #[test]
    fn test_sample_config_command() {
        let (result, out) = run(&["pulse", "--input-filter", "internal", "config"]);
        assert!(result.unwrap().is_none());
        assert!(out.contains("agent:"));
        assert!(out.contains("- name: internal"));
    }

    #[test]
    fn test_run_options_passed_through() {
        let (result, out) = run(&[
            "pulse",
            "--config",
            "pulse.yaml",
            "--quiet",
            "--test",
            "--output-filter",
            "stdout:discard",
        ]);
        let options = result.unwrap().unwrap();
        assert!(out.is_empty());
        assert!(options.test);
        assert!(options.quiet);
        assert!(!options.debug);
        assert_eq!(options.config.unwrap().to_str(), Some("pulse.yaml"));
        assert_eq!(
            options.filter.outputs,
            Some(vec!["stdout".to_string(), "discard".to_string()])
        );
        assert!(options.filter.inputs.is_none());
    }
}
