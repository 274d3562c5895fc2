use clap::Parser;
use pulse::cli::{commands, Cli};
use pulse::lifecycle::{Controller, OsSignals};
use pulse::logging::Logging;
use pulse::metrics::{AgentStats, StatRegistry};
use pulse::plugins::{register_builtin, PluginRegistry};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let logging = Logging::init(cli.debug, cli.quiet);

    let stats = StatRegistry::new();
    let mut plugins = PluginRegistry::new();
    let agent_stats = match register_builtin(&mut plugins, &stats)
        .and_then(|()| AgentStats::register(&stats))
    {
        Ok(agent_stats) => agent_stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let options = {
        let mut stdout = std::io::stdout().lock();
        commands::handle_command(&cli, &plugins, &mut stdout)
    };

    let options = match options {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let controller = Controller::new(options, Arc::new(plugins), agent_stats, OsSignals)
        .with_logging(logging);

    if let Err(e) = controller.run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
