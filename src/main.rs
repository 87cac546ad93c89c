//! trajectory-memory CLI entry point.

use clap::Parser;

use trajectory_memory::cli::{self, commands, Cli, Commands};
use trajectory_memory::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let command = match cli.command {
        Commands::Init(args) => {
            // No project config exists yet; log with defaults.
            let _logger = LoggerImpl::init(&LogConfig::default());
            if let Err(err) = commands::init::execute(args, json).await {
                cli::handle_error(err, json);
            }
            return;
        }
        command => command,
    };

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, json),
    };
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(err, json),
    };

    let result = match command {
        Commands::Optimize(args) => commands::optimize::execute(args, &config, json).await,
        Commands::Curate(args) => commands::curate::execute(args, &config, json).await,
        Commands::Strategy(args) => commands::strategy::execute(args, &config, json).await,
        Commands::Trajectory(args) => commands::trajectory::execute(args, &config, json).await,
        Commands::Init(_) => Ok(()),
    };

    if let Err(err) = result {
        cli::handle_error(err, json);
    }
}
