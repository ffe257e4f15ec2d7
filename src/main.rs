//! Questline CLI entry point.

use clap::Parser;

use questline::cli::commands::{activity, badge, checkin, init, mission, referral, user};
use questline::cli::{handle_error, Cli, Commands};
use questline::infrastructure::config::ConfigLoader;
use questline::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => init::execute(args, cli.json).await,
        Commands::User(args) => user::execute(args, &config, cli.json).await,
        Commands::Checkin { user_id } => checkin::execute(user_id, &config, cli.json).await,
        Commands::Activity(args) => activity::execute(args, &config, cli.json).await,
        Commands::Mission(args) => mission::execute(args, &config, cli.json).await,
        Commands::Badge(args) => badge::execute(args, &config, cli.json).await,
        Commands::Referral(args) => referral::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
