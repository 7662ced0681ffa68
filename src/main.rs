mod cli;

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::error;

use price_snapshot::config::{load_config, Config};
use price_snapshot::{app, AppError};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(err) => {
                error!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::builtin(),
    };
    cli.apply(&mut config);

    match app::run(config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(AppError::EmptyUniverse) => {
            error!("No symbol list available, aborting");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
