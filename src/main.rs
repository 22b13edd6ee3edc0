use clap::Parser;
use pressroom::cli::{self, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let config = match pressroom_config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        },
    };
    pressroom::logging::init(config.logging.format);
    match cli::run(args.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Exiting");
            ExitCode::FAILURE
        },
    }
}
