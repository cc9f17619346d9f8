use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use game_gateway::config::load_config;
use game_gateway::lifecycle::startup;
use game_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "game-gateway")]
#[command(about = "HTTP/WebSocket to gRPC gateway for game backends", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus environment when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("game-gateway: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "game-gateway starting");

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
