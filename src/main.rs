use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, info};

use bookshelf_gateway::books::BookService;
use bookshelf_gateway::config::GatewayConfig;
use bookshelf_gateway::logging::{init_logging, LogLevel};
use bookshelf_gateway::server::{create_router, AppState};
use bookshelf_gateway::store::DatasheetClient;

#[derive(Parser, Debug)]
#[command(name = "bookshelf-gateway")]
#[command(version)]
#[command(about = "REST gateway for a book inventory backed by a remote datasheet store")]
struct Cli {
    /// Port to listen on (overrides the PORT environment variable)
    #[arg(long, short)]
    port: Option<u16>,

    /// Address to bind to (overrides the BIND_ADDRESS environment variable)
    #[arg(long)]
    bind: Option<String>,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LogLevel::from_flags(cli.quiet, cli.verbose));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "gateway failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::from_env()?;
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(bind) = cli.bind {
        config = config.with_bind_address(bind);
    }

    let client = DatasheetClient::new(config.datasheet.clone())?;
    let state = AppState::new(BookService::new(client));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    info!(addr = %config.socket_addr(), "bookshelf gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}
