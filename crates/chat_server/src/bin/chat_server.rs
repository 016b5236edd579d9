use clap::Parser;
use flexi_logger::Logger;
use log::{error, info};
use std::path::PathBuf;

use chat_server::config::Config;
use chat_server::server;

/// Multi-client chat relay server with IRC-style commands.
#[derive(Parser, Debug)]
#[command(name = "chat_server", version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Debug verbosity: 0 = errors only, 1 = all events
    #[arg(short, long, default_value_t = 0)]
    debug: u8,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_spec = if args.debug >= 1 { "debug" } else { "warn" };
    Logger::try_with_str(log_spec)
        .and_then(|logger| logger.log_to_stderr().start())
        .ok();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.network.port = port;
    }

    let server = match server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    match server.local_addr() {
        Ok(addr) => info!("chat server started on {addr}"),
        Err(e) => error!("{e}"),
    }

    server.run().await;
    // Reaching this point means the shutdown sequence completed.
    std::process::exit(0);
}
