use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use whisker_console::client::Console;
use whisker_console::config::Config;
use whisker_console::render::TracingSink;
use whisker_console::transport::websocket::{WebSocketConfig, WebSocketTransport};

#[derive(Parser, Debug)]
#[command(name = "whisker-console", about = "Headless operator console")]
struct Cli {
    /// Fleet server host:port (overrides WHISKER_SERVER)
    #[arg(long, short = 's')]
    server: Option<String>,

    /// Client id announced to the server (overrides WHISKER_CONSOLE_ID)
    #[arg(long)]
    console_id: Option<String>,

    /// Map ids to open a view for; repeatable
    #[arg(long = "map", short = 'm')]
    maps: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(server) = cli.server {
        config.server_address = server;
    }
    if let Some(console_id) = cli.console_id {
        config.console_id = console_id;
    }

    let transport = WebSocketTransport::connect(WebSocketConfig::new(
        &config.server_address,
        &config.console_id,
    ))
    .await?;
    info!(server = %config.server_address, console_id = %config.console_id, "connected");

    let console = Console::new();
    console.connect(
        Arc::new(transport),
        Arc::new(|connected| {
            if connected {
                info!("session established");
            } else {
                error!("session lost; reconnect by restarting the console");
            }
        }),
    );

    for map_id in &cli.maps {
        console
            .open_map_view(map_id, Arc::new(TracingSink))
            .await;
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for map_id in cli.maps {
        console.close_map_view(&map_id).await;
    }
    console.disconnect();
    Ok(())
}
