//! service-wire demo binary.
//!
//! ```text
//!     service-wire serve --config wire.toml
//!         → BootConfig → tracing / metrics → HttpServer (widget endpoints)
//!
//!     service-wire get 1 --qty 2
//!     service-wire create sprocket --qty 5
//!         → ServiceClient → encode record → HTTP → JSON on stdout
//! ```

mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::net::TcpListener;

use service_wire::config::{load_config, BootConfig};
use service_wire::lifecycle::signals::spawn_signal_listener;
use service_wire::observability::{logging::init_tracing, metrics::init_metrics};
use service_wire::{HttpServer, ServiceClient, Shutdown};

use crate::widgets::{CreateWidget, GetWidget, Inventory, NewWidget, WidgetReply};

#[derive(Parser)]
#[command(name = "service-wire")]
#[command(about = "Typed HTTP binding demo: widget inventory server and client", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "demo-token")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the widget inventory server
    Serve {
        /// TOML configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Fetch a widget by id
    Get {
        id: u64,
        #[arg(long, default_value_t = 0)]
        qty: u32,
    },
    /// Add a widget to the inventory
    Create {
        name: String,
        #[arg(long, default_value_t = 1)]
        qty: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(config).await?,
        Commands::Get { id, qty } => {
            let client = ServiceClient::new(cli.url);
            let request = GetWidget {
                id,
                qty,
                token: cli.token,
            };
            let reply: Value = client.call(&request).await?;
            print_json(&reply)?;
        }
        Commands::Create { name, qty } => {
            let client = ServiceClient::new(cli.url);
            let request = CreateWidget {
                token: cli.token,
                widget: NewWidget { name, qty },
            };
            let reply: Value = client.call(&request).await?;
            print_json(&reply)?;
        }
    }

    Ok(())
}

async fn serve(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => load_config(&path)?,
        None => BootConfig::default(),
    };

    init_tracing(&config.observability.log_level);
    tracing::info!("service-wire v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        root_path = %config.server.root_path,
        cache_enabled = config.cache.enabled,
        strict_validation = config.validation.strict,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(config);
    let mut inventory = Inventory::seeded();
    server.configure(&mut inventory)?;
    let inventory = Arc::new(inventory);
    let server = server
        .mount::<GetWidget, WidgetReply, _>(inventory.clone())?
        .mount::<CreateWidget, WidgetReply, _>(inventory)?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_json(value: &Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
