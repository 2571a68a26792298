// src/main.rs - cncserver entry point
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cncserver_rs::config::{self, Config};
use cncserver_rs::hardware::{CommandChannel, LoopbackChannel, SerialChannel};
use cncserver_rs::{web, Plotter};

/// Exit code when no EiBotBoard can be found.
const EXIT_NO_BOARD: i32 = 22;
/// Exit code when the serial port cannot be opened.
const EXIT_PORT_BUSY: i32 = 10;

#[derive(Parser, Debug)]
#[command(name = "cncserver", version, about = "HTTP control server for EiBotBoard plotters")]
struct Args {
    /// Port for the HTTP API (overrides the config file)
    port: Option<u16>,
    /// Serial device of the board (auto-detected when omitted)
    serial_path: Option<String>,
    /// TOML configuration file; built-in WaterColorBot settings when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log commands instead of writing them to a serial port
    #[arg(long)]
    dry_run: bool,
    /// Log every command sent and every reply received
    #[arg(short, long)]
    verbose: bool,
}

fn open_board(args: &Args, config: &Config) -> Arc<dyn CommandChannel> {
    let requested = args.serial_path.clone().unwrap_or_else(|| config.serial.path.clone());
    let path = if requested.is_empty() {
        tracing::info!("Finding available serial ports...");
        let ports = SerialChannel::available_ports();
        tracing::info!("Available serial ports: {}", ports.join(", "));
        match SerialChannel::find_eibotboard() {
            Some(path) => path,
            None => {
                tracing::error!("EiBotBoard not found. Are you sure it's connected? Exiting with code {}", EXIT_NO_BOARD);
                std::process::exit(EXIT_NO_BOARD);
            }
        }
    } else {
        tracing::info!("Using passed serial port \"{}\"...", requested);
        requested
    };

    match SerialChannel::open(&path, config.serial.baud) {
        Ok(channel) => {
            tracing::info!("Connected to EiBotBoard on {}", channel.path());
            Arc::new(channel)
        }
        Err(e) => {
            tracing::error!(
                "Serial port failed to connect ({}). Is it busy or in use elsewhere? Exiting with code {}",
                e,
                EXIT_PORT_BUSY
            );
            std::process::exit(EXIT_PORT_BUSY);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            config::load_config(path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path.display(), e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };
    let config = Arc::new(config);

    tracing::info!("Plotter: {}", config.name);
    tracing::info!("Area: {}x{} steps, work area offset ({}, {})",
                   config.max_area.width, config.max_area.height,
                   config.work_area.left, config.work_area.top);
    tracing::info!("Tools: {}", config.tool_names().join(", "));

    let channel: Arc<dyn CommandChannel> = if args.dry_run {
        tracing::warn!("Dry run: commands will not reach any hardware");
        Arc::new(LoopbackChannel::new())
    } else {
        open_board(&args, &config)
    };

    let plotter = Plotter::new(config.clone(), channel);
    if let Err(e) = plotter.initialize().await {
        tracing::warn!("Servo configuration failed: {}", e);
    }
    let handle = plotter.spawn(16);

    let app = web::api::create_router(handle);
    let port = args.port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("CNC server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
