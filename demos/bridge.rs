//! UAVTalk bridge example
//!
//! Connects to a flight controller telemetry port over TCP and prints every
//! object update as a JSON line.
//!
//! Run with: cargo run --example bridge SCHEMA_DIR [FC_ADDR]
//!
//! Examples:
//!   cargo run --example bridge ./definitions                    # connects to 127.0.0.1:9000
//!   cargo run --example bridge ./definitions localhost:9001     # connects to 127.0.0.1:9001
//!   cargo run --example bridge ./definitions 192.168.1.20       # connects to 192.168.1.20:9000
//!
//! The schema directory holds one JSON definition per file:
//!
//! ```json
//! {
//!   "name": "HomeLocation",
//!   "object_id": 3392319538,
//!   "single_instance": true,
//!   "fields": [
//!     {"name": "Latitude", "type": "float32"},
//!     {"name": "Longitude", "type": "float32"},
//!     {"name": "Altitude", "type": "float32"}
//!   ]
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use uavtalk_bridge::hub::{Hub, HubConfig, Message};
use uavtalk_bridge::link::{Link, LinkConfig};
use uavtalk_bridge::schema::load_registry;

/// Parse a flight controller address, defaulting the port
fn parse_fc_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 9000;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid flight controller address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: bridge SCHEMA_DIR [FC_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  SCHEMA_DIR   Directory of *.json object definitions");
    eprintln!("  FC_ADDR      Flight controller telemetry address (default: 127.0.0.1:9000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let Some(schema_dir) = args.get(1) else {
        print_usage();
        std::process::exit(1);
    };

    let fc_addr = match args.get(2) {
        Some(addr_str) => match parse_fc_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([127, 0, 0, 1], 9000)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uavtalk_bridge=debug".parse()?)
                .add_directive("bridge=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = Arc::new(load_registry(schema_dir).await?);
    let (hub, hub_task) = Hub::spawn(Arc::clone(&registry), HubConfig::default());

    let stream = TcpStream::connect(fc_addr).await?;
    stream.set_nodelay(true)?;
    eprintln!("Connected to flight controller at {}", fc_addr);

    let link = Link::new(Arc::clone(&registry), LinkConfig::default());
    let link_conn = hub.join().await?;
    let runner = link.clone();
    let mut link_task = tokio::spawn(async move { runner.run(stream, link_conn).await });

    // Printer: subscribe to everything and dump updates to stdout
    let mut printer = hub.join().await?;
    for definition in registry.definitions() {
        printer
            .send(Message::subscription(definition.object_id()))
            .await?;
    }

    loop {
        tokio::select! {
            message = printer.recv() => match message {
                Some(message @ Message::Update(_)) => println!("{}", serde_json::to_string(&message)?),
                Some(_) => {}
                None => break,
            },
            result = &mut link_task => {
                match result {
                    Ok(Ok(())) => eprintln!("Link closed"),
                    Ok(Err(e)) => eprintln!("Link error: {}", e),
                    Err(e) => eprintln!("Link task failed: {}", e),
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
        }
    }

    let stats = link.stats();
    eprintln!(
        "Stats: bytes={} frames_in={} frames_out={} corrupt={} unknown={} hub_deliveries={}",
        stats.bytes_received,
        stats.frames_received,
        stats.frames_sent,
        stats.corrupt_frames,
        stats.unknown_objects,
        hub.stats().deliveries,
    );

    link_task.abort();
    drop(printer);
    drop(hub);
    let _ = hub_task.await;

    Ok(())
}
