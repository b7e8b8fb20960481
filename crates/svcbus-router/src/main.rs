// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! svcbus Routing Service CLI
//!
//! # Usage
//!
//! ```bash
//! # Listen on 127.0.0.1:8181
//! svcbus-router
//!
//! # Listen on every interface, custom port
//! svcbus-router --address 0.0.0.0 --port 9000
//!
//! # Using configuration file, overriding the connection limit
//! svcbus-router --config router.toml --max-connections 16
//!
//! # Generate / validate a configuration file
//! svcbus-router gen-config --output router.toml
//! svcbus-router validate --config router.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use svcbus_router::{RouterConfig, RouterError, RouterServer, RouterStats};
use tracing_subscriber::EnvFilter;

/// svcbus Routing Service
#[derive(Parser, Debug)]
#[command(name = "svcbus-router")]
#[command(about = "svcbus Routing Service - service registry and message forwarding")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening address (overrides the configuration file)
    #[arg(short, long)]
    address: Option<String>,

    /// Listening port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum number of connected processes
    #[arg(long)]
    max_connections: Option<usize>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value = "0")]
    stats_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "router.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    let mut server = RouterServer::bind(config)?;

    println!("svcbus Routing Service v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    println!("Router:    {}", server.config().router.name);
    println!("Listening: {}", server.local_address());
    println!("Max conns: {}", server.config().router.max_connections);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let handle = server.start()?;

    let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    // Wait for Ctrl+C, reporting statistics meanwhile
    if args.stats_interval > 0 {
        let interval = Duration::from_secs(args.stats_interval);
        while stop_rx.recv_timeout(interval).is_err() {
            match handle.stats() {
                Ok(stats) => print_stats(&stats),
                Err(e) => {
                    tracing::warn!("statistics unavailable: {}", e);
                    break;
                }
            }
        }
    } else {
        let _ = stop_rx.recv();
    }

    println!("\nShutting down...");
    if let Ok(stats) = handle.stats() {
        println!("\nFinal Statistics:");
        print_stats(&stats);
    }
    server.stop();

    Ok(())
}

fn build_config(args: &Args) -> Result<RouterConfig, RouterError> {
    let mut config = match args.config {
        Some(ref path) => RouterConfig::from_file(path)?,
        None => RouterConfig::default(),
    };

    if let Some(ref address) = args.address {
        config.connection.tcpip.address = address.clone();
    }
    if let Some(port) = args.port {
        config.connection.tcpip.port = port;
    }
    if let Some(max) = args.max_connections {
        config.router.max_connections = max;
    }
    config.router.log_level = args.log_level.clone();

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RouterConfig::listen("0.0.0.0", svcbus::config::DEFAULT_ROUTER_PORT);
    config.router.name = "example-router".into();
    config.router.max_connections = 64;

    let content = format!(
        r#"# svcbus Router Configuration
# Generated by svcbus-router gen-config

{}
"#,
        config.to_toml()?
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match RouterConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Router:          {}", config.router.name);
            println!("Listening:       {}", config.tcpip().endpoint());
            println!("Max connections: {}", config.router.max_connections);
            println!("Max message:     {}", format_bytes(config.router.max_message_size as u64));
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_stats(stats: &RouterStats) {
    println!("--- Router Statistics ---");
    println!(
        "  {} connections ({} refused), {} services: {} stubs, {} proxies",
        stats.connections, stats.refused, stats.services, stats.stubs, stats.proxies
    );
    println!(
        "  {} messages forwarded, {} undelivered",
        stats.forwarded, stats.undelivered
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
