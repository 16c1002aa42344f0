//! poll-echo console client.
//!
//! Usage: `poll-echo-client <server_ip>`. Lines typed on the console are sent
//! to the server; replies are printed as they arrive. Type `quit` to exit.

use clap::Parser;
use poll_echo::client::{Client, Console};
use poll_echo::config::ClientArgs;
use std::io;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    // Logs go to stderr so they never interleave with console output
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let addr = args.server_addr();
    println!("Connecting to server {addr}...");

    let mut client = Client::connect(addr, args.connect_timeout()).map_err(|e| {
        error!(server = %addr, error = %e, "Connection failed");
        e
    })?;
    println!("Connected to server!");

    let mut console = Console::stdin();
    let exit = client.run(&mut console, &mut io::stdout().lock())?;

    println!("Connection closed");
    info!(reason = ?exit, "Client finished");
    Ok(())
}
