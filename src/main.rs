//! Ferry - the connector layer of a chat network to Matrix bridge.
//!
//! Ferry maps the users and conversations of a remote messaging network onto
//! Matrix: remote users become ghosts, remote conversations become Matrix
//! rooms, and the mapping survives restarts in a snapshot file.
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings (see [`config`] for every
//! option):
//!
//! ```yaml
//! matrix:
//!   user_id: "@ferry:example.org"
//!   password: "your-password"
//!
//! bridge:
//!   permissions:
//!     "example.org": user
//! ```
//!
//! # Environment Variable Overrides
//!
//! Override any configuration value using environment variables with the `FERRY_` prefix:
//!
//! ```bash
//! export FERRY_MATRIX__USER_ID="@ferry:example.org"
//! export FERRY_MATRIX__PASSWORD="your-password"
//! ```
//!
//! # Usage
//!
//! ```bash
//! ferry --config config.yaml --data ./ferry-data
//! ```
//!
//! Then invite the bot to a private room: it becomes your management room.
//!
//! # Bot Commands
//!
//! - `!ferry help` - Display help information
//! - `!ferry login [remote_id] [display name]` - Log in and get a bridged room
//!
//! # Architecture
//!
//! - [`store`] - Identity store of bridged users and rooms
//! - [`persistence`] - Snapshot storage of the identity store
//! - [`kit`] - Interfaces of the collaborators the connector drives
//! - [`router`] - The connector: lifecycle, event routing and the login flow
//! - [`commands`] - Command parsing, registry and responses
//! - [`matrix`] - Relay-mode Matrix runtime
//! - [`remote`] - Placeholder remote network transport
//! - [`bridge`] - Wiring and main loop
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{bridge::Bridge, config::Config};

mod bridge;
mod commands;
mod config;
mod kit;
mod matrix;
mod persistence;
mod remote;
mod router;
mod store;

/// Command-line arguments of the bridge.
///
/// # Examples
///
/// ```bash
/// ferry --config config.yaml --data ./ferry-data
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain:
    /// - `session/` - Matrix session data (access token, sqlite store)
    /// - `db.json` - Snapshot of the identity store (name set by `store.file`)
    #[arg(short, long)]
    data: PathBuf,
}

#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting ferry {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return;
        }
    };

    let bridge = match Bridge::new(config, &args.data).await {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("Failed to initialize bridge: {:?}", e);
            return;
        }
    };

    if let Err(e) = bridge.run().await {
        error!("Bridge stopped with error: {:?}", e);
    }
}
