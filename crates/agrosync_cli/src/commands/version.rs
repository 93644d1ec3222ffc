//! Version command implementation.

use agrosync_sync_protocol::ALL_ENTITIES;

/// Runs the version command.
pub fn run() {
    println!("AgroSync CLI v{}", env!("CARGO_PKG_VERSION"));
    println!("Synced entities: {}", ALL_ENTITIES.len());
}
