//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;
pub mod version;

use agrosync_store::{FileStore, FileStoreOptions};
use std::path::Path;

/// Opens an existing store without creating it.
fn open_store(path: &Path) -> Result<FileStore, Box<dyn std::error::Error>> {
    let options = FileStoreOptions::default().create_if_missing(false);
    FileStore::open_with_options(path, options)
        .map_err(|e| format!("Cannot open store at {}: {e}", path.display()).into())
}
