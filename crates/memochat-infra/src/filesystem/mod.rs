//! Filesystem adapters for memochat.
//!
//! Data directory resolution and the YAML-backed conversation store.

pub mod conversation;

use std::path::PathBuf;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "MEMOCHAT_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `MEMOCHAT_DATA_DIR` environment variable
/// 2. `~/.memochat`
/// 3. `./.memochat`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".memochat");
    }

    PathBuf::from(".memochat")
}
