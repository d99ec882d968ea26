//! Shared utility functions for wikisnap crates

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that
/// scheduled runs with an overridden HOME resolve the same paths as the shell.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    dirs::home_dir().ok_or_else(|| Error::validation("Could not determine home directory"))
}

/// Detect the machine's host name.
///
/// Checks `HOSTNAME`, then `/proc/sys/kernel/hostname`, then `/etc/hostname`.
pub fn detect_hostname() -> Option<String> {
    let from_env = std::env::var("HOSTNAME")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());
    if from_env.is_some() {
        return from_env;
    }

    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|s| s.trim().to_string())
        .find(|h| !h.is_empty())
}
