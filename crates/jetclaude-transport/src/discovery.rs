//! CLI executable discovery
//!
//! Locates the `claude` executable: first on `PATH`, then in the common
//! install locations package managers use. The error carries every searched
//! location so the caller can show an actionable message.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Locate the `claude` executable
pub fn find_cli() -> Result<PathBuf> {
    if let Ok(path) = which::which("claude") {
        return Ok(path);
    }

    let locations = common_locations();
    for location in &locations {
        if is_executable_file(location) {
            return Ok(location.clone());
        }
    }

    let message = if which::which("node").is_err() {
        "claude CLI not found and Node.js is not installed; install Node.js from \
         https://nodejs.org/ then run: npm install -g @anthropic-ai/claude-code"
    } else {
        "claude CLI not found; install with: npm install -g @anthropic-ai/claude-code"
    };

    Err(Error::CliNotFound {
        message: message.to_string(),
        searched: locations,
    })
}

/// Validate a working directory before handing it to the child
pub fn validate_working_directory(cwd: &Path) -> Result<()> {
    match std::fs::metadata(cwd) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::connection(format!(
            "working directory is not a directory: {}",
            cwd.display()
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::connection(format!(
            "working directory does not exist: {}",
            cwd.display()
        ))),
        Err(err) => Err(Error::Connection {
            message: format!("failed to check working directory: {}", cwd.display()),
            source: Some(err),
        }),
    }
}

fn common_locations() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    if cfg!(windows) {
        return vec![
            home.join("AppData").join("Roaming").join("npm").join("claude.cmd"),
            home.join(".npm-global").join("claude.cmd"),
            home.join("node_modules").join(".bin").join("claude.cmd"),
        ];
    }

    vec![
        home.join(".npm-global").join("bin").join("claude"),
        PathBuf::from("/usr/local/bin/claude"),
        home.join(".local").join("bin").join("claude"),
        home.join("node_modules").join(".bin").join("claude"),
        home.join(".yarn").join("bin").join("claude"),
        PathBuf::from("/opt/homebrew/bin/claude"),
        PathBuf::from("/usr/local/homebrew/bin/claude"),
    ]
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    true
}
