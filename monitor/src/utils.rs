//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("REFRESHMON_GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("REFRESHMON_BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Truncate a response body for inclusion in an error message
pub fn preview(body: &str, max_chars: usize) -> String {
    let mut out: String = body.chars().take(max_chars).collect();
    if body.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
