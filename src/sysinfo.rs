//! Host system information reported to the remote controller.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::platform::PlatformAdapter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub hostname: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// Gathers the system report through the platform adapter.
pub fn system_info(adapter: &dyn PlatformAdapter) -> Result<SystemInfo> {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let (screen_width, screen_height) = adapter.screen_size()?;

    Ok(SystemInfo {
        os: adapter.platform().name().to_string(),
        arch: std::env::consts::ARCH.to_string(),
        hostname,
        screen_width,
        screen_height,
    })
}
