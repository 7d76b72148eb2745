//! Windows adapter stub.
//!
//! Nothing is wired up on Windows yet; every capability row is declared
//! unsupported, so the session fails fast and injection is acknowledged as a
//! soft-failure before any of these methods would run.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::debug;
use uuid::Uuid;

use crate::capability::{Capability, Platform};
use crate::error::InjectionOutcome;
use crate::input::InputEvent;

use super::{BufferReader, FrameSurface, MirrorBinding, PlatformAdapter};

pub struct WindowsAdapter;

impl WindowsAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for WindowsAdapter {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        bail!("screen metrics are not available on windows")
    }

    fn begin_consent(&self, capability: Capability, request_id: Uuid) -> Result<()> {
        debug!(?capability, %request_id, "consent requested on windows");
        bail!("no consent surface on windows")
    }

    fn create_surface(&self, _width: u32, _height: u32) -> Result<Box<dyn FrameSurface>> {
        bail!("screen capture is not implemented on windows")
    }

    fn bind_mirror(&self) -> Result<Box<dyn MirrorBinding>> {
        bail!("screen capture is not implemented on windows")
    }

    fn open_reader(&self) -> Result<Box<dyn BufferReader>> {
        bail!("screen capture is not implemented on windows")
    }

    fn deliver(&self, _event: &InputEvent) -> InjectionOutcome {
        InjectionOutcome::Unsupported
    }

    fn has_install_permission(&self) -> bool {
        false
    }

    fn install_package(&self, _package: &Path) -> Result<()> {
        bail!("package install is not supported on windows")
    }
}
