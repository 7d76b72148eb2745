//! Platform adapter boundary.
//!
//! All native collaborators (consent surface, display mirroring, synthetic
//! input delivery, package install) are consumed through [`PlatformAdapter`]
//! so the session state machine stays free of platform branches. Each target
//! OS provides one adapter; [`native_adapter`] selects it at compile time.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::capability::{Capability, Platform};
use crate::error::InjectionOutcome;
use crate::frame::RawFrame;
use crate::input::InputEvent;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

/// Frame surface sized for one capture. Handles are released exactly once;
/// calling [`FrameSurface::release`] again is a no-op.
pub trait FrameSurface: Send {
    fn size(&self) -> (u32, u32);
    fn release(&mut self);
}

/// Binding that mirrors the display onto a previously created surface.
pub trait MirrorBinding: Send {
    fn release(&mut self);
}

/// Reader over the bound surface's buffer queue.
#[async_trait]
pub trait BufferReader: Send {
    /// Waits for the next frame from the mirror. The session bounds the wait
    /// with a fixed timeout; implementations need not enforce one themselves.
    async fn next_frame(&mut self) -> Result<RawFrame>;
    fn release(&mut self);
}

/// One target OS behind the shared action contract.
///
/// Capture resources are acquired stepwise in the order surface → mirror
/// binding → reader; the session owns the handles and releases them in
/// reverse. Adapters may keep internal linkage between the steps.
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Dimensions of the primary display, in pixels.
    fn screen_size(&self) -> Result<(u32, u32)>;

    /// Launches the external consent surface for `capability`. Fire and
    /// forget: the surface reports back later, possibly from an unrelated
    /// privileged context, through `SessionController::resolve` with the
    /// same `request_id`.
    fn begin_consent(&self, capability: Capability, request_id: Uuid) -> Result<()>;

    fn create_surface(&self, width: u32, height: u32) -> Result<Box<dyn FrameSurface>>;
    fn bind_mirror(&self) -> Result<Box<dyn MirrorBinding>>;
    fn open_reader(&self) -> Result<Box<dyn BufferReader>>;

    /// Delivers one translated event. Missing privilege is a soft-failure,
    /// never an error, so the batch can continue best-effort.
    fn deliver(&self, event: &InputEvent) -> InjectionOutcome;

    fn has_install_permission(&self) -> bool;

    /// Hands a package file to the native install surface.
    fn install_package(&self, package: &Path) -> Result<()>;
}

/// Adapter for the platform this binary was compiled for.
pub fn native_adapter() -> Result<Arc<dyn PlatformAdapter>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(linux::LinuxAdapter::new()?))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacOsAdapter::new()?))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsAdapter::new()))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("no native adapter for this platform")
    }
}
