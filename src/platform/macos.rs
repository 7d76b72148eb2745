//! macOS adapter.
//!
//! Input goes out as CGEvents posted to the HID tap. Screen recording is
//! gated by TCC; [`MacOsAdapter::begin_consent`] preflights the grant and,
//! when missing, triggers the system prompt on a blocking task. The outcome
//! arrives on the channel returned by [`MacOsAdapter::take_consent_events`],
//! which the embedder forwards to `SessionController::resolve`.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use core_graphics::display::CGDisplay;
use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGKeyCode, CGMouseButton};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capability::{Capability, Platform};
use crate::error::{ConsentOutcome, InjectionOutcome};
use crate::frame::RawFrame;
use crate::input::{InputEvent, InputEventKind, PointerButton};

use super::{BufferReader, FrameSurface, MirrorBinding, PlatformAdapter};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightScreenCaptureAccess() -> bool;
    fn CGRequestScreenCaptureAccess() -> bool;
}

/// A consent outcome produced by the TCC prompt, keyed back to its request.
pub type ConsentEvent = (Capability, Uuid, ConsentOutcome);

pub struct MacOsAdapter {
    events: mpsc::UnboundedSender<ConsentEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ConsentEvent>>>,
}

impl MacOsAdapter {
    pub fn new() -> Result<Self> {
        let (events, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            events,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Consent outcomes, taken once by whoever owns the session.
    pub fn take_consent_events(&self) -> Option<mpsc::UnboundedReceiver<ConsentEvent>> {
        self.receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn event_source() -> Result<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| anyhow!("failed to create CGEventSource"))
    }

    fn post_mouse(&self, event_type: CGEventType, x: i32, y: i32, button: CGMouseButton) -> Result<()> {
        let source = Self::event_source()?;
        let point = CGPoint::new(x as f64, y as f64);
        let event = CGEvent::new_mouse_event(source, event_type, point, button)
            .map_err(|_| anyhow!("failed to create mouse event"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_key(&self, code: u32, down: bool) -> Result<()> {
        let source = Self::event_source()?;
        let event = CGEvent::new_keyboard_event(source, code as CGKeyCode, down)
            .map_err(|_| anyhow!("failed to create keyboard event"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl PlatformAdapter for MacOsAdapter {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        let display = CGDisplay::main();
        Ok((display.pixels_wide() as u32, display.pixels_high() as u32))
    }

    fn begin_consent(&self, capability: Capability, request_id: Uuid) -> Result<()> {
        if capability != Capability::ScreenCapture {
            bail!("no consent surface for {capability:?} on macos");
        }
        let events = self.events.clone();
        // CGRequestScreenCaptureAccess blocks on the system dialog.
        tokio::task::spawn_blocking(move || {
            let granted = unsafe {
                CGPreflightScreenCaptureAccess() || CGRequestScreenCaptureAccess()
            };
            let outcome = if granted {
                ConsentOutcome::Granted
            } else {
                ConsentOutcome::Denied
            };
            debug!(%request_id, ?outcome, "screen recording consent resolved");
            if events.send((capability, request_id, outcome)).is_err() {
                warn!(%request_id, "consent outcome dropped, no listener");
            }
        });
        Ok(())
    }

    fn create_surface(&self, width: u32, height: u32) -> Result<Box<dyn FrameSurface>> {
        Ok(Box::new(MacOsSurface {
            size: (width, height),
        }))
    }

    fn bind_mirror(&self) -> Result<Box<dyn MirrorBinding>> {
        Ok(Box::new(MacOsMirror))
    }

    fn open_reader(&self) -> Result<Box<dyn BufferReader>> {
        Ok(Box::new(MacOsReader))
    }

    fn deliver(&self, event: &InputEvent) -> InjectionOutcome {
        let posted = match event.kind {
            InputEventKind::PointerMove { x, y } => {
                self.post_mouse(CGEventType::MouseMoved, x, y, CGMouseButton::Left)
            }
            InputEventKind::PointerDown { button, x, y } => {
                let (button, event_type) = mouse_down(button);
                self.post_mouse(event_type, x, y, button)
            }
            InputEventKind::PointerUp { button, x, y } => {
                let (button, event_type) = mouse_up(button);
                self.post_mouse(event_type, x, y, button)
            }
            InputEventKind::KeyDown { code } => self.post_key(code, true),
            InputEventKind::KeyUp { code } => self.post_key(code, false),
        };
        match posted {
            Ok(()) => InjectionOutcome::Delivered,
            Err(e) => {
                warn!("event post failed: {e}");
                InjectionOutcome::NoPermission
            }
        }
    }

    fn has_install_permission(&self) -> bool {
        false
    }

    fn install_package(&self, _package: &Path) -> Result<()> {
        bail!("package install is not supported on macos")
    }
}

fn mouse_down(button: PointerButton) -> (CGMouseButton, CGEventType) {
    match button {
        PointerButton::Left => (CGMouseButton::Left, CGEventType::LeftMouseDown),
        PointerButton::Right => (CGMouseButton::Right, CGEventType::RightMouseDown),
        PointerButton::Middle => (CGMouseButton::Center, CGEventType::OtherMouseDown),
    }
}

fn mouse_up(button: PointerButton) -> (CGMouseButton, CGEventType) {
    match button {
        PointerButton::Left => (CGMouseButton::Left, CGEventType::LeftMouseUp),
        PointerButton::Right => (CGMouseButton::Right, CGEventType::RightMouseUp),
        PointerButton::Middle => (CGMouseButton::Center, CGEventType::OtherMouseUp),
    }
}

struct MacOsSurface {
    size: (u32, u32),
}

impl FrameSurface for MacOsSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn release(&mut self) {}
}

struct MacOsMirror;

impl MirrorBinding for MacOsMirror {
    fn release(&mut self) {}
}

struct MacOsReader;

#[async_trait]
impl BufferReader for MacOsReader {
    async fn next_frame(&mut self) -> Result<RawFrame> {
        let path = std::env::temp_dir().join(format!("frame-{}.png", Uuid::new_v4()));
        // The session may drop this future on timeout or teardown; reap the
        // child rather than leaving it orphaned.
        let status = tokio::process::Command::new("screencapture")
            .arg("-x")
            .args(["-t", "png"])
            .arg(&path)
            .kill_on_drop(true)
            .status()
            .await
            .context("spawning screencapture")?;
        if !status.success() {
            bail!("screencapture exited with {status}");
        }

        let bytes = tokio::fs::read(&path).await.context("reading capture file")?;
        let _ = tokio::fs::remove_file(&path).await;

        let image = image::load_from_memory(&bytes)
            .context("decoding captured image")?
            .to_rgba8();
        let (width, height) = image.dimensions();
        debug!(width, height, "captured main display");
        Ok(RawFrame::packed(width, height, image.into_raw()))
    }

    fn release(&mut self) {}
}
