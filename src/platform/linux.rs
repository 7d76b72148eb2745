//! Linux adapter.
//!
//! Injection goes through `xdotool`; frames come from the ImageMagick
//! `import` tool and are decoded to RGBA before handing them to the session.
//! Neither path needs an interactive consent surface on X11.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capability::{Capability, Platform};
use crate::error::InjectionOutcome;
use crate::frame::RawFrame;
use crate::input::{InputEvent, InputEventKind, PointerButton};

use super::{BufferReader, FrameSurface, MirrorBinding, PlatformAdapter};

pub struct LinuxAdapter {
    width: u32,
    height: u32,
}

impl LinuxAdapter {
    pub fn new() -> Result<Self> {
        let (width, height) = detect_screen_size().unwrap_or_else(|e| {
            warn!("could not detect screen size ({e}), assuming 1920x1080");
            (1920, 1080)
        });
        debug!(width, height, "linux adapter ready");
        Ok(Self { width, height })
    }

    fn run_xdotool(&self, args: &[&str]) -> InjectionOutcome {
        let output = match Command::new("xdotool").args(args).output() {
            Ok(output) => output,
            Err(e) => {
                warn!("xdotool unavailable: {e}");
                return InjectionOutcome::Unsupported;
            }
        };
        if output.status.success() {
            InjectionOutcome::Delivered
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(?args, "xdotool failed: {}", stderr.trim());
            InjectionOutcome::NoPermission
        }
    }
}

impl PlatformAdapter for LinuxAdapter {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }

    fn begin_consent(&self, capability: Capability, request_id: Uuid) -> Result<()> {
        // No interactive consent surface on X11; nothing is prompted here.
        debug!(?capability, %request_id, "consent surface not needed on linux");
        Ok(())
    }

    fn create_surface(&self, width: u32, height: u32) -> Result<Box<dyn FrameSurface>> {
        Ok(Box::new(LinuxSurface {
            size: (width, height),
        }))
    }

    fn bind_mirror(&self) -> Result<Box<dyn MirrorBinding>> {
        Ok(Box::new(LinuxMirror))
    }

    fn open_reader(&self) -> Result<Box<dyn BufferReader>> {
        Ok(Box::new(LinuxReader))
    }

    fn deliver(&self, event: &InputEvent) -> InjectionOutcome {
        match event.kind {
            InputEventKind::PointerMove { x, y } => {
                self.run_xdotool(&["mousemove", &x.to_string(), &y.to_string()])
            }
            InputEventKind::PointerDown { button, x, y } => {
                let moved = self.run_xdotool(&["mousemove", &x.to_string(), &y.to_string()]);
                if !moved.is_delivered() {
                    return moved;
                }
                self.run_xdotool(&["mousedown", button_number(button)])
            }
            InputEventKind::PointerUp { button, .. } => {
                self.run_xdotool(&["mouseup", button_number(button)])
            }
            InputEventKind::KeyDown { code } => {
                // xdotool accepts raw keysyms in hex.
                self.run_xdotool(&["keydown", &format!("{code:#x}")])
            }
            InputEventKind::KeyUp { code } => {
                self.run_xdotool(&["keyup", &format!("{code:#x}")])
            }
        }
    }

    fn has_install_permission(&self) -> bool {
        false
    }

    fn install_package(&self, _package: &Path) -> Result<()> {
        bail!("package install is not supported on linux")
    }
}

struct LinuxSurface {
    size: (u32, u32),
}

impl FrameSurface for LinuxSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn release(&mut self) {}
}

struct LinuxMirror;

impl MirrorBinding for LinuxMirror {
    fn release(&mut self) {}
}

struct LinuxReader;

#[async_trait]
impl BufferReader for LinuxReader {
    async fn next_frame(&mut self) -> Result<RawFrame> {
        // The session may drop this future on timeout or teardown; reap the
        // child rather than leaving it orphaned.
        let output = tokio::process::Command::new("import")
            .args(["-window", "root", "-silent", "png:-"])
            .kill_on_drop(true)
            .output()
            .await
            .context("spawning import")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("import failed: {}", stderr.trim());
        }
        if output.stdout.is_empty() {
            bail!("import produced no image data");
        }

        let image = image::load_from_memory(&output.stdout)
            .context("decoding captured image")?
            .to_rgba8();
        let (width, height) = image.dimensions();
        debug!(width, height, "captured root window");
        Ok(RawFrame::packed(width, height, image.into_raw()))
    }

    fn release(&mut self) {}
}

fn button_number(button: PointerButton) -> &'static str {
    match button {
        PointerButton::Left => "1",
        PointerButton::Middle => "2",
        PointerButton::Right => "3",
    }
}

/// Parses `dimensions: 1920x1080 pixels` out of `xdpyinfo`.
fn detect_screen_size() -> Result<(u32, u32)> {
    let output = Command::new("xdpyinfo").output().context("running xdpyinfo")?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("dimensions:") {
            if let Some(dims) = rest.split_whitespace().next() {
                if let Some((w, h)) = dims.split_once('x') {
                    if let (Ok(w), Ok(h)) = (w.parse(), h.parse()) {
                        return Ok((w, h));
                    }
                }
            }
        }
    }
    bail!("no dimensions line in xdpyinfo output")
}
