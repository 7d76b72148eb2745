//! Deterministic adapter used by the test suites.
//!
//! Models the consent-gated platform: every prompt launch is recorded instead
//! of shown, frames are synthetic buffers with configurable row padding, and
//! the full resource lifecycle is journaled so tests can assert acquisition
//! and release order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::capability::{Capability, Platform};
use crate::error::InjectionOutcome;
use crate::frame::RawFrame;
use crate::input::InputEvent;

use super::{BufferReader, FrameSurface, MirrorBinding, PlatformAdapter};

type Journal = Arc<Mutex<Vec<String>>>;

fn journal_push(journal: &Journal, entry: &str) {
    journal
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(entry.to_string());
}

pub struct MockAdapter {
    screen: (u32, u32),
    frame: Mutex<RawFrame>,
    frame_delay: Mutex<Duration>,
    injection_outcome: Mutex<InjectionOutcome>,
    install_permission: AtomicBool,
    refuse_consent_launch: AtomicBool,
    fail_step: Mutex<Option<&'static str>>,
    consents: Mutex<Vec<(Capability, Uuid)>>,
    delivered: Mutex<Vec<InputEvent>>,
    installed: Mutex<Vec<PathBuf>>,
    journal: Journal,
}

impl MockAdapter {
    pub fn new(width: u32, height: u32) -> Self {
        let frame = RawFrame::packed(width, height, vec![0u8; (width * height * 4) as usize]);
        Self {
            screen: (width, height),
            frame: Mutex::new(frame),
            frame_delay: Mutex::new(Duration::ZERO),
            injection_outcome: Mutex::new(InjectionOutcome::Delivered),
            install_permission: AtomicBool::new(true),
            refuse_consent_launch: AtomicBool::new(false),
            fail_step: Mutex::new(None),
            consents: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            installed: Mutex::new(Vec::new()),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_frame(self, frame: RawFrame) -> Self {
        *self.lock(&self.frame) = frame;
        self
    }

    /// Delay before the reader yields a frame; lets tests exercise the read
    /// timeout and teardown-during-capture paths.
    pub fn with_frame_delay(self, delay: Duration) -> Self {
        *self.lock(&self.frame_delay) = delay;
        self
    }

    pub fn with_injection_outcome(self, outcome: InjectionOutcome) -> Self {
        *self.lock(&self.injection_outcome) = outcome;
        self
    }

    pub fn with_install_permission(self, held: bool) -> Self {
        self.install_permission.store(held, Ordering::SeqCst);
        self
    }

    pub fn refusing_consent_launch(self) -> Self {
        self.refuse_consent_launch.store(true, Ordering::SeqCst);
        self
    }

    /// Makes the named acquisition step ("surface", "mirror", "reader") fail.
    pub fn failing_at(self, step: &'static str) -> Self {
        *self.lock(&self.fail_step) = Some(step);
        self
    }

    pub fn consent_requests(&self) -> Vec<(Capability, Uuid)> {
        self.lock(&self.consents).clone()
    }

    pub fn last_consent(&self) -> Option<(Capability, Uuid)> {
        self.lock(&self.consents).last().copied()
    }

    pub fn delivered_events(&self) -> Vec<InputEvent> {
        self.lock(&self.delivered).clone()
    }

    pub fn installed_packages(&self) -> Vec<PathBuf> {
        self.lock(&self.installed).clone()
    }

    /// Ordered acquire/release journal, e.g. `["surface:acquire", ...]`.
    pub fn lifecycle(&self) -> Vec<String> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok(self.screen)
    }

    fn begin_consent(&self, capability: Capability, request_id: Uuid) -> Result<()> {
        if self.refuse_consent_launch.load(Ordering::SeqCst) {
            bail!("consent surface unavailable");
        }
        self.lock(&self.consents).push((capability, request_id));
        Ok(())
    }

    fn create_surface(&self, width: u32, height: u32) -> Result<Box<dyn FrameSurface>> {
        if *self.lock(&self.fail_step) == Some("surface") {
            bail!("surface creation failed");
        }
        journal_push(&self.journal, "surface:acquire");
        Ok(Box::new(MockSurface {
            size: (width, height),
            journal: self.journal.clone(),
            released: false,
        }))
    }

    fn bind_mirror(&self) -> Result<Box<dyn MirrorBinding>> {
        if *self.lock(&self.fail_step) == Some("mirror") {
            bail!("mirror binding refused");
        }
        journal_push(&self.journal, "mirror:acquire");
        Ok(Box::new(MockMirror {
            journal: self.journal.clone(),
            released: false,
        }))
    }

    fn open_reader(&self) -> Result<Box<dyn BufferReader>> {
        if *self.lock(&self.fail_step) == Some("reader") {
            bail!("reader unavailable");
        }
        journal_push(&self.journal, "reader:acquire");
        Ok(Box::new(MockReader {
            frame: self.lock(&self.frame).clone(),
            delay: *self.lock(&self.frame_delay),
            journal: self.journal.clone(),
            released: false,
        }))
    }

    fn deliver(&self, event: &InputEvent) -> InjectionOutcome {
        let outcome = *self.lock(&self.injection_outcome);
        if outcome.is_delivered() {
            self.lock(&self.delivered).push(*event);
        }
        outcome
    }

    fn has_install_permission(&self) -> bool {
        self.install_permission.load(Ordering::SeqCst)
    }

    fn install_package(&self, package: &Path) -> Result<()> {
        self.lock(&self.installed).push(package.to_path_buf());
        Ok(())
    }
}

struct MockSurface {
    size: (u32, u32),
    journal: Journal,
    released: bool,
}

impl FrameSurface for MockSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            journal_push(&self.journal, "surface:release");
        }
    }
}

struct MockMirror {
    journal: Journal,
    released: bool,
}

impl MirrorBinding for MockMirror {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            journal_push(&self.journal, "mirror:release");
        }
    }
}

struct MockReader {
    frame: RawFrame,
    delay: Duration,
    journal: Journal,
    released: bool,
}

#[async_trait]
impl BufferReader for MockReader {
    async fn next_frame(&mut self) -> Result<RawFrame> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.frame.clone())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            journal_push(&self.journal, "reader:release");
        }
    }
}
