//! Capability matrix: which privileged actions each platform supports, and at
//! what support level.
//!
//! All platform differences live here as data. The session state machine and
//! the agent consult [`CapabilityMatrix::describe`] and never branch on the
//! platform directly.

use serde::Serialize;

/// A privileged action requiring OS-level consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ScreenCapture,
    InputInjection,
    AppInstall,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::ScreenCapture,
        Capability::InputInjection,
        Capability::AppInstall,
    ];
}

/// Degree to which a capability is backed on a platform.
///
/// `Emulated` means the action works through a best-effort path (e.g. posting
/// events without verifying accessibility trust, or rendering a visible window
/// instead of the true framebuffer). Callers may treat it like `Full`; the
/// distinction is kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Full,
    Emulated,
    Unsupported,
}

/// Target platform for the matrix rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Android,
}

impl Platform {
    /// Platform of the running binary.
    pub fn current() -> Self {
        #[cfg(target_os = "linux")]
        return Platform::Linux;

        #[cfg(target_os = "macos")]
        return Platform::MacOs;

        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        return Platform::Android;
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Android => "android",
        }
    }
}

/// Immutable description of one (platform, capability) pair.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CapabilityDescriptor {
    pub capability: Capability,
    pub platform: Platform,
    pub support_level: SupportLevel,
    /// Whether the action is gated behind an out-of-process consent flow.
    pub requires_permission: bool,
    /// Route identifier handed to the native consent surface.
    pub prompt_route: Option<&'static str>,
    /// Minimum OS version (platform-specific numbering) at which the prompt
    /// exists. Diagnostic data reported to the controller; the running
    /// platform is assumed to be at or above it.
    pub min_prompt_os: Option<u32>,
}

/// Per-platform support table, loaded once.
#[derive(Debug, Clone)]
pub struct CapabilityMatrix {
    platform: Platform,
    rows: [CapabilityDescriptor; 3],
}

impl CapabilityMatrix {
    /// Matrix for the platform of the running binary.
    pub fn current() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        let row = |capability, support_level, requires_permission, prompt_route, min_prompt_os| {
            CapabilityDescriptor {
                capability,
                platform,
                support_level,
                requires_permission,
                prompt_route,
                min_prompt_os,
            }
        };

        use Capability::*;
        use SupportLevel::*;

        let rows = match platform {
            Platform::Linux => [
                row(ScreenCapture, Full, false, None, None),
                row(InputInjection, Full, false, None, None),
                row(AppInstall, Unsupported, false, None, None),
            ],
            Platform::MacOs => [
                // Screen recording is gated by TCC from macOS 10.15.
                row(ScreenCapture, Full, true, Some("tcc:screen-recording"), Some(15)),
                // CGEvent posting works without verified Accessibility trust,
                // but delivery is best-effort.
                row(InputInjection, Emulated, false, None, None),
                row(AppInstall, Unsupported, false, None, None),
            ],
            Platform::Windows => [
                row(ScreenCapture, Unsupported, false, None, None),
                row(InputInjection, Unsupported, false, None, None),
                row(AppInstall, Unsupported, false, None, None),
            ],
            Platform::Android => [
                // Display mirroring needs the projection consent dialog.
                row(ScreenCapture, Full, true, Some("projection-consent"), Some(21)),
                // Event injection needs a system privilege the app may lack;
                // delivery degrades to a soft-failure without it.
                row(InputInjection, Emulated, false, None, None),
                // Unknown-sources install authorization, prompted from API 26.
                row(AppInstall, Full, true, Some("unknown-sources-settings"), Some(26)),
            ],
        };

        Self { platform, rows }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Single source of truth for per-capability support.
    pub fn describe(&self, capability: Capability) -> &CapabilityDescriptor {
        self.rows
            .iter()
            .find(|d| d.capability == capability)
            .unwrap_or(&self.rows[0]) // rows cover every Capability variant
    }

    pub fn rows(&self) -> &[CapabilityDescriptor] {
        &self.rows
    }
}
