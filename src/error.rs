//! Error taxonomy for privileged device actions.
//!
//! Hard failures are [`ActionError`]; input injection additionally reports
//! per-event soft-failures through [`InjectionOutcome`] because some platforms
//! offer no reliable failure signal for synthetic events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a privileged action requested through the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Capability is absent on this platform/version. Fails fast, no side effects.
    #[error("capability not supported on this platform")]
    NotSupported,

    /// The user declined or revoked consent. Recoverable; the caller may retry
    /// after re-requesting.
    #[error("permission denied by the user")]
    PermissionDenied,

    /// A request for the same capability is already in flight. Recoverable.
    #[error("a request for this capability is already pending")]
    Busy,

    /// No frame arrived from the bound surface within the fixed read timeout.
    #[error("timed out waiting for a display frame")]
    FrameTimeout,

    /// Resource acquisition or encoding failed after the grant was held.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// Malformed request payload. Fails fast.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// Package install needs a user authorization that is not held.
    #[error("install authorization required")]
    InstallPermissionRequired,

    /// The native install surface rejected the package.
    #[error("install failed: {0}")]
    InstallError(String),
}

/// Result of a consent flow, delivered through the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Granted,
    Denied,
}

/// Per-event delivery outcome for synthetic input.
///
/// `Unsupported` and `NoPermission` are soft-failures: the event was not
/// delivered but the batch continues, preserving a uniform best-effort
/// contract across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionOutcome {
    Delivered,
    Unsupported,
    NoPermission,
}

impl InjectionOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, InjectionOutcome::Delivered)
    }
}
