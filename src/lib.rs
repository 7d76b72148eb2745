/*!
 * Portal Device Agent Library
 *
 * Consent-gated remote actions for a device: single-frame screen capture,
 * synthetic input injection, and package install, behind one session that
 * owns permission state and native resource lifetimes.
 */

pub mod agent;
pub mod capability;
pub mod error;
pub mod frame;
pub mod input;
pub mod platform;
pub mod session;
pub mod sysinfo;
pub mod validation;

// Re-export commonly used types
pub use agent::{DeviceAgent, InjectionReport, InputRequest, ScreenSize};
pub use capability::{Capability, CapabilityMatrix, Platform, SupportLevel};
pub use error::{ActionError, ConsentOutcome, InjectionOutcome};
pub use session::SessionController;
