//! External action contract of the agent.
//!
//! [`DeviceAgent`] is the surface a message transport binds to: screen size,
//! single-frame capture, input injection, and package install. Consent
//! callbacks from the native surface are routed to the owned session through
//! [`DeviceAgent::session`].

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capability::{Capability, CapabilityMatrix, SupportLevel};
use crate::error::{ActionError, InjectionOutcome};
use crate::input::{EventTranslator, InputEvent};
use crate::platform::PlatformAdapter;
use crate::session::SessionController;
use crate::sysinfo::{system_info, SystemInfo};
use crate::validation::{validate_package_name, CoordinateValidator};

const DEFAULT_PACKAGE_NAME: &str = "app.apk";

/// One input-injection request as carried by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InputRequest {
    MoveMouse {
        x: i32,
        y: i32,
    },
    ClickMouse {
        x: i32,
        y: i32,
        #[serde(default)]
        button: Option<String>,
    },
    PressKey {
        key: String,
    },
    TypeText {
        text: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Acknowledgement for an injection batch.
///
/// Soft-failures are reported here as data instead of being raised (or
/// silently swallowed): `dropped` counts keys with no native mapping,
/// `soft_failure` carries the first non-delivered outcome.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionReport {
    pub translated: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub soft_failure: Option<InjectionOutcome>,
}

/// Device-side agent exposing the privileged action contract.
pub struct DeviceAgent {
    adapter: Arc<dyn PlatformAdapter>,
    session: Arc<SessionController>,
    translator: EventTranslator,
}

impl DeviceAgent {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, matrix: CapabilityMatrix) -> Self {
        let translator = EventTranslator::new(matrix.platform());
        let session = Arc::new(SessionController::new(adapter.clone(), matrix));
        Self {
            adapter,
            session,
            translator,
        }
    }

    /// Session handle for the consent surface to deliver `resolve` callbacks.
    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn system_info(&self) -> Result<SystemInfo> {
        system_info(self.adapter.as_ref())
    }

    pub fn request_screen_size(&self) -> Result<ScreenSize, ActionError> {
        self.adapter
            .screen_size()
            .map(|(width, height)| ScreenSize { width, height })
            .map_err(|_| ActionError::NotSupported)
    }

    /// Captures one still frame as PNG bytes.
    pub async fn request_capture(&self) -> Result<Vec<u8>, ActionError> {
        self.session.capture_frame().await
    }

    /// Translates and delivers one injection request, event by event.
    ///
    /// Missing platform support or privilege is acknowledged as a
    /// soft-failure in the report; only malformed payloads are errors.
    pub async fn request_input_injection(
        &self,
        request: InputRequest,
    ) -> Result<InjectionReport, ActionError> {
        let descriptor = self.session.matrix().describe(Capability::InputInjection);
        if descriptor.support_level == SupportLevel::Unsupported {
            return Ok(InjectionReport {
                translated: 0,
                delivered: 0,
                dropped: 0,
                soft_failure: Some(InjectionOutcome::Unsupported),
            });
        }

        let (events, expected) = self.translate(&request)?;

        let mut delivered = 0;
        let mut soft_failure = None;
        for event in &events {
            match self.adapter.deliver(event) {
                InjectionOutcome::Delivered => delivered += 1,
                outcome => {
                    // Best-effort: record the failure, keep going.
                    soft_failure.get_or_insert(outcome);
                }
            }
        }

        let report = InjectionReport {
            translated: events.len(),
            delivered,
            dropped: expected.saturating_sub(events.len()),
            soft_failure,
        };
        if report.soft_failure.is_some() || report.dropped > 0 {
            warn!(?request, ?report, "injection completed with losses");
        }
        Ok(report)
    }

    /// Writes the package to a temporary path and hands it to the native
    /// install surface, running the authorization flow first if required.
    pub async fn request_install(
        &self,
        package: &[u8],
        suggested_name: Option<&str>,
    ) -> Result<(), ActionError> {
        if package.is_empty() {
            return Err(ActionError::InvalidArgs(
                "package data is required".to_string(),
            ));
        }
        let name = suggested_name.unwrap_or(DEFAULT_PACKAGE_NAME);
        validate_package_name(name)?;

        let descriptor = self.session.matrix().describe(Capability::AppInstall);
        if descriptor.support_level == SupportLevel::Unsupported {
            return Err(ActionError::NotSupported);
        }
        if descriptor.requires_permission && !self.adapter.has_install_permission() {
            match self.session.obtain_grant(Capability::AppInstall).await {
                Ok(()) => {}
                Err(ActionError::PermissionDenied) => {
                    return Err(ActionError::InstallPermissionRequired)
                }
                Err(e) => return Err(e),
            }
        }

        let path = std::env::temp_dir().join(name);
        tokio::fs::write(&path, package)
            .await
            .map_err(|e| ActionError::InstallError(format!("staging package: {e}")))?;
        info!(path = %path.display(), bytes = package.len(), "package staged for install");

        self.adapter
            .install_package(&path)
            .map_err(|e| ActionError::InstallError(e.to_string()))
    }

    /// Releases the session and everything it owns. Idempotent.
    pub fn shutdown(&self) {
        self.session.stop();
    }

    fn translate(&self, request: &InputRequest) -> Result<(Vec<InputEvent>, usize), ActionError> {
        let events = match request {
            InputRequest::MoveMouse { x, y } => {
                self.coordinates()?.validate(*x, *y)?;
                (self.translator.pointer_move(*x, *y), 1)
            }
            InputRequest::ClickMouse { x, y, button } => {
                self.coordinates()?.validate(*x, *y)?;
                (self.translator.click(*x, *y, button.as_deref()), 2)
            }
            InputRequest::PressKey { key } => (self.translator.key_press(key), 2),
            InputRequest::TypeText { text } => {
                (self.translator.translate_text(text), text.chars().count() * 2)
            }
        };
        Ok(events)
    }

    fn coordinates(&self) -> Result<CoordinateValidator, ActionError> {
        let (width, height) = self
            .adapter
            .screen_size()
            .map_err(|_| ActionError::NotSupported)?;
        Ok(CoordinateValidator::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Platform;
    use crate::input::InputEventKind;
    use crate::platform::mock::MockAdapter;

    fn agent_with(adapter: MockAdapter, platform: Platform) -> (DeviceAgent, Arc<MockAdapter>) {
        let adapter = Arc::new(adapter);
        let agent = DeviceAgent::new(adapter.clone(), CapabilityMatrix::for_platform(platform));
        (agent, adapter)
    }

    #[tokio::test]
    async fn click_request_delivers_down_then_up() {
        let (agent, adapter) = agent_with(MockAdapter::new(100, 100), Platform::Android);
        let report = agent
            .request_input_injection(InputRequest::ClickMouse {
                x: 10,
                y: 20,
                button: Some("right".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.soft_failure, None);
        let events = adapter.delivered_events();
        assert!(matches!(events[0].kind, InputEventKind::PointerDown { .. }));
        assert!(matches!(events[1].kind, InputEventKind::PointerUp { .. }));
    }

    #[tokio::test]
    async fn out_of_bounds_click_is_rejected_before_delivery() {
        let (agent, adapter) = agent_with(MockAdapter::new(100, 100), Platform::Android);
        let err = agent
            .request_input_injection(InputRequest::ClickMouse {
                x: 100,
                y: 0,
                button: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArgs(_)));
        assert!(adapter.delivered_events().is_empty());
    }

    #[tokio::test]
    async fn text_with_unmapped_characters_reports_drops() {
        let (agent, _) = agent_with(MockAdapter::new(100, 100), Platform::Android);
        let report = agent
            .request_input_injection(InputRequest::TypeText {
                text: "a%b".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(report.translated, 4);
        assert_eq!(report.delivered, 4);
        assert_eq!(report.dropped, 2);
    }

    #[tokio::test]
    async fn missing_privilege_is_a_soft_failure_not_an_error() {
        let (agent, adapter) = agent_with(
            MockAdapter::new(100, 100).with_injection_outcome(InjectionOutcome::NoPermission),
            Platform::Android,
        );
        let report = agent
            .request_input_injection(InputRequest::PressKey {
                key: "enter".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.soft_failure, Some(InjectionOutcome::NoPermission));
        assert!(adapter.delivered_events().is_empty());
    }

    #[tokio::test]
    async fn unsupported_platform_acks_injection_with_soft_failure() {
        let (agent, _) = agent_with(MockAdapter::new(100, 100), Platform::Windows);
        let report = agent
            .request_input_injection(InputRequest::PressKey {
                key: "enter".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(report.soft_failure, Some(InjectionOutcome::Unsupported));
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn empty_package_is_invalid_args() {
        let (agent, _) = agent_with(MockAdapter::new(100, 100), Platform::Android);
        assert!(matches!(
            agent.request_install(&[], None).await.unwrap_err(),
            ActionError::InvalidArgs(_)
        ));
    }

    #[tokio::test]
    async fn install_with_held_authorization_stages_and_installs() {
        let (agent, adapter) = agent_with(MockAdapter::new(100, 100), Platform::Android);
        agent
            .request_install(b"pkg-bytes", Some("demo.apk"))
            .await
            .unwrap();
        let installed = adapter.installed_packages();
        assert_eq!(installed.len(), 1);
        assert!(installed[0].ends_with("demo.apk"));
    }

    #[tokio::test]
    async fn install_on_unsupported_platform_fails_fast() {
        let (agent, adapter) = agent_with(MockAdapter::new(100, 100), Platform::Linux);
        assert_eq!(
            agent
                .request_install(b"pkg", Some("demo.apk"))
                .await
                .unwrap_err(),
            ActionError::NotSupported
        );
        assert!(adapter.consent_requests().is_empty());
        assert!(adapter.installed_packages().is_empty());
    }

    #[tokio::test]
    async fn screen_size_comes_from_the_adapter() {
        let (agent, _) = agent_with(MockAdapter::new(640, 480), Platform::Android);
        let size = agent.request_screen_size().unwrap();
        assert_eq!((size.width, size.height), (640, 480));
    }
}
