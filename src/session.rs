//! Session state machine and pending-request correlator.
//!
//! Every privileged action funnels through [`SessionController`]: the
//! capability matrix gates it, a consent flow may suspend it, and the
//! correlator matches the eventual out-of-process grant/deny callback to the
//! one pending request that triggered it. Capture resources are owned by the
//! in-flight action and released in strict reverse acquisition order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capability::{Capability, CapabilityMatrix, SupportLevel};
use crate::error::{ActionError, ConsentOutcome};
use crate::frame::encode_png;
use crate::platform::{BufferReader, FrameSurface, MirrorBinding, PlatformAdapter};

/// Upper bound on waiting for the first frame after binding the mirror.
pub const FRAME_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Lifecycle of the single active capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    RequestingPermission,
    AwaitingExternalGrant,
    Granted,
    Denied,
    Capturing,
    Completed,
    Failed,
}

/// One in-flight consent flow. At most one lives per capability.
struct PendingRequest {
    capability: Capability,
    request_id: Uuid,
    responder: oneshot::Sender<ConsentOutcome>,
    created_at: Instant,
}

/// Capture resource handles, owned by the action that acquired them.
///
/// Acquisition order is surface → mirror binding → reader; release is the
/// strict reverse and is safe to invoke more than once.
#[derive(Default)]
struct CaptureResources {
    surface: Option<Box<dyn FrameSurface>>,
    mirror: Option<Box<dyn MirrorBinding>>,
    reader: Option<Box<dyn BufferReader>>,
}

impl CaptureResources {
    fn release(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.release();
        }
        if let Some(mut mirror) = self.mirror.take() {
            mirror.release();
        }
        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }
    }
}

struct Inner {
    state: SessionState,
    /// Only the capture path sets and clears this. Consent flows for other
    /// capabilities move `state` while a capture is in flight, so the
    /// exclusivity guard must not read the shared enum.
    capturing: bool,
    pending: HashMap<Capability, PendingRequest>,
    grants: HashSet<Capability>,
    cancel: CancellationToken,
}

/// Owns the capture session and correlates consent callbacks to requests.
pub struct SessionController {
    session_id: Uuid,
    adapter: Arc<dyn PlatformAdapter>,
    matrix: CapabilityMatrix,
    inner: Mutex<Inner>,
}

impl SessionController {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, matrix: CapabilityMatrix) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            adapter,
            matrix,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                capturing: false,
                pending: HashMap::new(),
                grants: HashSet::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn matrix(&self) -> &CapabilityMatrix {
        &self.matrix
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ensures a grant for `capability` is held, running the consent flow if
    /// the platform requires one.
    ///
    /// Fails fast with `NotSupported` for unsupported capabilities (no prompt,
    /// no state change) and with `Busy` while another request for the same
    /// capability is outstanding. The returned future suspends until the
    /// external consent surface reports back through [`Self::resolve`].
    pub async fn obtain_grant(&self, capability: Capability) -> Result<(), ActionError> {
        let (request_id, receiver) = {
            let mut inner = self.lock();

            let descriptor = self.matrix.describe(capability);
            if descriptor.support_level == SupportLevel::Unsupported {
                return Err(ActionError::NotSupported);
            }
            if inner.grants.contains(&capability) {
                return Ok(());
            }
            if !descriptor.requires_permission {
                // No consent flow on this platform; grant for the process
                // lifetime immediately.
                inner.grants.insert(capability);
                return Ok(());
            }
            if inner.pending.contains_key(&capability) {
                return Err(ActionError::Busy);
            }

            let request_id = Uuid::new_v4();
            let (responder, receiver) = oneshot::channel();
            inner.state = SessionState::RequestingPermission;
            inner.pending.insert(
                capability,
                PendingRequest {
                    capability,
                    request_id,
                    responder,
                    created_at: Instant::now(),
                },
            );
            inner.state = SessionState::AwaitingExternalGrant;
            (request_id, receiver)
        };

        info!(
            session = %self.session_id,
            ?capability,
            request = %request_id,
            route = self.matrix.describe(capability).prompt_route,
            "requesting user consent"
        );

        if let Err(e) = self.adapter.begin_consent(capability, request_id) {
            warn!(?capability, error = %e, "consent surface could not be launched");
            let mut inner = self.lock();
            inner.pending.remove(&capability);
            inner.state = SessionState::Idle;
            return Err(prompt_launch_failure(capability, &e.to_string()));
        }

        match receiver.await {
            Ok(ConsentOutcome::Granted) => Ok(()),
            Ok(ConsentOutcome::Denied) => {
                self.lock().state = SessionState::Idle;
                Err(ActionError::PermissionDenied)
            }
            // Responder dropped without an outcome; treat as a denial.
            Err(_) => Err(ActionError::PermissionDenied),
        }
    }

    /// Entry point for the external consent surface.
    ///
    /// Safe to call from any context and at any time: a callback that matches
    /// no pending request (stale, duplicated, or arriving after teardown)
    /// is logged and dropped without touching session state. A matched
    /// callback retires the pending request and fires its continuation
    /// exactly once.
    pub fn resolve(&self, capability: Capability, request_id: Uuid, outcome: ConsentOutcome) {
        let pending = {
            let mut inner = self.lock();
            match inner.pending.get(&capability) {
                Some(p) if p.request_id == request_id => {}
                _ => {
                    debug!(
                        ?capability,
                        request = %request_id,
                        ?outcome,
                        "dropping consent callback with no matching pending request"
                    );
                    return;
                }
            }
            let Some(pending) = inner.pending.remove(&capability) else {
                return;
            };
            inner.state = match outcome {
                ConsentOutcome::Granted => {
                    inner.grants.insert(capability);
                    SessionState::Granted
                }
                ConsentOutcome::Denied => SessionState::Denied,
            };
            pending
        };

        info!(
            capability = ?pending.capability,
            request = %pending.request_id,
            ?outcome,
            waited_ms = pending.created_at.elapsed().as_millis() as u64,
            "consent flow resolved"
        );
        // The caller may have detached while waiting; a closed channel is fine.
        let _ = pending.responder.send(outcome);
    }

    /// Captures one frame: consent, resource acquisition, bounded read,
    /// lossless encode.
    pub async fn capture_frame(&self) -> Result<Vec<u8>, ActionError> {
        self.obtain_grant(Capability::ScreenCapture).await?;

        let (width, height) = self
            .adapter
            .screen_size()
            .map_err(|e| ActionError::CaptureFailed(format!("screen size unavailable: {e}")))?;

        let cancel = {
            let mut inner = self.lock();
            if inner.capturing {
                return Err(ActionError::Busy);
            }
            inner.capturing = true;
            inner.state = SessionState::Capturing;
            inner.cancel.clone()
        };
        debug!(session = %self.session_id, width, height, "entering capture");

        let mut resources = CaptureResources::default();
        let result = self.acquire_and_read(width, height, &mut resources, &cancel).await;
        // Release unconditionally, reverse order, before surfacing any error.
        resources.release();

        let terminal = if result.is_ok() {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        debug!(session = %self.session_id, state = ?terminal, "capture finished");
        // The per-action session is destroyed once its outcome is known.
        {
            let mut inner = self.lock();
            inner.capturing = false;
            inner.state = SessionState::Idle;
        }

        result
    }

    async fn acquire_and_read(
        &self,
        width: u32,
        height: u32,
        resources: &mut CaptureResources,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ActionError> {
        let surface = self
            .adapter
            .create_surface(width, height)
            .map_err(|e| ActionError::CaptureFailed(format!("surface: {e}")))?;
        resources.surface = Some(surface);

        let mirror = self
            .adapter
            .bind_mirror()
            .map_err(|e| ActionError::CaptureFailed(format!("mirror binding: {e}")))?;
        resources.mirror = Some(mirror);

        let mut reader = self
            .adapter
            .open_reader()
            .map_err(|e| ActionError::CaptureFailed(format!("buffer reader: {e}")))?;

        let read = tokio::select! {
            _ = cancel.cancelled() => None,
            read = tokio::time::timeout(FRAME_READ_TIMEOUT, reader.next_frame()) => Some(read),
        };
        resources.reader = Some(reader);

        match read {
            None => Err(ActionError::CaptureFailed("session stopped".to_string())),
            Some(Err(_)) => Err(ActionError::FrameTimeout),
            Some(Ok(Err(e))) => Err(ActionError::CaptureFailed(format!("frame read: {e}"))),
            Some(Ok(Ok(frame))) => encode_png(&frame),
        }
    }

    /// Teardown. Valid from any state and idempotent: cancels an in-flight
    /// capture, retires outstanding consent requests (their callers observe a
    /// denial), and leaves the session in `Idle`. A consent callback arriving
    /// afterwards is a no-op.
    pub fn stop(&self) {
        let drained: Vec<PendingRequest> = {
            let mut inner = self.lock();
            inner.cancel.cancel();
            inner.cancel = CancellationToken::new();
            inner.state = SessionState::Idle;
            // The cancelled capture clears its own flag as it unwinds.
            inner.pending.drain().map(|(_, p)| p).collect()
        };

        for pending in drained {
            info!(
                capability = ?pending.capability,
                request = %pending.request_id,
                age_ms = pending.created_at.elapsed().as_millis() as u64,
                "retiring pending consent request on teardown"
            );
            let _ = pending.responder.send(ConsentOutcome::Denied);
        }
    }
}

fn prompt_launch_failure(capability: Capability, message: &str) -> ActionError {
    match capability {
        Capability::AppInstall => ActionError::InstallError(format!("consent surface: {message}")),
        _ => ActionError::CaptureFailed(format!("consent surface: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Platform;
    use crate::platform::mock::MockAdapter;

    fn consent_gated(adapter: MockAdapter) -> Arc<SessionController> {
        Arc::new(SessionController::new(
            Arc::new(adapter),
            CapabilityMatrix::for_platform(Platform::Android),
        ))
    }

    async fn wait_for_consent(adapter: &MockAdapter) -> (Capability, Uuid) {
        for _ in 0..200 {
            if let Some(consent) = adapter.last_consent() {
                return consent;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("consent surface was never invoked");
    }

    #[tokio::test]
    async fn unsupported_capability_fails_fast_without_prompt() {
        let adapter = Arc::new(MockAdapter::new(64, 64));
        let session = SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Windows),
        );

        let result = session.capture_frame().await;
        assert_eq!(result.unwrap_err(), ActionError::NotSupported);
        assert!(adapter.consent_requests().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn second_request_while_awaiting_grant_is_busy() {
        let adapter = Arc::new(MockAdapter::new(32, 32));
        let session = Arc::new(SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Android),
        ));

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        let (capability, request_id) = wait_for_consent(&adapter).await;
        assert_eq!(capability, Capability::ScreenCapture);

        // Only one pending request may exist per capability.
        assert_eq!(
            session.capture_frame().await.unwrap_err(),
            ActionError::Busy
        );

        session.resolve(capability, request_id, ConsentOutcome::Granted);
        let png = first.await.unwrap().unwrap();
        assert_eq!(&png[1..4], b"PNG");

        // The grant is cached for the process lifetime: no second prompt.
        session.capture_frame().await.unwrap();
        assert_eq!(adapter.consent_requests().len(), 1);
    }

    #[tokio::test]
    async fn mismatched_resolve_is_a_silent_no_op() {
        let adapter = Arc::new(MockAdapter::new(32, 32));
        let session = Arc::new(SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Android),
        ));

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        let (capability, request_id) = wait_for_consent(&adapter).await;

        // Wrong id, wrong capability, and an outright unknown id must all be
        // discarded without touching the pending request.
        session.resolve(capability, Uuid::new_v4(), ConsentOutcome::Granted);
        session.resolve(Capability::AppInstall, request_id, ConsentOutcome::Granted);
        assert_eq!(session.state(), SessionState::AwaitingExternalGrant);

        session.resolve(capability, request_id, ConsentOutcome::Denied);
        assert_eq!(
            task.await.unwrap().unwrap_err(),
            ActionError::PermissionDenied
        );

        // Duplicate of an already-retired callback: still a no-op.
        session.resolve(capability, request_id, ConsentOutcome::Granted);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn denied_consent_allows_a_fresh_request() {
        let adapter = Arc::new(MockAdapter::new(32, 32));
        let session = Arc::new(SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Android),
        ));

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        let (capability, request_id) = wait_for_consent(&adapter).await;
        session.resolve(capability, request_id, ConsentOutcome::Denied);
        assert_eq!(
            first.await.unwrap().unwrap_err(),
            ActionError::PermissionDenied
        );

        // A new request starts a new consent flow with a fresh id.
        let second = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        for _ in 0..200 {
            if adapter.consent_requests().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let requests = adapter.consent_requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].1, requests[1].1);

        session.resolve(capability, requests[1].1, ConsentOutcome::Granted);
        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn partial_acquisition_failure_releases_in_reverse() {
        let adapter = Arc::new(MockAdapter::new(32, 32).failing_at("mirror"));
        let session = SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Linux),
        );

        let err = session.capture_frame().await.unwrap_err();
        assert!(matches!(err, ActionError::CaptureFailed(_)));
        assert_eq!(
            adapter.lifecycle(),
            vec!["surface:acquire", "surface:release"]
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn slow_mirror_times_out_and_releases_everything() {
        let adapter = Arc::new(
            MockAdapter::new(32, 32)
                .with_frame_delay(FRAME_READ_TIMEOUT + Duration::from_millis(200)),
        );
        let session = SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Linux),
        );

        let err = session.capture_frame().await.unwrap_err();
        assert_eq!(err, ActionError::FrameTimeout);
        assert_eq!(
            adapter.lifecycle(),
            vec![
                "surface:acquire",
                "mirror:acquire",
                "reader:acquire",
                "reader:release",
                "mirror:release",
                "surface:release",
            ]
        );
    }

    #[tokio::test]
    async fn stop_during_capture_cancels_and_releases() {
        let adapter =
            Arc::new(MockAdapter::new(32, 32).with_frame_delay(Duration::from_secs(10)));
        let session = Arc::new(SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Linux),
        ));

        let capture = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        for _ in 0..200 {
            if adapter.lifecycle().contains(&"reader:acquire".to_string()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        session.stop();
        let err = capture.await.unwrap().unwrap_err();
        assert!(matches!(err, ActionError::CaptureFailed(_)));

        let journal = adapter.lifecycle();
        assert_eq!(
            journal.iter().filter(|e| e.ends_with(":release")).count(),
            3,
            "all three resources must be released: {journal:?}"
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn capture_stays_exclusive_across_an_install_consent_flow() {
        let adapter = Arc::new(
            MockAdapter::new(32, 32)
                .with_frame_delay(Duration::from_millis(300))
                .with_install_permission(false),
        );
        let session = Arc::new(SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Android),
        ));

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        let (capability, request_id) = wait_for_consent(&adapter).await;
        session.resolve(capability, request_id, ConsentOutcome::Granted);
        for _ in 0..200 {
            if adapter.lifecycle().contains(&"reader:acquire".to_string()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // An install consent flow moves the shared state while the capture is
        // still holding its resources.
        let install = tokio::spawn({
            let session = session.clone();
            async move { session.obtain_grant(Capability::AppInstall).await }
        });
        for _ in 0..200 {
            if adapter.consent_requests().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(adapter.consent_requests().len(), 2);

        // The in-flight capture must still be exclusive.
        assert_eq!(
            session.capture_frame().await.unwrap_err(),
            ActionError::Busy
        );

        let install_id = adapter.consent_requests()[1].1;
        session.resolve(Capability::AppInstall, install_id, ConsentOutcome::Granted);
        install.await.unwrap().unwrap();
        first.await.unwrap().unwrap();

        // Exactly one acquisition set ran.
        let journal = adapter.lifecycle();
        assert_eq!(
            journal.iter().filter(|e| *e == "surface:acquire").count(),
            1,
            "a second capture pipeline ran: {journal:?}"
        );
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let session = consent_gated(MockAdapter::new(16, 16));
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn stop_retires_pending_and_late_resolve_is_noop() {
        let adapter = Arc::new(MockAdapter::new(32, 32));
        let session = Arc::new(SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Android),
        ));

        let waiting = tokio::spawn({
            let session = session.clone();
            async move { session.capture_frame().await }
        });
        let (capability, request_id) = wait_for_consent(&adapter).await;

        session.stop();
        assert_eq!(
            waiting.await.unwrap().unwrap_err(),
            ActionError::PermissionDenied
        );

        // The consent surface answers after teardown: safe no-op.
        session.resolve(capability, request_id, ConsentOutcome::Granted);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn failed_consent_launch_retires_the_pending_request() {
        let adapter = Arc::new(MockAdapter::new(32, 32).refusing_consent_launch());
        let session = SessionController::new(
            adapter.clone(),
            CapabilityMatrix::for_platform(Platform::Android),
        );

        let err = session.capture_frame().await.unwrap_err();
        assert!(matches!(err, ActionError::CaptureFailed(_)));
        assert_eq!(session.state(), SessionState::Idle);

        // Nothing left pending: a later callback has nothing to match.
        session.resolve(
            Capability::ScreenCapture,
            Uuid::new_v4(),
            ConsentOutcome::Granted,
        );
        assert_eq!(session.state(), SessionState::Idle);
    }
}
