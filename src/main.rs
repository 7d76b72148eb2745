//! Portal Device Agent: consent-gated capture, input, and install actions.
//!
//! Runs the device-side agent for the platform this binary was built for and
//! keeps it alive until interrupted. A message transport binds to
//! [`DeviceAgent`]; this entry point wires logging, the platform adapter, and
//! (where the OS has one) the native consent surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_device_agent::capability::CapabilityMatrix;
use portal_device_agent::platform::{self, PlatformAdapter};
use portal_device_agent::DeviceAgent;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "portal-device-agent v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    #[cfg(target_os = "macos")]
    let (adapter, consent_events): (
        Arc<dyn PlatformAdapter>,
        Option<tokio::sync::mpsc::UnboundedReceiver<platform::macos::ConsentEvent>>,
    ) = {
        let adapter = Arc::new(platform::macos::MacOsAdapter::new()?);
        let events = adapter.take_consent_events();
        (adapter, events)
    };

    #[cfg(not(target_os = "macos"))]
    let adapter: Arc<dyn PlatformAdapter> =
        platform::native_adapter().context("initializing platform adapter")?;

    let matrix = CapabilityMatrix::current();
    for capability in portal_device_agent::Capability::ALL {
        let descriptor = matrix.describe(capability);
        info!(
            ?capability,
            support = ?descriptor.support_level,
            requires_permission = descriptor.requires_permission,
            "capability"
        );
    }

    let agent = Arc::new(DeviceAgent::new(adapter, matrix));

    match agent.system_info() {
        Ok(info) => info!(
            "system: {}",
            serde_json::to_string(&info).context("serializing system info")?
        ),
        Err(e) => warn!("system info unavailable: {e}"),
    }

    // Route native consent outcomes into the session correlator.
    #[cfg(target_os = "macos")]
    if let Some(mut events) = consent_events {
        let session = agent.session().clone();
        tokio::spawn(async move {
            while let Some((capability, request_id, outcome)) = events.recv().await {
                session.resolve(capability, request_id, outcome);
            }
        });
    }

    info!("agent ready, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    info!("shutting down");
    agent.shutdown();
    Ok(())
}
