//! # roomhubd: study room coordination hub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialise `tracing` from the configured filter
//! - Connect the bus transport (MQTT, or the in-process loopback when MQTT
//!   is disabled)
//! - Build and start the hub, then the axum router on top of it
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::sync::Arc;

use roomhub_adapter_http_axum::state::AppState;
use roomhub_adapter_mqtt::MqttTransport;
use roomhub_app::bus::Inbox;
use roomhub_app::bus::memory::MemoryTransport;
use roomhub_app::hub::Hub;
use roomhub_app::ports::BusTransport;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let inbox = Inbox::new(&config.hub.bus, &config.hub.topics());
    if config.mqtt.enabled {
        let transport = MqttTransport::connect(&config.mqtt, inbox.clone());
        serve(config, transport, inbox).await
    } else {
        tracing::warn!("MQTT disabled, running on the in-process loopback bus");
        let transport = MemoryTransport::new(inbox.clone());
        serve(config, transport, inbox).await
    }
}

async fn serve<T: BusTransport>(
    config: Config,
    transport: T,
    inbox: Inbox,
) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr();
    let hub = Hub::new(config.hub, transport, inbox);
    hub.start().await;

    let app = roomhub_adapter_http_axum::router::build(AppState::new(Arc::clone(&hub)));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "roomhubd listening");

    // the hub stops first so observer sockets close and the server can drain
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            hub.shutdown().await;
        })
        .await?;

    tracing::info!("roomhubd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
