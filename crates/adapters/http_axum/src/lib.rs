//! # roomhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a small **JSON API** for programmatic access (`/api/snapshot`,
//!   `/api/analytics`, `/api/command`, …)
//! - Stream committed deltas as **Server-Sent Events** (`/api/events/stream`)
//! - Speak the **observer protocol** over a WebSocket (`/ws`): one initial
//!   snapshot, then ordered deltas, plus commands and analytics on request
//!
//! ## Dependency rule
//! Depends on `roomhub-app` (for the hub and its ports) and `roomhub-domain`
//! (for the types carried in requests and responses). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;

pub use router::build;
pub use state::AppState;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use roomhub_app::bus::memory::MemoryTransport;
    use roomhub_app::bus::Inbox;
    use roomhub_app::config::HubConfig;
    use roomhub_app::hub::Hub;

    use crate::state::AppState;

    /// A hub over the loopback transport, not started.
    pub(crate) fn state() -> (AppState<Arc<MemoryTransport>>, Arc<MemoryTransport>) {
        let config = HubConfig::default();
        let inbox = Inbox::new(&config.bus, &config.topics());
        let transport = Arc::new(MemoryTransport::new(inbox.clone()));
        let hub = Hub::new(config, Arc::clone(&transport), inbox);
        (AppState::new(hub), transport)
    }
}
