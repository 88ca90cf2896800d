//! Shared application state for axum handlers.

use std::sync::Arc;

use roomhub_app::hub::Hub;
use roomhub_app::ports::BusTransport;

/// Application state shared across all axum handlers.
///
/// Generic over the bus transport so handlers stay statically dispatched.
/// `Clone` is implemented manually so the transport itself does not need to
/// be `Clone`; only the `Arc` is cloned.
pub struct AppState<T> {
    /// The running hub.
    pub hub: Arc<Hub<T>>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<T: BusTransport> AppState<T> {
    #[must_use]
    pub fn new(hub: Arc<Hub<T>>) -> Self {
        Self { hub }
    }
}
