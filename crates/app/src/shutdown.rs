//! Cooperative shutdown signal shared by background tasks.

use tokio::sync::watch;

/// Resolve once `true` is published, or the sender is gone.
pub(crate) async fn requested(signal: &mut watch::Receiver<bool>) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            return;
        }
    }
}
