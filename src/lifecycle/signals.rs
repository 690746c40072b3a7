//! OS signal handling.

use crate::lifecycle::cancel::CancelSignal;

/// Wait for Ctrl+C, then cancel `signal`.
pub async fn cancel_on_ctrl_c(signal: CancelSignal) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received, cancelling in-flight calls");
            signal.cancel();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    }
}
