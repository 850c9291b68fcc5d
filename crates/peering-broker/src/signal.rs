use peering_protocol::CancellationToken;
use tokio::signal::unix::{signal, SignalKind};

/// Cancel `cancel` on Ctrl+C or SIGTERM.
pub fn cancel_on_shutdown(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received, stopping broker");
        cancel.cancel();
    });
}

async fn wait_for_signal() {
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
