use super::{GestureRemoteOrchestrator, ShutdownReason};
use crate::error::{RemoteError, Result};
use crate::events::EventReceiver;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

type SharedShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl GestureRemoteOrchestrator {
    /// Wait for a signal or the end of landmark input, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Gesture remote is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| RemoteError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| RemoteError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        if let Some(events) = self.shutdown_events.take() {
            watch_end_of_input(events, shutdown_sender);
        }

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| RemoteError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);
        let exit_code = self.shutdown().await?;

        info!("Gesture remote shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: SharedShutdownSender) {
        // SIGTERM (service stop), Unix only
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_reason(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                }
            });
        }

        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT signal (Ctrl+C)");
                send_reason(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });
    }
}

fn watch_end_of_input(mut events: EventReceiver, shutdown_sender: SharedShutdownSender) {
    tokio::spawn(async move {
        if events.recv().await.is_ok() {
            send_reason(&shutdown_sender, ShutdownReason::EndOfInput).await;
        }
    });
}

/// First reason wins; later ones are dropped
async fn send_reason(sender: &SharedShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
