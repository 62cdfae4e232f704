use super::startup::{LOG_SINK, WORKER};
use super::{ComponentState, GestureRemoteOrchestrator};
use crate::error::{RemoteError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const LOG_SINK_STOP_TIMEOUT: Duration = Duration::from_secs(2);

impl GestureRemoteOrchestrator {
    /// Cancel the worker, wait for it to release the serial port, then stop
    /// the log sink
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Err(e) = self.stop_worker().await {
            error!("Error stopping worker: {}", e);
            exit_code = 1;
        }

        if let Err(e) = self.stop_log_sink().await {
            error!("Error stopping log sink: {}", e);
            exit_code = 1;
        }

        info!(
            "Graceful shutdown completed with exit code {} ({})",
            exit_code,
            self.component_summary().await
        );
        Ok(exit_code)
    }

    async fn stop_worker(&mut self) -> Result<()> {
        let Some(handle) = self.worker_handle.take() else {
            self.set_component_state(WORKER, ComponentState::Stopped).await;
            return Ok(());
        };

        info!("Stopping {} component", WORKER);
        self.set_component_state(WORKER, ComponentState::Stopping).await;

        match timeout(WORKER_STOP_TIMEOUT, handle).await {
            Ok(Ok(Ok(stats))) => {
                info!(
                    "Worker stopped: {} frames, {} gestures, {} sent, {} unmapped, {} from device",
                    stats.frames_processed,
                    stats.gestures_emitted,
                    stats.commands_sent,
                    stats.mapping_misses,
                    stats.device_messages
                );
                self.worker_stats = Some(stats);
                self.set_component_state(WORKER, ComponentState::Stopped).await;
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                self.set_component_state(WORKER, ComponentState::Failed).await;
                Err(e)
            }
            Ok(Err(join_error)) => {
                self.set_component_state(WORKER, ComponentState::Failed).await;
                Err(RemoteError::component(
                    WORKER.to_string(),
                    format!("worker task failed: {}", join_error),
                ))
            }
            Err(_) => {
                // Most likely blocked reading landmark input
                self.set_component_state(WORKER, ComponentState::Failed).await;
                warn!("Worker did not stop within {:?}", WORKER_STOP_TIMEOUT);
                Err(RemoteError::component(WORKER, "stop timeout"))
            }
        }
    }

    async fn stop_log_sink(&mut self) -> Result<()> {
        self.log_sink_token.cancel();
        let Some(handle) = self.log_sink_handle.take() else {
            self.set_component_state(LOG_SINK, ComponentState::Stopped).await;
            return Ok(());
        };

        self.set_component_state(LOG_SINK, ComponentState::Stopping).await;
        match timeout(LOG_SINK_STOP_TIMEOUT, handle).await {
            Ok(Ok(seen)) => {
                info!("{} component stopped after {} events", LOG_SINK, seen);
                self.set_component_state(LOG_SINK, ComponentState::Stopped).await;
                Ok(())
            }
            Ok(Err(join_error)) => {
                self.set_component_state(LOG_SINK, ComponentState::Failed).await;
                Err(RemoteError::component(
                    LOG_SINK.to_string(),
                    join_error.to_string(),
                ))
            }
            Err(_) => {
                self.set_component_state(LOG_SINK, ComponentState::Failed).await;
                Err(RemoteError::component(LOG_SINK, "stop timeout"))
            }
        }
    }
}
