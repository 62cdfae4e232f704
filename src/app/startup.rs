use super::{ComponentState, GestureRemoteOrchestrator};
use crate::error::{RemoteError, Result};
use crate::events::{EventFilter, EventReceiver, RemoteEvent};
use crate::irdb::load_ir_file;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub(super) const WORKER: &str = "worker";
pub(super) const LOG_SINK: &str = "log_sink";

impl GestureRemoteOrchestrator {
    /// Register components and load the IR command file, if any
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing gesture remote components");

        self.set_component_state(LOG_SINK, ComponentState::Stopped).await;
        self.set_component_state(WORKER, ComponentState::Stopped).await;

        let worker = self
            .worker
            .as_mut()
            .ok_or_else(|| RemoteError::system("Worker already started"))?;

        match &self.config.commands.ir_file {
            Some(path) => match load_ir_file(path) {
                Ok(set) => worker.load_command_set(set),
                Err(e) => {
                    // Gestures are still detected and reported without a table
                    warn!(
                        "Could not load IR file {}: {}; continuing without commands",
                        path.display(),
                        e
                    );
                }
            },
            None => debug!("No IR file configured"),
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the log sink, then the worker loop on a blocking thread
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting gesture remote");

        let (mut worker, mut source) = match (self.worker.take(), self.source.take()) {
            (Some(worker), Some(source)) => (worker, source),
            _ => {
                self.set_component_state(WORKER, ComponentState::Failed).await;
                error!("Worker was already started");
                return Err(RemoteError::component(WORKER, "already started"));
            }
        };

        self.set_component_state(LOG_SINK, ComponentState::Starting).await;
        let receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::All,
            LOG_SINK.to_string(),
        );
        self.log_sink_handle = Some(tokio::spawn(run_log_sink(
            receiver,
            self.log_sink_token.clone(),
        )));
        self.set_component_state(LOG_SINK, ComponentState::Running).await;

        // Subscribe before the worker can publish end of input
        self.shutdown_events = Some(EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown".to_string(),
        ));

        self.set_component_state(WORKER, ComponentState::Starting).await;
        let token = self.cancellation_token.clone();
        self.worker_handle = Some(tokio::task::spawn_blocking(move || {
            worker.run(source.as_mut(), &token)
        }));
        self.set_component_state(WORKER, ComponentState::Running).await;

        info!("Gesture remote started");
        Ok(())
    }
}

/// Render every bus event through tracing until cancelled; whatever is
/// still queued at that point is drained first. Returns the event count.
pub(super) async fn run_log_sink(mut receiver: EventReceiver, token: CancellationToken) -> u64 {
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            event = receiver.recv() => match event {
                Ok(event) => {
                    seen += 1;
                    render(&event);
                }
                Err(_) => break,
            },
        }
    }

    while let Ok(Some(event)) = receiver.try_recv() {
        seen += 1;
        render(&event);
    }
    debug!("Log sink '{}' stopped after {} events", receiver.name(), seen);
    seen
}

fn render(event: &RemoteEvent) {
    match event {
        RemoteEvent::FrameProcessed { .. } => trace!("{}", event.description()),
        _ => debug!(event = event.event_type(), "{}", event.description()),
    }
}
