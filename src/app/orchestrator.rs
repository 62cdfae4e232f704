use super::types::{ComponentState, ShutdownReason};
use crate::config::RemoteConfig;
use crate::error::Result;
use crate::events::{EventBus, EventReceiver};
use crate::serial::SerialBackend;
use crate::source::LandmarkSource;
use crate::worker::{GestureWorker, WorkerStats};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Wires the worker loop, the event log sink and signal handling together
pub struct GestureRemoteOrchestrator {
    pub(super) config: RemoteConfig,
    pub(super) event_bus: EventBus,

    // Moved into their tasks by `start`
    pub(super) worker: Option<GestureWorker>,
    pub(super) source: Option<Box<dyn LandmarkSource>>,
    pub(super) shutdown_events: Option<EventReceiver>,

    pub(super) worker_handle: Option<JoinHandle<Result<WorkerStats>>>,
    pub(super) log_sink_handle: Option<JoinHandle<u64>>,
    pub(super) worker_stats: Option<WorkerStats>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) log_sink_token: CancellationToken,
}

impl GestureRemoteOrchestrator {
    pub fn new(
        config: RemoteConfig,
        backend: Box<dyn SerialBackend>,
        source: Box<dyn LandmarkSource>,
    ) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let worker = GestureWorker::new(&config, backend, event_bus.clone());
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            worker: Some(worker),
            source: Some(source),
            shutdown_events: None,
            worker_handle: None,
            log_sink_handle: None,
            worker_stats: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            log_sink_token: CancellationToken::new(),
        })
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Stop the worker from outside the signal handlers
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Final worker counters, once the worker has been joined
    pub fn worker_stats(&self) -> Option<WorkerStats> {
        self.worker_stats
    }
}
