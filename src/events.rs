use crate::classifier::GestureSymbol;
use crate::error::EventBusError;
use crate::serial::LinkState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn, Level};

/// Notifications from the worker loop to the UI/log layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteEvent {
    /// A frame was classified
    FrameProcessed {
        symbol: GestureSymbol,
        timestamp: DateTime<Utc>,
    },
    /// A gesture survived debouncing
    GestureDetected {
        symbol: GestureSymbol,
        timestamp: DateTime<Utc>,
    },
    /// A command line was written to the device
    CommandSent {
        symbol: GestureSymbol,
        line: String,
        timestamp: DateTime<Utc>,
    },
    /// The active command table has no command for a stable gesture
    NoCommandForGesture {
        symbol: GestureSymbol,
        timestamp: DateTime<Utc>,
    },
    /// Serial link state transition
    LinkStatusChanged {
        state: LinkState,
        connected: bool,
        port: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A text line received from the device
    DeviceMessage {
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// A new IR command set became active
    CommandSetLoaded {
        model: String,
        commands: usize,
        timestamp: DateTime<Utc>,
    },
    /// A component hit a recoverable error
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl RemoteEvent {
    pub fn link_status(state: LinkState, port: Option<String>) -> Self {
        RemoteEvent::LinkStatusChanged {
            state,
            connected: state == LinkState::Connected,
            port,
            timestamp: Utc::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            RemoteEvent::FrameProcessed { symbol, .. } => format!("Frame classified as {}", symbol),
            RemoteEvent::GestureDetected { symbol, .. } => format!("Gesture detected: {}", symbol),
            RemoteEvent::CommandSent { symbol, line, .. } => {
                format!("Sent {} -> {}", symbol, line.trim_end())
            }
            RemoteEvent::NoCommandForGesture { symbol, .. } => {
                format!("No command for gesture {}", symbol)
            }
            RemoteEvent::LinkStatusChanged { state, port, .. } => match (state, port) {
                (LinkState::Connected, Some(port)) => format!("Device connected on {}", port),
                (LinkState::Connected, None) => "Device connected".to_string(),
                (LinkState::Connecting, _) => "Connecting to device".to_string(),
                (LinkState::Disconnected, _) => "Device disconnected".to_string(),
            },
            RemoteEvent::DeviceMessage { text, .. } => format!("Device: {}", text),
            RemoteEvent::CommandSetLoaded {
                model, commands, ..
            } => {
                format!("Loaded {} commands for {}", commands, model)
            }
            RemoteEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            RemoteEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Level the bus logs this event at when it is published. Errors here are
    /// all recoverable, so nothing goes above WARN.
    pub fn log_level(&self) -> Option<Level> {
        match self {
            RemoteEvent::SystemError { .. } => Some(Level::WARN),
            RemoteEvent::LinkStatusChanged { state, .. } => match state {
                LinkState::Connected | LinkState::Disconnected => Some(Level::INFO),
                LinkState::Connecting => Some(Level::DEBUG),
            },
            RemoteEvent::ShutdownRequested { .. } => Some(Level::INFO),
            _ => None,
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RemoteEvent::FrameProcessed { .. } => "frame_processed",
            RemoteEvent::GestureDetected { .. } => "gesture_detected",
            RemoteEvent::CommandSent { .. } => "command_sent",
            RemoteEvent::NoCommandForGesture { .. } => "no_command_for_gesture",
            RemoteEvent::LinkStatusChanged { .. } => "link_status_changed",
            RemoteEvent::DeviceMessage { .. } => "device_message",
            RemoteEvent::CommandSetLoaded { .. } => "command_set_loaded",
            RemoteEvent::SystemError { .. } => "system_error",
            RemoteEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast event bus; publishing never blocks the caller
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RemoteEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RemoteEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: RemoteEvent) -> Result<usize, EventBusError> {
        match event.log_level() {
            Some(level) if level == Level::WARN => warn!("{}", event.description()),
            Some(level) if level == Level::INFO => info!("{}", event.description()),
            Some(_) => debug!("{}", event.description()),
            None => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Post-and-forget; having no subscribers is not an error for the sender
    pub fn notify(&self, event: RemoteEvent) {
        if let Err(e) = self.publish(event) {
            trace!("Event dropped: {}", e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept everything except the given event types
    Exclude(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &RemoteEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Exclude(types) => !types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<RemoteEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<RemoteEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event. Lagging is logged and skipped.
    pub async fn recv(&mut self) -> Result<RemoteEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<RemoteEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(RemoteEvent::link_status(
                LinkState::Connected,
                Some("/dev/ttyUSB0".to_string()),
            ))
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            RemoteEvent::LinkStatusChanged {
                connected, port, ..
            } => {
                assert!(connected);
                assert_eq!(port.as_deref(), Some("/dev/ttyUSB0"));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_notify_without_subscribers() {
        let event_bus = EventBus::new(4);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus
            .publish(RemoteEvent::link_status(LinkState::Disconnected, None))
            .is_err());
        // Fire-and-forget swallows the missing-subscriber case
        event_bus.notify(RemoteEvent::link_status(LinkState::Disconnected, None));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::Exclude(vec!["frame_processed"]);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus.notify(RemoteEvent::FrameProcessed {
            symbol: GestureSymbol::None,
            timestamp: Utc::now(),
        });
        event_bus.notify(RemoteEvent::GestureDetected {
            symbol: GestureSymbol::Mute,
            timestamp: Utc::now(),
        });

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "gesture_detected");
        assert_eq!(receiver.try_recv().unwrap(), None);
    }

    #[test]
    fn test_event_descriptions() {
        let event = RemoteEvent::CommandSent {
            symbol: GestureSymbol::Power,
            line: "!NEC:00:1234\n".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "command_sent");
        assert_eq!(event.description(), "Sent POWER -> !NEC:00:1234");

        let event =
            RemoteEvent::link_status(LinkState::Disconnected, Some("/dev/ttyACM0".to_string()));
        assert_eq!(event.description(), "Device disconnected");
    }

    #[test]
    fn test_link_failures_log_at_warn() {
        let failure = RemoteEvent::SystemError {
            component: "serial".to_string(),
            error: "Serial write failed: broken pipe".to_string(),
        };
        assert_eq!(failure.log_level(), Some(Level::WARN));
        assert_eq!(
            RemoteEvent::link_status(LinkState::Disconnected, None).log_level(),
            Some(Level::INFO)
        );
        assert_eq!(
            RemoteEvent::FrameProcessed {
                symbol: GestureSymbol::None,
                timestamp: Utc::now(),
            }
            .log_level(),
            None
        );
    }
}
