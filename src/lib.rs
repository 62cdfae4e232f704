pub mod app;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod geometry;
pub mod irdb;
pub mod landmark;
pub mod ring_buffer;
pub mod serial;
pub mod source;
pub mod worker;

pub use app::{ComponentState, GestureRemoteOrchestrator, ShutdownReason};
pub use classifier::{classify, GestureClassifier, GestureRule, GestureSymbol, RULES};
pub use commands::{map_gesture, CommandMapper, CommandTable, DeviceCommand, IrCommandRecord};
pub use config::{CommandMode, RemoteConfig};
pub use debounce::{Debouncer, StableGestureEvent};
pub use error::{EventBusError, LinkError, RemoteError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, RemoteEvent};
pub use irdb::{load_ir_file, parse_ir_str, CommandSet};
pub use landmark::{HandFrame, HandLandmarks, Landmark};
pub use ring_buffer::{RingBuffer, RingBufferStats};
pub use serial::{
    LinkState, MockBackend, PortInfo, ReconnectPolicy, SerialBackend, SerialSessionManager,
    SystemSerialBackend,
};
pub use source::{JsonLinesSource, LandmarkSource};
pub use worker::{GestureWorker, WorkerStats};
