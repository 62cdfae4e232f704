mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::GestureRemoteOrchestrator;
pub use types::{ComponentState, ShutdownReason};
