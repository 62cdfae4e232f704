mod backend;
mod mock;
mod reconnect;
mod session;

pub use backend::{PortInfo, SerialBackend, SerialConnection, SystemSerialBackend};
pub use mock::MockBackend;
pub use reconnect::ReconnectPolicy;
pub use session::{LinkState, SerialSessionManager};
